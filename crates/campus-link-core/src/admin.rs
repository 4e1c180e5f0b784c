//! Owner administration.
//!
//! Every operation takes an [`OwnerGrant`], which only
//! [`AdminConsole::authorize`] can produce. The grant proves that the
//! caller's link points at the configured owner student id, so handlers
//! cannot run before the check.

use crate::attempts::AttemptTracker;
use crate::error::{FlowError, LinkError};
use crate::input::{InputError, InputRule};
use crate::session::{Session, Step};
use crate::sources::{collect_grades, CourseGrade, GradeBook, SourceError};
use crate::storage::{AttemptRecord, IdentityStore, Link, StoreError, StudentRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// Proof that the caller is the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerGrant {
    telegram_id: i64,
}

impl OwnerGrant {
    /// Owner's Telegram id.
    #[must_use]
    pub const fn telegram_id(&self) -> i64 {
        self.telegram_id
    }
}

/// One page of the student list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentPage {
    /// Records on this page.
    pub students: Vec<StudentRecord>,
    /// Zero-based page index after clamping.
    pub page: usize,
    /// A previous page exists.
    pub has_prev: bool,
    /// A next page exists.
    pub has_next: bool,
    /// Records in the registry.
    pub total: usize,
    /// Number of pages, at least one.
    pub page_count: usize,
}

/// What the owner should be shown after an admin event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminReply {
    /// Top-level admin menu.
    Menu,
    /// A page of the student list.
    Page(StudentPage),
    /// A record was selected.
    Selected {
        /// Selected record.
        student: StudentRecord,
        /// Its link, if any.
        link: Option<Link>,
    },
    /// No record with this id; the list stays on `page`.
    NotFound {
        /// What was looked up.
        query: String,
        /// Current list page.
        page: StudentPage,
    },
    /// The list text did not name a student.
    UnknownSelection(StudentPage),
    /// Link removed (or there was none).
    Unlinked {
        /// Freed student id.
        student_id: String,
        /// A link actually existed.
        was_linked: bool,
    },
    /// Rename started; ask for the first name.
    AskFirstName(StudentRecord),
    /// First name staged; ask for the last name.
    AskLastName {
        /// Record being renamed.
        student_id: String,
        /// Staged first name.
        first_name: String,
    },
    /// Staged input rejected; ask again.
    InvalidName(InputError),
    /// Rename stored.
    Renamed(StudentRecord),
    /// Rename target vanished; restart from the menu.
    RenameFailed {
        /// Record that was being renamed.
        student_id: String,
    },
    /// Grades of a student.
    Grades {
        /// Student.
        student_id: String,
        /// Recorded grades in course order.
        grades: Vec<CourseGrade>,
        /// The grade book has no courses at all.
        no_courses: bool,
    },
    /// Attempt record reset.
    Unlocked(AttemptRecord),
}

/// Owner operations over the registry and link table.
#[derive(Clone)]
pub struct AdminConsole {
    identities: Arc<dyn IdentityStore>,
    attempts: AttemptTracker,
    grades: Arc<dyn GradeBook>,
    owner_student_id: String,
    page_size: usize,
}

impl AdminConsole {
    /// Console granting authority to whoever is linked to `owner_student_id`.
    #[must_use]
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        attempts: AttemptTracker,
        grades: Arc<dyn GradeBook>,
        owner_student_id: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            identities,
            attempts,
            grades,
            owner_student_id: owner_student_id.into(),
            page_size: page_size.max(1),
        }
    }

    /// Check that `telegram_id` is linked to the owner student id.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Unauthorized`] for everyone else, or a store error.
    pub async fn authorize(&self, telegram_id: i64) -> Result<OwnerGrant, FlowError> {
        match self.identities.get_link_by_telegram(telegram_id).await? {
            Some(link) if link.student_id == self.owner_student_id => {
                Ok(OwnerGrant { telegram_id })
            }
            _ => {
                debug!("Denied admin access to identity {telegram_id}");
                Err(LinkError::Unauthorized.into())
            }
        }
    }

    /// `/admin`: show the menu and leave any sub-flow.
    #[must_use]
    pub fn open_menu(&self, grant: &OwnerGrant) -> Step<AdminReply> {
        info!("Owner {} opened the admin menu", grant.telegram_id);
        Step::new(Session::Idle, AdminReply::Menu)
    }

    async fn page(&self, page: usize) -> Result<StudentPage, StoreError> {
        let students = self.identities.list_students().await?;
        let total = students.len();
        let last_page = total.saturating_sub(1) / self.page_size;
        let page = page.min(last_page);
        let start = page * self.page_size;
        let end = (start + self.page_size).min(total);

        Ok(StudentPage {
            students: students
                .into_iter()
                .skip(start)
                .take(end - start)
                .collect(),
            page,
            has_prev: page > 0,
            has_next: end < total,
            total,
            page_count: last_page + 1,
        })
    }

    /// Show page `page` of the student list (clamped to the last page).
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn browse(
        &self,
        _grant: &OwnerGrant,
        page: usize,
    ) -> Result<Step<AdminReply>, StoreError> {
        let page = self.page(page).await?;
        Ok(Step::new(
            Session::AdminBrowsing { page: page.page },
            AdminReply::Page(page),
        ))
    }

    /// Resolve a list entry. Accepts a bare id or an `"<id> - <name>"` label.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn select(
        &self,
        _grant: &OwnerGrant,
        page: usize,
        text: &str,
    ) -> Result<Step<AdminReply>, StoreError> {
        let browsing = Session::AdminBrowsing { page };
        let query = text.split(" - ").next().unwrap_or_default().trim();
        if query.is_empty() {
            let page = self.page(page).await?;
            return Ok(Step::new(browsing, AdminReply::UnknownSelection(page)));
        }

        let Some(student) = self.identities.get_student(query).await? else {
            let page = self.page(page).await?;
            return Ok(Step::new(
                browsing,
                AdminReply::NotFound {
                    query: query.to_string(),
                    page,
                },
            ));
        };

        let link = self.identities.get_link_by_student(&student.student_id).await?;
        Ok(Step::new(browsing, AdminReply::Selected { student, link }))
    }

    /// Remove the link on `student_id`, freeing it for a new registration.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn unlink(
        &self,
        grant: &OwnerGrant,
        student_id: &str,
    ) -> Result<AdminReply, StoreError> {
        let was_linked = self.identities.unlink_student(student_id).await?;
        info!(
            "Owner {} unlinked student {student_id} (was linked: {was_linked})",
            grant.telegram_id
        );
        Ok(AdminReply::Unlinked {
            student_id: student_id.to_string(),
            was_linked,
        })
    }

    /// Start renaming `student_id`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn begin_rename(
        &self,
        _grant: &OwnerGrant,
        session: &Session,
        student_id: &str,
    ) -> Result<Step<AdminReply>, StoreError> {
        match self.identities.get_student(student_id).await? {
            Some(student) => Ok(Step::new(
                Session::AwaitingAdminRenameFirst {
                    student_id: student.student_id.clone(),
                },
                AdminReply::AskFirstName(student),
            )),
            None => {
                let page = match session {
                    Session::AdminBrowsing { page } => *page,
                    _ => 0,
                };
                let listing = self.page(page).await?;
                Ok(Step::new(
                    Session::AdminBrowsing {
                        page: listing.page,
                    },
                    AdminReply::NotFound {
                        query: student_id.to_string(),
                        page: listing,
                    },
                ))
            }
        }
    }

    /// First name typed during a rename.
    #[must_use]
    pub fn submit_first_name(
        &self,
        _grant: &OwnerGrant,
        student_id: &str,
        input: &str,
    ) -> Step<AdminReply> {
        match InputRule::FirstName.accept(input) {
            Ok(first_name) => Step::new(
                Session::AwaitingAdminRenameLast {
                    student_id: student_id.to_string(),
                    first_name: first_name.clone(),
                },
                AdminReply::AskLastName {
                    student_id: student_id.to_string(),
                    first_name,
                },
            ),
            Err(e) => Step::new(
                Session::AwaitingAdminRenameFirst {
                    student_id: student_id.to_string(),
                },
                AdminReply::InvalidName(e),
            ),
        }
    }

    /// Last name typed during a rename; stores the new name.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn submit_last_name(
        &self,
        grant: &OwnerGrant,
        student_id: &str,
        first_name: &str,
        input: &str,
    ) -> Result<Step<AdminReply>, StoreError> {
        let last_name = match InputRule::LastName.accept(input) {
            Ok(name) => name,
            Err(e) => {
                return Ok(Step::new(
                    Session::AwaitingAdminRenameLast {
                        student_id: student_id.to_string(),
                        first_name: first_name.to_string(),
                    },
                    AdminReply::InvalidName(e),
                ))
            }
        };

        match self
            .identities
            .update_name(student_id, first_name, &last_name)
            .await
        {
            Ok(student) => {
                info!(
                    "Owner {} renamed student {student_id} to {}",
                    grant.telegram_id,
                    student.full_name()
                );
                Ok(Step::new(
                    Session::AdminBrowsing { page: 0 },
                    AdminReply::Renamed(student),
                ))
            }
            Err(StoreError::StudentNotFound(id)) => Ok(Step::new(
                Session::Idle,
                AdminReply::RenameFailed { student_id: id },
            )),
            Err(e) => Err(e),
        }
    }

    /// Grades of `student_id` from the grade book.
    ///
    /// # Errors
    ///
    /// Returns a `SourceError` if the grade book cannot be read.
    pub async fn grades_for(
        &self,
        _grant: &OwnerGrant,
        student_id: &str,
    ) -> Result<AdminReply, SourceError> {
        let no_courses = self.grades.list_courses().await?.is_empty();
        let grades = collect_grades(self.grades.as_ref(), student_id).await?;
        Ok(AdminReply::Grades {
            student_id: student_id.to_string(),
            grades,
            no_courses,
        })
    }

    /// `/unlock <telegram_id>`: the explicit reset of a locked identity.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn unlock(
        &self,
        grant: &OwnerGrant,
        telegram_id: i64,
    ) -> Result<AdminReply, StoreError> {
        let record = self.attempts.reset(telegram_id).await?;
        info!("Owner {} unlocked identity {telegram_id}", grant.telegram_id);
        Ok(AdminReply::Unlocked(record))
    }
}
