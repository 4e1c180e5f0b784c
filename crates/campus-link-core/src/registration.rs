//! Registration conversation.
//!
//! `Idle → AwaitingStudentId → AwaitingConfirmation → Idle`, with a decline
//! going back to `AwaitingStudentId`. Every rejected student id costs one
//! attempt; the identity locks when the budget runs out and stays locked
//! until the owner resets it.

use crate::attempts::AttemptTracker;
use crate::error::LinkError;
use crate::input::InputRule;
use crate::session::{Session, Step};
use crate::sources::{sync_registry, RegistrySource};
use crate::storage::{IdentityStore, Link, StoreError, StudentRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// What the user should be told after a registration event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationReply {
    /// The identity is already linked; nothing to do.
    AlreadyRegistered(Link),
    /// Request refused without touching the counter: [`LinkError::Locked`]
    /// for a locked identity, [`LinkError::StaleSession`] for a confirmation
    /// with nothing staged.
    Refused(LinkError),
    /// Registration started; ask for the student id.
    AskStudentId {
        /// Attempts left.
        remaining: u32,
    },
    /// Input rejected; another try is allowed.
    Rejected {
        /// Why.
        error: LinkError,
        /// Attempts left.
        remaining: u32,
    },
    /// Input rejected and the identity is now locked.
    LockedOut {
        /// The failure that used up the last attempt.
        error: LinkError,
    },
    /// Matched a free registry record; ask for confirmation.
    ConfirmStudent(StudentRecord),
    /// Link stored.
    Registered {
        /// The new link.
        link: Link,
        /// Matched record.
        student: Option<StudentRecord>,
    },
    /// The student id was claimed between check and confirmation.
    LinkTaken {
        /// Student id that was lost.
        student_id: String,
        /// Attempts left.
        remaining: u32,
    },
    /// Staged id discarded; ask again.
    Declined {
        /// Attempts left.
        remaining: u32,
    },
    /// Conversation returned to idle on request.
    Cancelled,
}

/// Drives one identity through registration.
///
/// Holds explicit store handles; the caller passes the conversation key
/// (`telegram_id`) and the current session with each event.
#[derive(Clone)]
pub struct RegistrationFlow {
    identities: Arc<dyn IdentityStore>,
    attempts: AttemptTracker,
    registry: Arc<dyn RegistrySource>,
}

impl RegistrationFlow {
    /// Assemble the flow from its collaborators.
    #[must_use]
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        attempts: AttemptTracker,
        registry: Arc<dyn RegistrySource>,
    ) -> Self {
        Self {
            identities,
            attempts,
            registry,
        }
    }

    /// Upsert every registry row. A broken source is logged and skipped so
    /// registration keeps working with the records already stored.
    async fn refresh_registry(&self) -> Result<(), StoreError> {
        match self.registry.rows().await {
            Ok(rows) => {
                sync_registry(self.identities.as_ref(), &rows).await?;
            }
            Err(e) => warn!("Registry source unavailable, using stored records: {e}"),
        }
        Ok(())
    }

    /// `/start`: begin registration from any state.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn enter(&self, telegram_id: i64) -> Result<Step<RegistrationReply>, StoreError> {
        self.refresh_registry().await?;

        if let Some(link) = self.identities.get_link_by_telegram(telegram_id).await? {
            return Ok(Step::new(
                Session::Idle,
                RegistrationReply::AlreadyRegistered(link),
            ));
        }

        let record = self.attempts.get_or_create(telegram_id).await?;
        if record.locked {
            warn!("Locked identity {telegram_id} tried to start registration");
            return Ok(Step::new(
                Session::Idle,
                RegistrationReply::Refused(LinkError::Locked(telegram_id)),
            ));
        }

        info!("Identity {telegram_id} started registration");
        Ok(Step::new(
            Session::AwaitingStudentId,
            RegistrationReply::AskStudentId {
                remaining: self.attempts.remaining(&record),
            },
        ))
    }

    /// Student id typed while in `AwaitingStudentId`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn submit_student_id(
        &self,
        telegram_id: i64,
        input: &str,
    ) -> Result<Step<RegistrationReply>, StoreError> {
        let record = self.attempts.get_or_create(telegram_id).await?;
        if record.locked {
            return Ok(Step::new(
                Session::AwaitingStudentId,
                RegistrationReply::Refused(LinkError::Locked(telegram_id)),
            ));
        }

        match self.check_student_id(input).await? {
            Ok(student) => {
                info!(
                    "Identity {telegram_id} matched student {}, awaiting confirmation",
                    student.student_id
                );
                Ok(Step::new(
                    Session::AwaitingConfirmation {
                        student_id: student.student_id.clone(),
                    },
                    RegistrationReply::ConfirmStudent(student),
                ))
            }
            Err(error) => self.reject(telegram_id, error).await,
        }
    }

    /// Syntax, existence and availability, in that order.
    async fn check_student_id(
        &self,
        input: &str,
    ) -> Result<Result<StudentRecord, LinkError>, StoreError> {
        let student_id = match InputRule::StudentId.accept(input) {
            Ok(id) => id,
            Err(e) => return Ok(Err(e.into())),
        };

        let Some(student) = self.identities.get_student(&student_id).await? else {
            return Ok(Err(LinkError::NotFound(student_id)));
        };

        if self
            .identities
            .get_link_by_student(&student_id)
            .await?
            .is_some()
        {
            return Ok(Err(LinkError::Conflict(student_id)));
        }

        Ok(Ok(student))
    }

    async fn reject(
        &self,
        telegram_id: i64,
        error: LinkError,
    ) -> Result<Step<RegistrationReply>, StoreError> {
        let record = if error.counts_as_attempt() {
            self.attempts.increment_failure(telegram_id).await?
        } else {
            self.attempts.get_or_create(telegram_id).await?
        };
        let reply = if record.locked {
            RegistrationReply::LockedOut { error }
        } else {
            RegistrationReply::Rejected {
                error,
                remaining: self.attempts.remaining(&record),
            }
        };
        Ok(Step::new(Session::AwaitingStudentId, reply))
    }

    /// Confirm button.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn confirm(
        &self,
        telegram_id: i64,
        session: &Session,
    ) -> Result<Step<RegistrationReply>, StoreError> {
        let Some(student_id) = session.staged_student_id() else {
            warn!("Identity {telegram_id} confirmed with nothing staged ({session:?})");
            return Ok(Step::new(
                Session::Idle,
                RegistrationReply::Refused(LinkError::StaleSession),
            ));
        };

        // A successful link resets attempts, so a locked identity stops here.
        let record = self.attempts.get_or_create(telegram_id).await?;
        if record.locked {
            warn!("Locked identity {telegram_id} tried to confirm student {student_id}");
            return Ok(Step::new(
                Session::Idle,
                RegistrationReply::Refused(LinkError::Locked(telegram_id)),
            ));
        }

        match self.identities.create_link(telegram_id, student_id).await {
            Ok(link) => {
                self.attempts.reset(telegram_id).await?;
                let student = self.identities.get_student(student_id).await?;
                info!("Identity {telegram_id} registered as student {student_id}");
                Ok(Step::new(
                    Session::Idle,
                    RegistrationReply::Registered { link, student },
                ))
            }
            Err(StoreError::LinkConflict { .. }) => {
                // Lost a race: either this identity got linked by a parallel
                // confirmation, or someone else claimed the student id.
                if let Some(link) = self.identities.get_link_by_telegram(telegram_id).await? {
                    return Ok(Step::new(
                        Session::Idle,
                        RegistrationReply::AlreadyRegistered(link),
                    ));
                }
                Ok(Step::new(
                    Session::AwaitingStudentId,
                    RegistrationReply::LinkTaken {
                        student_id: student_id.to_string(),
                        remaining: self.attempts.remaining(&record),
                    },
                ))
            }
            Err(StoreError::StudentNotFound(id)) => Ok(Step::new(
                Session::AwaitingStudentId,
                RegistrationReply::Rejected {
                    error: LinkError::NotFound(id),
                    remaining: self.attempts.remaining(&record),
                },
            )),
            Err(e) => Err(e),
        }
    }

    /// Decline button: drop the staged id, keep the attempt counter.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn decline(
        &self,
        telegram_id: i64,
        session: &Session,
    ) -> Result<Step<RegistrationReply>, StoreError> {
        match session {
            Session::AwaitingConfirmation { .. } | Session::AwaitingStudentId => {
                let record = self.attempts.get_or_create(telegram_id).await?;
                Ok(Step::new(
                    Session::AwaitingStudentId,
                    RegistrationReply::Declined {
                        remaining: self.attempts.remaining(&record),
                    },
                ))
            }
            _ => Ok(Step::new(
                Session::Idle,
                RegistrationReply::Refused(LinkError::StaleSession),
            )),
        }
    }

    /// `/cancel`: back to idle. Storage is untouched.
    #[must_use]
    pub fn cancel(&self, telegram_id: i64) -> Step<RegistrationReply> {
        info!("Identity {telegram_id} cancelled the conversation");
        Step::new(Session::Idle, RegistrationReply::Cancelled)
    }

    /// Link of a registered identity.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn link_of(&self, telegram_id: i64) -> Result<Option<Link>, StoreError> {
        self.identities.get_link_by_telegram(telegram_id).await
    }
}
