use async_trait::async_trait;
use campus_link_core::admin::{AdminConsole, AdminReply};
use campus_link_core::attempts::AttemptTracker;
use campus_link_core::input::InputError;
use campus_link_core::sources::{CourseGrade, GradeBook, SourceError};
use campus_link_core::storage::{IdentityStore, SqliteStore};
use campus_link_core::{FlowError, LinkError, Session};
use std::collections::BTreeMap;
use std::sync::Arc;

const OWNER_ID: &str = "40211272003";

/// Course -> student -> grade.
struct MapGradeBook(BTreeMap<&'static str, BTreeMap<&'static str, &'static str>>);

#[async_trait]
impl GradeBook for MapGradeBook {
    async fn list_courses(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.0.keys().map(ToString::to_string).collect())
    }

    async fn get_grade(
        &self,
        course: &str,
        student_id: &str,
    ) -> Result<Option<String>, SourceError> {
        Ok(self
            .0
            .get(course)
            .and_then(|sheet| sheet.get(student_id))
            .map(ToString::to_string))
    }
}

async fn setup(students: usize, page_size: usize) -> anyhow::Result<(Arc<SqliteStore>, AdminConsole)> {
    let store = Arc::new(SqliteStore::in_memory().await?);
    store.upsert_student(OWNER_ID, "Ali", "Rezai").await?;
    for i in 0..students {
        store
            .upsert_student(&format!("5000{i:02}"), "Student", &format!("Name{i:02}"))
            .await?;
    }
    store.create_link(1, OWNER_ID).await?;

    let grades = MapGradeBook(BTreeMap::from([
        ("Algebra", BTreeMap::from([("500000", "18")])),
        ("Physics", BTreeMap::from([("500000", "15.5"), ("500001", "12")])),
    ]));
    let console = AdminConsole::new(
        store.clone(),
        AttemptTracker::new(store.clone(), 3),
        Arc::new(grades),
        OWNER_ID,
        page_size,
    );
    Ok((store, console))
}

#[tokio::test]
async fn non_owner_cannot_get_a_grant() -> anyhow::Result<()> {
    let (store, console) = setup(1, 12).await?;
    store.create_link(2, "500000").await?;

    for caller in [2, 3] {
        let denied = console.authorize(caller).await;
        assert!(matches!(
            denied,
            Err(FlowError::Link(LinkError::Unauthorized))
        ));
    }
    Ok(())
}

#[tokio::test]
async fn browse_pages_and_clamps() -> anyhow::Result<()> {
    let (_, console) = setup(5, 4).await?;
    let grant = console.authorize(1).await?;

    let step = console.browse(&grant, 0).await?;
    assert_eq!(step.session, Session::AdminBrowsing { page: 0 });
    let AdminReply::Page(page) = step.reply else {
        panic!("expected a page");
    };
    assert_eq!(page.total, 6);
    assert_eq!(page.page_count, 2);
    assert_eq!(page.students.len(), 4);
    assert!(!page.has_prev && page.has_next);
    // Ordered by last name: Name00..Name04, then Rezai
    assert_eq!(page.students[0].student_id, "500000");

    let step = console.browse(&grant, 99).await?;
    assert_eq!(step.session, Session::AdminBrowsing { page: 1 });
    let AdminReply::Page(page) = step.reply else {
        panic!("expected a page");
    };
    assert_eq!(page.students.len(), 2);
    assert!(page.has_prev && !page.has_next);
    assert_eq!(page.students[1].student_id, OWNER_ID);
    Ok(())
}

#[tokio::test]
async fn select_accepts_list_labels() -> anyhow::Result<()> {
    let (_, console) = setup(2, 12).await?;
    let grant = console.authorize(1).await?;

    let step = console.select(&grant, 0, "40211272003 - Ali Rezai").await?;
    let AdminReply::Selected { student, link } = step.reply else {
        panic!("expected a selection");
    };
    assert_eq!(student.first_name, "Ali");
    assert_eq!(link.map(|l| l.telegram_id), Some(1));

    let step = console.select(&grant, 0, "123").await?;
    assert!(matches!(step.reply, AdminReply::NotFound { ref query, .. } if query == "123"));
    assert_eq!(step.session, Session::AdminBrowsing { page: 0 });
    Ok(())
}

#[tokio::test]
async fn rename_walks_both_name_steps() -> anyhow::Result<()> {
    let (store, console) = setup(1, 12).await?;
    let grant = console.authorize(1).await?;

    let step = console
        .begin_rename(&grant, &Session::AdminBrowsing { page: 0 }, "500000")
        .await?;
    assert_eq!(
        step.session,
        Session::AwaitingAdminRenameFirst {
            student_id: "500000".into()
        }
    );

    let step = console.submit_first_name(&grant, "500000", "Maryam");
    let Session::AwaitingAdminRenameLast {
        student_id,
        first_name,
    } = step.session
    else {
        panic!("expected last-name step");
    };

    let step = console
        .submit_last_name(&grant, &student_id, &first_name, "K")
        .await?;
    assert_eq!(
        step.reply,
        AdminReply::InvalidName(InputError::TooShort {
            rule: campus_link_core::input::InputRule::LastName,
            min: 2
        })
    );

    let step = console
        .submit_last_name(&grant, &student_id, &first_name, "Karimi")
        .await?;
    assert!(matches!(step.reply, AdminReply::Renamed(ref r) if r.full_name() == "Maryam Karimi"));
    let stored = store.get_student("500000").await?;
    assert_eq!(stored.map(|s| s.last_name), Some("Karimi".into()));
    Ok(())
}

#[tokio::test]
async fn rename_of_unknown_student_stays_in_list() -> anyhow::Result<()> {
    let (_, console) = setup(1, 12).await?;
    let grant = console.authorize(1).await?;
    let step = console
        .begin_rename(&grant, &Session::AdminBrowsing { page: 0 }, "777777")
        .await?;
    assert_eq!(step.session, Session::AdminBrowsing { page: 0 });
    assert!(matches!(step.reply, AdminReply::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn grades_for_student() -> anyhow::Result<()> {
    let (_, console) = setup(2, 12).await?;
    let grant = console.authorize(1).await?;

    let reply = console.grades_for(&grant, "500000").await?;
    assert_eq!(
        reply,
        AdminReply::Grades {
            student_id: "500000".into(),
            grades: vec![
                CourseGrade {
                    course: "Algebra".into(),
                    grade: "18".into()
                },
                CourseGrade {
                    course: "Physics".into(),
                    grade: "15.5".into()
                },
            ],
            no_courses: false,
        }
    );

    let reply = console.grades_for(&grant, OWNER_ID).await?;
    assert!(matches!(reply, AdminReply::Grades { grades, no_courses: false, .. } if grades.is_empty()));
    Ok(())
}

#[tokio::test]
async fn unlink_without_link_reports_nothing_removed() -> anyhow::Result<()> {
    let (_, console) = setup(1, 12).await?;
    let grant = console.authorize(1).await?;
    let reply = console.unlink(&grant, "500000").await?;
    assert_eq!(
        reply,
        AdminReply::Unlinked {
            student_id: "500000".into(),
            was_linked: false
        }
    );
    Ok(())
}
