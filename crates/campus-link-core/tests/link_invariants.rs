use campus_link_core::attempts::AttemptTracker;
use campus_link_core::storage::{AttemptStore, IdentityStore, SqliteStore, StoreError};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

const STUDENTS: [&str; 4] = ["10001", "10002", "10003", "10004"];

async fn seeded_store() -> Result<SqliteStore, StoreError> {
    let store = SqliteStore::in_memory().await?;
    for (i, id) in STUDENTS.iter().enumerate() {
        store
            .upsert_student(id, "Test", &format!("Student{i}"))
            .await?;
    }
    Ok(store)
}

#[derive(Debug, Clone)]
enum LinkOp {
    Create { telegram_id: i64, student: usize },
    Unlink { student: usize },
}

fn link_op() -> impl Strategy<Value = LinkOp> {
    prop_oneof![
        3 => (0i64..5, 0usize..STUDENTS.len())
            .prop_map(|(telegram_id, student)| LinkOp::Create { telegram_id, student }),
        1 => (0usize..STUDENTS.len()).prop_map(|student| LinkOp::Unlink { student }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// After any sequence of link and unlink calls, no identity and no
    /// student id appears in more than one link.
    #[test]
    fn links_stay_one_to_one(ops in prop::collection::vec(link_op(), 1..30)) {
        runtime().block_on(async {
            let store = seeded_store().await.expect("store");
            for op in ops {
                match op {
                    LinkOp::Create { telegram_id, student } => {
                        let id = STUDENTS[student];
                        let had_identity = store.get_link_by_telegram(telegram_id).await.expect("query").is_some();
                        let had_student = store.get_link_by_student(id).await.expect("query").is_some();
                        let result = store.create_link(telegram_id, id).await;
                        if had_identity || had_student {
                            let conflicted = matches!(result, Err(StoreError::LinkConflict { .. }));
                            prop_assert!(conflicted, "expected a link conflict, got {:?}", result);
                        } else {
                            prop_assert!(result.is_ok());
                        }
                    }
                    LinkOp::Unlink { student } => {
                        store.unlink_student(STUDENTS[student]).await.expect("unlink");
                    }
                }
            }

            let mut identities = HashSet::new();
            let mut students = HashSet::new();
            for id in STUDENTS {
                if let Some(link) = store.get_link_by_student(id).await.expect("query") {
                    prop_assert!(identities.insert(link.telegram_id));
                    prop_assert!(students.insert(link.student_id.clone()));
                    let by_identity = store.get_link_by_telegram(link.telegram_id).await.expect("query");
                    prop_assert_eq!(by_identity, Some(link));
                }
            }
            Ok(())
        })?;
    }

    /// The failure counter never exceeds the threshold and a lock never clears
    /// by itself, whatever mix of increments and reads happens.
    #[test]
    fn lockout_is_monotonic(
        threshold in 1u32..6,
        increments in prop::collection::vec(any::<bool>(), 1..20),
    ) {
        runtime().block_on(async {
            let store = Arc::new(seeded_store().await.expect("store"));
            let tracker = AttemptTracker::new(store.clone(), threshold);

            let mut previous = tracker.get_or_create(7).await.expect("record");
            for increment in increments {
                let current = if increment {
                    tracker.increment_failure(7).await.expect("increment")
                } else {
                    store.get_or_create_attempt(7).await.expect("read")
                };
                prop_assert!(current.failures <= threshold);
                prop_assert!(current.failures >= previous.failures);
                prop_assert!(!previous.locked || current.locked);
                prop_assert_eq!(current.locked, current.failures >= threshold);
                previous = current;
            }
            Ok(())
        })?;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_of_one_student_id_have_one_winner() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}", dir.path().join("links.db").display());
    let store = Arc::new(SqliteStore::connect(&url).await?);
    store.upsert_student("10001", "Test", "Student").await?;

    let mut tasks = Vec::new();
    for telegram_id in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.create_link(telegram_id, "10001").await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await? {
            Ok(_) => winners += 1,
            Err(StoreError::LinkConflict { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    assert_eq!(winners, 1);
    assert!(store.get_link_by_student("10001").await?.is_some());
    Ok(())
}
