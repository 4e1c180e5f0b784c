//! Storage layer for the student registry, identity links and attempts
//!
//! The traits describe what the conversation flows need; [`SqliteStore`]
//! is the relational implementation. Uniqueness of links is enforced by
//! the database itself, so several processes may share one store.

mod models;
mod sqlite;

pub use models::{AttemptRecord, Link, StudentRecord};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// The identity or the student id already has a link
    #[error("Link conflict: telegram {telegram_id} or student {student_id} is already linked")]
    LinkConflict {
        /// Identity that tried to link.
        telegram_id: i64,
        /// Student id it tried to claim.
        student_id: String,
    },
    /// No registry record with this student id
    #[error("Student not found: {0}")]
    StudentNotFound(String),
}

/// Students and the identity link table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Create or update a registry record. Returns `true` if anything changed.
    async fn upsert_student(
        &self,
        student_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool, StoreError>;
    /// Fetch a registry record.
    async fn get_student(&self, student_id: &str) -> Result<Option<StudentRecord>, StoreError>;
    /// All records ordered by last name, first name, student id.
    async fn list_students(&self) -> Result<Vec<StudentRecord>, StoreError>;
    /// Rename an existing record.
    async fn update_name(
        &self,
        student_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<StudentRecord, StoreError>;
    /// Link held by a Telegram identity.
    async fn get_link_by_telegram(&self, telegram_id: i64) -> Result<Option<Link>, StoreError>;
    /// Link held on a student id.
    async fn get_link_by_student(&self, student_id: &str) -> Result<Option<Link>, StoreError>;
    /// Atomically create a confirmed link.
    ///
    /// Fails with [`StoreError::LinkConflict`] if either side is already linked.
    async fn create_link(&self, telegram_id: i64, student_id: &str) -> Result<Link, StoreError>;
    /// Remove the link on a student id. Returns `true` if one existed.
    async fn unlink_student(&self, student_id: &str) -> Result<bool, StoreError>;
}

/// Keyed attempt records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Current record, created with zero failures if absent.
    async fn get_or_create_attempt(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError>;
    /// Count one failure unless already locked; lock when `threshold` is reached.
    async fn increment_failure(
        &self,
        telegram_id: i64,
        threshold: u32,
    ) -> Result<AttemptRecord, StoreError>;
    /// Zero the counter and clear the lock.
    async fn reset_attempts(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError>;
}
