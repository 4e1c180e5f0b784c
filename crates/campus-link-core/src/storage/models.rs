use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registry entry keyed by the institutional student id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentRecord {
    /// Institutional student id.
    pub student_id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// First time the record was stored.
    pub created_at: DateTime<Utc>,
    /// Last time the name changed.
    pub updated_at: DateTime<Utc>,
}

impl StudentRecord {
    /// `"First Last"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A confirmed binding between a Telegram identity and a student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Link {
    /// Row id.
    pub id: i64,
    /// Telegram user id.
    pub telegram_id: i64,
    /// Linked student id.
    pub student_id: String,
    /// Always `true` once persisted.
    pub confirmed: bool,
    /// When the link was confirmed.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

/// Failed registration attempts for one Telegram identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttemptRecord {
    /// Telegram user id.
    pub telegram_id: i64,
    /// Failures since the last reset.
    pub failures: u32,
    /// Set once `failures` reaches the threshold; cleared only by a reset.
    pub locked: bool,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}
