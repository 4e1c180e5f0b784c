//! Failed-attempt policy.
//!
//! Student ids are short and guessable, so each identity gets a small
//! budget of failed registration attempts. Reaching the threshold locks the
//! identity until the owner resets it or a registration completes. There is
//! no time-based expiry.

use crate::storage::{AttemptRecord, AttemptStore, StoreError};
use std::sync::Arc;
use tracing::{info, warn};

/// Policy layer over an [`AttemptStore`].
#[derive(Clone)]
pub struct AttemptTracker {
    store: Arc<dyn AttemptStore>,
    threshold: u32,
}

impl AttemptTracker {
    /// Tracker locking after `threshold` failures (at least one).
    #[must_use]
    pub fn new(store: Arc<dyn AttemptStore>, threshold: u32) -> Self {
        Self {
            store,
            threshold: threshold.max(1),
        }
    }

    /// Failures allowed before lockout.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Attempts left for `record`.
    #[must_use]
    pub fn remaining(&self, record: &AttemptRecord) -> u32 {
        if record.locked {
            return 0;
        }
        self.threshold.saturating_sub(record.failures)
    }

    /// Current record, created on first interaction.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn get_or_create(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError> {
        self.store.get_or_create_attempt(telegram_id).await
    }

    /// Count one failure. A locked record is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn increment_failure(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError> {
        let record = self
            .store
            .increment_failure(telegram_id, self.threshold)
            .await?;
        if record.locked {
            warn!(
                "Identity {telegram_id} locked after {} failed attempts",
                record.failures
            );
        } else {
            warn!(
                "Failed attempt {}/{} for identity {telegram_id}",
                record.failures, self.threshold
            );
        }
        Ok(record)
    }

    /// Clear failures and the lock.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store fails.
    pub async fn reset(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError> {
        let record = self.store.reset_attempts(telegram_id).await?;
        info!("Attempts reset for identity {telegram_id}");
        Ok(record)
    }
}
