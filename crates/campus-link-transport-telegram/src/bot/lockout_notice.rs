//! Lockout notice flood protection
//!
//! A locked identity keeps being rejected on every message, but it is told
//! so at most once per cooldown. Anything more would only feed Telegram
//! rate limits.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Remembers which identities were recently told they are locked.
#[derive(Clone)]
pub struct LockoutNotice {
    /// telegram_id -> () with the cooldown as TTL
    cache: Cache<i64, ()>,
    silenced_count: Arc<AtomicU64>,
}

impl LockoutNotice {
    /// Creates a notice cache with the given cooldown and capacity.
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cooldown = Duration::from_secs(cooldown_secs);
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(cooldown)
            .build();

        Self {
            cache,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether the lock notice should be sent to `telegram_id` now.
    pub async fn should_send(&self, telegram_id: i64) -> bool {
        if self.cache.get(&telegram_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!("Silenced {count} lockout notices (recent: identity {telegram_id})");
        }
        false
    }

    /// Start the cooldown for `telegram_id` after a notice went out.
    pub async fn mark_sent(&self, telegram_id: i64) {
        self.cache.insert(telegram_id, ()).await;
    }

    /// Forget `telegram_id`, e.g. after the owner unlocked it.
    pub async fn forget(&self, telegram_id: i64) {
        self.cache.invalidate(&telegram_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl LockoutNotice {
        fn silenced_count(&self) -> u64 {
            self.silenced_count.load(Ordering::Relaxed)
        }
    }

    #[tokio::test]
    async fn test_first_notice_is_sent() {
        let notice = LockoutNotice::new(60, 100);
        assert!(notice.should_send(1).await);
    }

    #[tokio::test]
    async fn test_repeat_is_silenced_until_forgotten() {
        let notice = LockoutNotice::new(60, 100);
        notice.mark_sent(1).await;

        assert!(!notice.should_send(1).await);
        assert!(!notice.should_send(1).await);
        assert_eq!(notice.silenced_count(), 2);
        assert!(notice.should_send(2).await);

        notice.forget(1).await;
        assert!(notice.should_send(1).await);
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let notice = LockoutNotice::new(1, 100);
        notice.mark_sent(1).await;
        assert!(!notice.should_send(1).await);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(notice.should_send(1).await);
    }
}
