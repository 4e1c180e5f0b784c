//! Telegram transport settings.

use campus_link_core::config::{build_config, CoreSettings};
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Seconds between repeated "registration locked" notices to one user.
    #[serde(default = "default_lockout_notice_cooldown")]
    pub lockout_notice_cooldown_secs: u64,
}

const fn default_lockout_notice_cooldown() -> u64 {
    LOCKOUT_NOTICE_COOLDOWN_SECS
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            lockout_notice_cooldown_secs: LOCKOUT_NOTICE_COOLDOWN_SECS,
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the token is empty.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        if settings.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "telegram_token must not be empty".to_string(),
            ));
        }
        Ok(settings)
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Storage, owner and source settings.
    pub core: Arc<CoreSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(core: CoreSettings, telegram: TelegramSettings) -> Self {
        Self {
            core: Arc::new(core),
            telegram: Arc::new(telegram),
        }
    }
}

/// Default cooldown between lockout notices: 10 minutes.
pub const LOCKOUT_NOTICE_COOLDOWN_SECS: u64 = 600;
/// Maximum number of identities tracked by the lockout notice cache.
pub const LOCKOUT_NOTICE_CACHE_MAX_SIZE: u64 = 10_000;

/// Retries for one Telegram API call.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// First backoff delay in milliseconds.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 200;
/// Upper bound for a single backoff delay in milliseconds.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_default_applies() -> Result<(), ConfigError> {
        let settings: TelegramSettings = config::Config::builder()
            .set_override("telegram_token", "123:abc")?
            .build()?
            .try_deserialize()?;
        assert_eq!(
            settings.lockout_notice_cooldown_secs,
            LOCKOUT_NOTICE_COOLDOWN_SECS
        );
        Ok(())
    }
}
