//! Configuration and settings management
//!
//! Loads settings from config files and environment variables. Every crate
//! in the workspace builds on [`build_config`] so all layers see the same
//! sources in the same order.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Failed attempts allowed before an identity is locked.
pub const DEFAULT_MAX_FAILURES: u32 = 3;
/// Students shown per page in the admin list.
pub const DEFAULT_PAGE_SIZE: usize = 12;
/// Student id granted owner authority when nothing else is configured.
pub const DEFAULT_OWNER_STUDENT_ID: &str = "40211272003";

/// Build the layered configuration used by every settings struct.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` variables, plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Settings for storage, the owner account and the flat-file sources.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoreSettings {
    /// SQLite connection string.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Student id whose linked identity may use admin commands.
    #[serde(default = "default_owner_student_id")]
    pub owner_student_id: String,

    /// CSV file with `student_id,first_name,last_name` rows.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Directory holding one `<course>.csv` per course.
    #[serde(default = "default_grades_dir")]
    pub grades_dir: String,

    /// Failed attempts before lockout.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Admin student list page size.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_database_url() -> String {
    "sqlite://data/bot.db".to_string()
}

fn default_owner_student_id() -> String {
    DEFAULT_OWNER_STUDENT_ID.to_string()
}

fn default_registry_path() -> String {
    "data/registry/students.csv".to_string()
}

fn default_grades_dir() -> String {
    "data/grades".to_string()
}

const fn default_max_failures() -> u32 {
    DEFAULT_MAX_FAILURES
}

const fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            owner_student_id: default_owner_student_id(),
            registry_path: default_registry_path(),
            grades_dir: default_grades_dir(),
            max_failures: DEFAULT_MAX_FAILURES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CoreSettings {
    /// Load core settings from files and environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;
        settings.owner_student_id = settings.owner_student_id.trim().to_string();
        if settings.max_failures == 0 {
            return Err(ConfigError::Message(
                "max_failures must be at least 1".to_string(),
            ));
        }
        if settings.page_size == 0 {
            settings.page_size = DEFAULT_PAGE_SIZE;
        }
        Ok(settings)
    }
}
