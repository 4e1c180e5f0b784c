use super::{AttemptRecord, AttemptStore, IdentityStore, Link, StoreError, StudentRecord};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};

const MAX_CONNECTIONS: u32 = 5;

/// SQLite-backed implementation of [`IdentityStore`] and [`AttemptStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the database cannot be opened,
    /// or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if let Some(dir) = options.get_filename().parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
            }
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// Uses a single connection that never expires, since every SQLite
    /// memory connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and bring its schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("SQLite store ready.");
        Ok(Self { pool })
    }

    /// Check that the database answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the liveness query fails.
    pub async fn check_connection(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_attempt(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError> {
        let record = sqlx::query_as::<_, AttemptRecord>(
            "SELECT telegram_id, failures, locked, updated_at FROM auth_attempts WHERE telegram_id = ?",
        )
        .bind(telegram_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn upsert_student(
        &self,
        student_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        // The WHERE clause turns identical rows into a no-op, keeping updated_at.
        let result = sqlx::query(
            "INSERT INTO student_registry (student_id, first_name, last_name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (student_id) DO UPDATE SET \
                 first_name = excluded.first_name, \
                 last_name = excluded.last_name, \
                 updated_at = excluded.updated_at \
             WHERE student_registry.first_name <> excluded.first_name \
                OR student_registry.last_name <> excluded.last_name",
        )
        .bind(student_id)
        .bind(first_name)
        .bind(last_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_student(&self, student_id: &str) -> Result<Option<StudentRecord>, StoreError> {
        let record = sqlx::query_as::<_, StudentRecord>(
            "SELECT student_id, first_name, last_name, created_at, updated_at \
             FROM student_registry WHERE student_id = ?",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_students(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let records = sqlx::query_as::<_, StudentRecord>(
            "SELECT student_id, first_name, last_name, created_at, updated_at \
             FROM student_registry ORDER BY last_name, first_name, student_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn update_name(
        &self,
        student_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<StudentRecord, StoreError> {
        let result = sqlx::query(
            "UPDATE student_registry SET first_name = ?, last_name = ?, updated_at = ? \
             WHERE student_id = ?",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(Utc::now())
        .bind(student_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StudentNotFound(student_id.to_string()));
        }

        self.get_student(student_id)
            .await?
            .ok_or_else(|| StoreError::StudentNotFound(student_id.to_string()))
    }

    async fn get_link_by_telegram(&self, telegram_id: i64) -> Result<Option<Link>, StoreError> {
        let link = sqlx::query_as::<_, Link>(
            "SELECT id, telegram_id, student_id, confirmed, created_at, updated_at \
             FROM user_links WHERE telegram_id = ?",
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }

    async fn get_link_by_student(&self, student_id: &str) -> Result<Option<Link>, StoreError> {
        let link = sqlx::query_as::<_, Link>(
            "SELECT id, telegram_id, student_id, confirmed, created_at, updated_at \
             FROM user_links WHERE student_id = ?",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }

    async fn create_link(&self, telegram_id: i64, student_id: &str) -> Result<Link, StoreError> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO user_links (telegram_id, student_id, confirmed, created_at, updated_at) \
             VALUES (?, ?, 1, ?, ?)",
        )
        .bind(telegram_id)
        .bind(student_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let result = match inserted {
            Ok(result) => result,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                warn!("Link conflict for telegram {telegram_id} / student {student_id}");
                return Err(StoreError::LinkConflict {
                    telegram_id,
                    student_id: student_id.to_string(),
                });
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(StoreError::StudentNotFound(student_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        info!("Linked telegram {telegram_id} to student {student_id}");
        Ok(Link {
            id: result.last_insert_rowid(),
            telegram_id,
            student_id: student_id.to_string(),
            confirmed: true,
            created_at: now,
            updated_at: now,
        })
    }

    async fn unlink_student(&self, student_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_links WHERE student_id = ?")
            .bind(student_id)
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!("Unlinked student {student_id}");
        } else {
            debug!("Unlink of student {student_id} was a no-op");
        }
        Ok(removed)
    }
}

#[async_trait]
impl AttemptStore for SqliteStore {
    async fn get_or_create_attempt(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError> {
        sqlx::query(
            "INSERT INTO auth_attempts (telegram_id, failures, locked, updated_at) \
             VALUES (?, 0, 0, ?) ON CONFLICT (telegram_id) DO NOTHING",
        )
        .bind(telegram_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.fetch_attempt(telegram_id).await
    }

    async fn increment_failure(
        &self,
        telegram_id: i64,
        threshold: u32,
    ) -> Result<AttemptRecord, StoreError> {
        self.get_or_create_attempt(telegram_id).await?;

        // Single conditional statement: a locked row is never touched, so the
        // count stops at the threshold and `locked` cannot flip back.
        sqlx::query(
            "UPDATE auth_attempts SET \
                 failures = failures + 1, \
                 locked = (failures + 1 >= ?), \
                 updated_at = ? \
             WHERE telegram_id = ? AND locked = 0",
        )
        .bind(threshold.max(1))
        .bind(Utc::now())
        .bind(telegram_id)
        .execute(&self.pool)
        .await?;

        self.fetch_attempt(telegram_id).await
    }

    async fn reset_attempts(&self, telegram_id: i64) -> Result<AttemptRecord, StoreError> {
        sqlx::query(
            "INSERT INTO auth_attempts (telegram_id, failures, locked, updated_at) \
             VALUES (?, 0, 0, ?) \
             ON CONFLICT (telegram_id) DO UPDATE SET \
                 failures = 0, locked = 0, updated_at = excluded.updated_at",
        )
        .bind(telegram_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.fetch_attempt(telegram_id).await
    }
}
