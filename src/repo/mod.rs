/// Repository layer for persisted preferences
use crate::errors::PipelineResult;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

/// Namespace holding every persisted preference of the screen.
pub const PREFERENCES_NAMESPACE: &str = "APOD_PREFERENCES";

/// Key of the API credential within [`PREFERENCES_NAMESPACE`].
pub const API_KEY: &str = "API_KEY";

/// Durable storage for the single API credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> PipelineResult<Option<String>>;

    /// Returns only once the value is committed.
    async fn set(&self, value: &str) -> PipelineResult<()>;
}

/// Credential repository backed by SQLite
#[derive(Clone)]
pub struct CredentialRepo {
    pool: SqlitePool,
}

impl CredentialRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for CredentialRepo {
    async fn get(&self) -> PipelineResult<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT value FROM preferences WHERE namespace = ?1 AND key = ?2",
        )
        .bind(PREFERENCES_NAMESPACE)
        .bind(API_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, value: &str) -> PipelineResult<()> {
        sqlx::query(
            "INSERT INTO preferences(namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (namespace, key) DO UPDATE
             SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(PREFERENCES_NAMESPACE)
        .bind(API_KEY)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Open the preferences database, creating the file when missing.
///
/// `synchronous = FULL` makes every committed write survive an immediate
/// process kill.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .synchronous(SqliteSynchronous::Full);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Initialize database tables
pub async fn init_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS preferences(
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (namespace, key)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// In-process store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCredentialStore {
    value: std::sync::Mutex<Option<String>>,
    writes: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryCredentialStore {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: std::sync::Mutex::new(Some(value.to_string())),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> PipelineResult<Option<String>> {
        Ok(self.value.lock().unwrap().clone())
    }

    async fn set(&self, value: &str) -> PipelineResult<()> {
        *self.value.lock().unwrap() = Some(value.to_string());
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
