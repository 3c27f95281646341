//! Storage implementations.
//!
//! The relational backend is the durable source of truth for which
//! client→destination relationships exist. The in-process cache only
//! reduces how often it is read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::intent::DedupKey;

pub mod schema;
pub mod sql;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(feature = "mysql")]
pub use sql::mysql::MysqlIntentStore;
#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresIntentStore;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteIntentStore;
pub use sql::SqlIntentStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

/// One durable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentRecord {
    pub id: i64,
    pub client_name: String,
    pub client_namespace: String,
    pub client_kind: String,
    pub dns_name: String,
    pub last_seen: NaiveDate,
}

impl IntentRecord {
    pub fn key(&self) -> DedupKey {
        DedupKey::new(
            self.client_name.as_str(),
            self.client_namespace.as_str(),
            self.client_kind.as_str(),
            self.dns_name.as_str(),
        )
    }
}

/// Interface for intent persistence.
///
/// Rows are unique on the four [`DedupKey`] columns.
///
/// # Implementations
///
/// - `SqliteIntentStore`: SQLite storage
/// - `PostgresIntentStore`: PostgreSQL storage
/// - `MysqlIntentStore`: MySQL storage
/// - `MockIntentStore`: In-memory mock for testing
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Create the intents table if it does not exist.
    async fn init(&self) -> Result<()>;

    /// Whether a row for `key` exists.
    async fn exists(&self, key: &DedupKey) -> Result<bool>;

    /// Insert a row for `key`.
    ///
    /// Upserts: if a concurrent writer already created the row, its
    /// `last_seen` is updated instead.
    async fn insert(&self, key: &DedupKey, last_seen: NaiveDate) -> Result<()>;

    /// Set `last_seen` on the row for `key`. Returns rows affected.
    async fn touch(&self, key: &DedupKey, last_seen: NaiveDate) -> Result<u64>;

    /// Delete every row last seen strictly before `cutoff`. Returns rows deleted.
    async fn delete_seen_before(&self, cutoff: NaiveDate) -> Result<u64>;

    /// All rows, most recently seen first.
    async fn list_all(&self) -> Result<Vec<IntentRecord>>;

    /// Rows last seen on or after `since`.
    async fn list_seen_since(&self, since: NaiveDate) -> Result<Vec<IntentRecord>>;
}

/// Connection retry policy used while the backend comes up.
fn connect_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(10)
}

/// Initialize storage based on configuration.
///
/// Connects (with bounded retry), creates the table and returns the store.
/// Any failure here is fatal to the caller.
pub async fn init_storage(config: &DatabaseConfig) -> Result<Arc<dyn IntentStore>> {
    info!(
        backend = %config.backend,
        target = %config.redacted_target(),
        "Storage: connecting"
    );

    let store: Arc<dyn IntentStore> = match config.backend {
        #[cfg(feature = "sqlite")]
        DatabaseBackend::Sqlite => {
            if !config.is_in_memory() && config.url.is_none() {
                if let Some(parent) = std::path::Path::new(&config.path).parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Config(format!(
                            "cannot create directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            // Every connection to `:memory:` is a separate database.
            let max_connections = if config.is_in_memory() {
                1
            } else {
                config.max_connections
            };
            let options = sqlite_options(config)?;
            let pool = (|| {
                let options = options.clone();
                async move {
                    sqlx::sqlite::SqlitePoolOptions::new()
                        .max_connections(max_connections)
                        .connect_with(options)
                        .await
                }
            })
            .retry(connect_backoff())
            .notify(|e, delay| warn!(error = %e, ?delay, "SQLite connect failed, retrying"))
            .await?;
            Arc::new(SqliteIntentStore::new(pool))
        }
        #[cfg(feature = "postgres")]
        DatabaseBackend::Postgres => {
            let options = postgres_options(config)?;
            let pool = (|| {
                let options = options.clone();
                async move {
                    sqlx::postgres::PgPoolOptions::new()
                        .max_connections(config.max_connections)
                        .connect_with(options)
                        .await
                }
            })
            .retry(connect_backoff())
            .notify(|e, delay| warn!(error = %e, ?delay, "PostgreSQL connect failed, retrying"))
            .await?;
            Arc::new(PostgresIntentStore::new(pool))
        }
        #[cfg(feature = "mysql")]
        DatabaseBackend::Mysql => {
            let options = mysql_options(config)?;
            let pool = (|| {
                let options = options.clone();
                async move {
                    sqlx::mysql::MySqlPoolOptions::new()
                        .max_connections(config.max_connections)
                        .connect_with(options)
                        .await
                }
            })
            .retry(connect_backoff())
            .notify(|e, delay| warn!(error = %e, ?delay, "MySQL connect failed, retrying"))
            .await?;
            Arc::new(MysqlIntentStore::new(pool))
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(StorageError::Config(format!(
                "{} storage requested but the '{}' feature is not enabled",
                other, other
            )));
        }
    };

    store.init().await?;
    info!(backend = %config.backend, "Storage ready");
    Ok(store)
}

// Connection parameters are handed to sqlx field by field, so credentials
// never pass through URL parsing. An explicit `url` is parsed as given.

#[cfg(feature = "sqlite")]
fn sqlite_options(config: &DatabaseConfig) -> Result<sqlx::sqlite::SqliteConnectOptions> {
    use sqlx::sqlite::SqliteConnectOptions;

    if let Some(url) = &config.url {
        return Ok(url.parse::<SqliteConnectOptions>()?);
    }
    if config.is_in_memory() {
        return Ok("sqlite::memory:".parse::<SqliteConnectOptions>()?);
    }
    Ok(SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true))
}

#[cfg(feature = "postgres")]
fn postgres_options(config: &DatabaseConfig) -> Result<sqlx::postgres::PgConnectOptions> {
    use sqlx::postgres::PgConnectOptions;

    if let Some(url) = &config.url {
        return Ok(url.parse::<PgConnectOptions>()?);
    }
    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port_or_default())
        .username(&config.username)
        .password(&config.password)
        .database(&config.database))
}

#[cfg(feature = "mysql")]
fn mysql_options(config: &DatabaseConfig) -> Result<sqlx::mysql::MySqlConnectOptions> {
    use sqlx::mysql::MySqlConnectOptions;

    if let Some(url) = &config.url {
        return Ok(url.parse::<MySqlConnectOptions>()?);
    }
    Ok(MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port_or_default())
        .username(&config.username)
        .password(&config.password)
        .database(&config.database))
}
