//! Database configuration types.

use serde::Deserialize;

/// Relational backend discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl DatabaseBackend {
    /// Port used when none is configured.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Sqlite => 0,
            Self::Postgres => 5432,
            Self::Mysql => 3306,
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        })
    }
}

/// Database connection configuration.
///
/// Either a full `url`, or the individual connection parameters handed to
/// the driver as they are (no URL escaping needed). SQLite uses `path` (`:memory:` for an in-memory database).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Full connection URL. Overrides every other field when set.
    pub url: Option<String>,
    pub host: String,
    /// Defaults to the backend's standard port.
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub database: String,
    /// SQLite database file.
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            url: None,
            host: "127.0.0.1".to_string(),
            port: None,
            username: "root".to_string(),
            password: "password".to_string(),
            database: "otterise".to_string(),
            path: "data/egress-intents.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.backend == DatabaseBackend::Sqlite && self.url.is_none() && self.path == ":memory:"
    }

    /// Configured port, or the backend's standard one.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }

    /// Where we are connecting, without credentials. Safe to log.
    pub fn redacted_target(&self) -> String {
        if self.url.is_some() {
            return "<url>".to_string();
        }
        match self.backend {
            DatabaseBackend::Sqlite => self.path.clone(),
            _ => format!("{}:{}/{}", self.host, self.port_or_default(), self.database),
        }
    }
}
