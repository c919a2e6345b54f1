//! Storage configuration loaded from environment variables.

/// Connection settings for [`PostgresStore`](crate::PostgresStore).
///
/// Reads from environment variables:
/// - `DATABASE_URL` — Postgres connection string (no default)
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `5`)
/// - `DATABASE_STATEMENT_TIMEOUT_MS` — per-statement timeout applied to
///   every connection so a stuck checkout transaction aborts instead of
///   holding row locks (default: `5000`)
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub statement_timeout_ms: u64,
}

impl StorageConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for everything but `DATABASE_URL`.
    pub fn from_env() -> Option<Self> {
        let database_url = std::env::var("DATABASE_URL").ok()?;
        Some(Self {
            database_url,
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            statement_timeout_ms: std::env::var("DATABASE_STATEMENT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
        })
    }

    /// Builds a config for the given URL with default pool settings.
    pub fn for_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            statement_timeout_ms: 5000,
        }
    }
}
