//! SQLite connection pool management.

use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use tabweave_core::{Error, Result};

/// Default maximum number of connections in the pool.
///
/// SQLite allows a single writer. One pooled connection serializes the
/// read-then-write transactions in the document store instead of letting
/// them fail with `SQLITE_BUSY`.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default time a statement waits on a locked database file.
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

/// URL of a private in-memory database.
pub const MEMORY_URL: &str = "sqlite::memory:";

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection acquire timeout.
    pub connect_timeout: Duration,
    /// How long a statement waits for a lock held by another connection.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            busy_timeout: Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n.max(1);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Options for a database file, created on first use, in WAL mode.
pub fn file_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
}

/// Options parsed from a `sqlite:` URL.
pub fn url_options(url: &str) -> Result<SqliteConnectOptions> {
    SqliteConnectOptions::from_str(url)
        .map(|options| options.create_if_missing(true))
        .map_err(Error::Database)
}

/// Create a new SQLite connection pool with default configuration.
pub async fn create_pool(url: &str) -> Result<SqlitePool> {
    create_pool_with_config(url_options(url)?, PoolConfig::default()).await
}

/// Create a new SQLite connection pool with custom configuration.
///
/// Connections are never recycled for idleness or age: an in-memory
/// database lives exactly as long as its connection.
pub async fn create_pool_with_config(
    options: SqliteConnectOptions,
    config: PoolConfig,
) -> Result<SqlitePool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        filename = %options.get_filename().display(),
        max_connections = config.max_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Creating database connection pool"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(options.busy_timeout(config.busy_timeout))
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Log current pool size and idle count.
pub fn log_pool_metrics(pool: &SqlitePool) {
    debug!(
        subsystem = "db",
        component = "pool",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        "Pool metrics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new()
            .max_connections(0)
            .connect_timeout(Duration::from_secs(3))
            .busy_timeout(Duration::from_millis(250));
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_url_options_rejects_garbage() {
        assert!(url_options("sqlite://tabs.db?mode=sideways").is_err());
        assert!(url_options(MEMORY_URL).is_ok());
    }

    #[tokio::test]
    async fn test_memory_pool_keeps_one_connection() {
        let pool = create_pool(MEMORY_URL).await.unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (x) VALUES (1)")
            .execute(&pool)
            .await
            .unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(pool.size(), 1);
    }
}
