//! # tabweave-db
//!
//! SQLite storage layer for tabweave.
//!
//! This crate provides:
//! - A tab document store with handle and url-hash lookups
//! - An append-only navigation event log with a timestamp index
//! - Relationship and workflow pattern record stores
//! - A blob store for the text index snapshot and pipeline state
//!
//! Every record is its own row, so a mutation writes one row rather than
//! the whole collection. The schema lives in `migrations/` and is applied
//! on connect.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabweave_db::Database;
//!
//! let db = Database::open("/var/lib/tabweave/tabweave.db").await?;
//! let total = db.documents.count().await?;
//! ```

pub mod documents;
pub mod kv;
pub mod navigation;
pub mod pool;
pub mod relationships;
pub mod workflows;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

// Re-export core types
pub use tabweave_core::*;

pub use documents::SqliteTabDocumentRepository;
pub use kv::{get_json, set_json, SqliteKv};
pub use navigation::SqliteNavigationEventRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use relationships::SqliteRelationshipRepository;
pub use workflows::SqliteWorkflowRepository;

/// Combined storage context with all repositories.
#[derive(Clone)]
pub struct Database {
    pub documents: Arc<dyn TabDocumentRepository>,
    pub navigation: Arc<dyn NavigationEventRepository>,
    pub relationships: Arc<dyn RelationshipRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    /// Blob store for the text index snapshot and pipeline state.
    pub kv: Arc<dyn KeyValueStore>,
    pool: SqlitePool,
}

impl Database {
    /// Create a Database over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            documents: Arc::new(SqliteTabDocumentRepository::new(pool.clone())),
            navigation: Arc::new(SqliteNavigationEventRepository::new(pool.clone())),
            relationships: Arc::new(SqliteRelationshipRepository::new(pool.clone())),
            workflows: Arc::new(SqliteWorkflowRepository::new(pool.clone())),
            kv: Arc::new(SqliteKv::new(pool.clone())),
            pool,
        }
    }

    /// Connect to a `sqlite:` URL and apply pending migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(pool::url_options(url)?, PoolConfig::default()).await
    }

    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with(pool::file_options(path.as_ref()), PoolConfig::default()).await
    }

    /// Private in-memory database, for tests and for running without a
    /// data directory. Dropped with the last clone.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(pool::MEMORY_URL).await
    }

    /// Connect with custom options and pool configuration, then migrate.
    pub async fn connect_with(
        options: sqlx::sqlite::SqliteConnectOptions,
        config: PoolConfig,
    ) -> Result<Self> {
        let pool = create_pool_with_config(options, config).await?;
        let db = Self::new(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read-only counters for operator surfaces.
    pub async fn stats(&self) -> Result<Stats> {
        pool::log_pool_metrics(&self.pool);
        Ok(Stats {
            total_tabs: self.documents.count().await?,
            indexed_tabs: self.documents.count_indexed().await?,
            relationship_count: self.relationships.count().await?,
            workflow_count: self.workflows.count().await?,
        })
    }
}

/// Encode a record as the JSON stored in a `body` column.
pub(crate) fn to_body<T: Serialize>(record: &T) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

/// Decode a `body` column back into its record.
pub(crate) fn from_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}

/// Microseconds since the epoch, the sort key stored next to timestamps.
pub(crate) fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

/// SQLite integers are signed; counts come back as i64.
pub(crate) fn count_of(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}
