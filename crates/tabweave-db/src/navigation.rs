//! Append-only navigation event log ordered by timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use tabweave_core::{Error, NavigationEvent, NavigationEventRepository, Result};

use crate::{count_of, from_body, micros, to_body};

/// SQLite navigation log. Reads come back sorted by timestamp; events with
/// equal timestamps keep arrival order.
pub struct SqliteNavigationEventRepository {
    pool: SqlitePool,
}

impl SqliteNavigationEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NavigationEventRepository for SqliteNavigationEventRepository {
    async fn append(&self, event: NavigationEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO navigation_event (id, source_id, timestamp_us, body) VALUES (?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(event.source.id.to_string())
        .bind(micros(event.timestamp))
        .bind(to_body(&event)?)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<NavigationEvent>> {
        let rows = sqlx::query(
            "SELECT body FROM navigation_event WHERE timestamp_us >= ? ORDER BY timestamp_us, seq",
        )
        .bind(micros(since))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            let event: NavigationEvent = from_body(row.get("body"))?;
            // The column drops sub-microsecond precision.
            if event.timestamp >= since {
                events.push(event);
            }
        }
        Ok(events)
    }

    async fn list_from_source(&self, doc_id: Uuid, limit: usize) -> Result<Vec<NavigationEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM navigation_event
            WHERE source_id = ?
            ORDER BY timestamp_us DESC, seq DESC
            LIMIT ?
            "#,
        )
        .bind(doc_id.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(|row| from_body(row.get("body"))).collect()
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM navigation_event")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count_of(n))
    }
}
