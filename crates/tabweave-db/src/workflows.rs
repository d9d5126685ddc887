//! Workflow pattern store keyed by URL chain.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use tabweave_core::{Error, Result, WorkflowPattern, WorkflowRepository};

use crate::{count_of, from_body, to_body};

pub struct SqliteWorkflowRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    async fn upsert(&self, pattern: &WorkflowPattern) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_pattern (chain_key, frequency, body)
            VALUES (?, ?, ?)
            ON CONFLICT(chain_key) DO UPDATE SET
                frequency = excluded.frequency,
                body = excluded.body
            "#,
        )
        .bind(pattern.chain_key())
        .bind(pattern.frequency)
        .bind(to_body(pattern)?)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, chain_key: &str) -> Result<Option<WorkflowPattern>> {
        let row = sqlx::query("SELECT body FROM workflow_pattern WHERE chain_key = ?")
            .bind(chain_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| from_body(r.get("body"))).transpose()
    }

    /// Frequency descending, then chain key for a stable order.
    async fn list_all(&self) -> Result<Vec<WorkflowPattern>> {
        let rows =
            sqlx::query("SELECT body FROM workflow_pattern ORDER BY frequency DESC, chain_key")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        rows.iter().map(|row| from_body(row.get("body"))).collect()
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflow_pattern")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count_of(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Utc;
    use std::sync::Arc;
    use tabweave_core::{workflow_confidence, PatternType};

    fn pattern(urls: &[&str], frequency: u32) -> WorkflowPattern {
        WorkflowPattern {
            sequence: urls.iter().map(|u| u.to_string()).collect(),
            frequency,
            occurrences: vec![],
            last_occurrence: Utc::now(),
            avg_interval_ms: 0,
            confidence: workflow_confidence(frequency),
            pattern_type: PatternType::Sequential,
        }
    }

    async fn repo() -> Arc<dyn WorkflowRepository> {
        Database::in_memory().await.unwrap().workflows
    }

    #[tokio::test]
    async fn test_upsert_keyed_by_chain() {
        let repo = repo().await;
        repo.upsert(&pattern(&["a", "b"], 3)).await.unwrap();
        repo.upsert(&pattern(&["a", "b"], 4)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo.get("a -> b").await.unwrap().unwrap();
        assert_eq!(stored.frequency, 4);
        assert_eq!(stored.sequence, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_sorted_by_frequency() {
        let repo = repo().await;
        repo.upsert(&pattern(&["x", "y"], 3)).await.unwrap();
        repo.upsert(&pattern(&["a", "b"], 7)).await.unwrap();
        repo.upsert(&pattern(&["c", "d"], 3)).await.unwrap();
        let keys: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|p| p.chain_key())
            .collect();
        assert_eq!(keys, vec!["a -> b", "c -> d", "x -> y"]);
    }

    #[tokio::test]
    async fn test_missing_chain_is_none() {
        let repo = repo().await;
        assert!(repo.get("a -> b").await.unwrap().is_none());
    }
}
