//! Relationship store keyed by canonical pair key.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use tabweave_core::{Error, Relationship, RelationshipRepository, Result};

use crate::{count_of, from_body, to_body};

pub struct SqliteRelationshipRepository {
    pool: SqlitePool,
}

impl SqliteRelationshipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn decode_all(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Relationship>> {
    rows.iter().map(|row| from_body(row.get("body"))).collect()
}

#[async_trait]
impl RelationshipRepository for SqliteRelationshipRepository {
    async fn get(&self, pair_key: &str) -> Result<Option<Relationship>> {
        let row = sqlx::query("SELECT body FROM relationship WHERE pair_key = ?")
            .bind(pair_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| from_body(r.get("body"))).transpose()
    }

    async fn upsert(&self, relationship: &Relationship) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO relationship (pair_key, doc_a, doc_b, ai_enriched, body)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(pair_key) DO UPDATE SET
                doc_a = excluded.doc_a,
                doc_b = excluded.doc_b,
                ai_enriched = excluded.ai_enriched,
                body = excluded.body
            "#,
        )
        .bind(relationship.id.as_str())
        .bind(relationship.doc_a.to_string())
        .bind(relationship.doc_b.to_string())
        .bind(relationship.ai_enriched)
        .bind(to_body(relationship)?)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, pair_key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM relationship WHERE pair_key = ?")
            .bind(pair_key)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<Relationship>> {
        let rows = sqlx::query("SELECT body FROM relationship ORDER BY pair_key")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        decode_all(&rows)
    }

    async fn list_unenriched(&self) -> Result<Vec<Relationship>> {
        let rows =
            sqlx::query("SELECT body FROM relationship WHERE ai_enriched = 0 ORDER BY pair_key")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        decode_all(&rows)
    }

    async fn list_for_document(&self, doc_id: Uuid) -> Result<Vec<Relationship>> {
        let id = doc_id.to_string();
        let rows = sqlx::query(
            "SELECT body FROM relationship WHERE doc_a = ? OR doc_b = ? ORDER BY pair_key",
        )
        .bind(&id)
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        decode_all(&rows)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relationship")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count_of(n))
    }
}
