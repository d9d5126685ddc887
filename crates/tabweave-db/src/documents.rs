//! Tab document store with secondary lookups by runtime handle and url hash.

use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use tabweave_core::{
    ContentUpdate, Error, Result, TabDocument, TabDocumentRepository, TabHandle,
};

use crate::{count_of, from_body, micros, to_body};

/// SQLite implementation of TabDocumentRepository.
pub struct SqliteTabDocumentRepository {
    pool: SqlitePool,
}

impl SqliteTabDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_many(&self, sql: &str) -> Result<Vec<TabDocument>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(|row| from_body(row.get("body"))).collect()
    }
}

/// Upsert one row, mirroring the indexed fields out of the document.
async fn write_row(conn: &mut SqliteConnection, doc: &TabDocument) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tab_document
            (id, tab_handle, url_hash, is_active, is_indexed, is_enriched,
             created_us, last_indexed_us, body)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            tab_handle = excluded.tab_handle,
            url_hash = excluded.url_hash,
            is_active = excluded.is_active,
            is_indexed = excluded.is_indexed,
            is_enriched = excluded.is_enriched,
            created_us = excluded.created_us,
            last_indexed_us = excluded.last_indexed_us,
            body = excluded.body
        "#,
    )
    .bind(doc.id.to_string())
    .bind(doc.tab_handle)
    .bind(doc.url_hash.as_str())
    .bind(doc.is_active)
    .bind(doc.is_indexed)
    .bind(doc.is_enriched())
    .bind(micros(doc.created_at))
    .bind(doc.last_indexed_at.map(micros))
    .bind(to_body(doc)?)
    .execute(&mut *conn)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

/// Take `handle` away from every document other than `keep`.
async fn detach_handle(conn: &mut SqliteConnection, handle: TabHandle, keep: Uuid) -> Result<()> {
    let rows = sqlx::query("SELECT body FROM tab_document WHERE tab_handle = ? AND id <> ?")
        .bind(handle)
        .bind(keep.to_string())
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::Database)?;

    for row in rows {
        let mut stale: TabDocument = from_body(row.get("body"))?;
        debug!(
            subsystem = "db",
            component = "documents",
            tab_handle = handle,
            doc_id = %stale.id,
            "Detaching handle from stale document"
        );
        stale.tab_handle = None;
        write_row(conn, &stale).await?;
    }
    Ok(())
}

/// Store `doc`, keeping the handle exclusive.
async fn put(conn: &mut SqliteConnection, doc: &TabDocument) -> Result<()> {
    if let Some(handle) = doc.tab_handle {
        detach_handle(conn, handle, doc.id).await?;
    }
    write_row(conn, doc).await
}

async fn exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM tab_document WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::Database)?;
    Ok(row.is_some())
}

#[async_trait]
impl TabDocumentRepository for SqliteTabDocumentRepository {
    async fn insert(&self, doc: TabDocument) -> Result<Uuid> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if exists(&mut *tx, doc.id).await? {
            return Err(Error::InvalidInput(format!(
                "Tab document already exists: {}",
                doc.id
            )));
        }
        put(&mut *tx, &doc).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(doc.id)
    }

    async fn update(&self, doc: &TabDocument) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if !exists(&mut *tx, doc.id).await? {
            return Err(Error::DocumentNotFound(doc.id));
        }
        put(&mut *tx, doc).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn update_content(
        &self,
        id: Uuid,
        handle: TabHandle,
        update: &ContentUpdate,
    ) -> Result<Option<TabDocument>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let row = sqlx::query("SELECT body FROM tab_document WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut doc: TabDocument = from_body(row.get("body"))?;
        if !doc.is_active || doc.tab_handle != Some(handle) {
            debug!(
                subsystem = "db",
                component = "documents",
                doc_id = %id,
                tab_handle = handle,
                is_active = doc.is_active,
                "Document left its tab during enrichment, discarding content"
            );
            return Ok(None);
        }

        update.apply(&mut doc);
        write_row(&mut *tx, &doc).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(Some(doc))
    }

    async fn get(&self, id: Uuid) -> Result<Option<TabDocument>> {
        let row = sqlx::query("SELECT body FROM tab_document WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| from_body(r.get("body"))).transpose()
    }

    async fn find_by_handle(&self, handle: TabHandle) -> Result<Option<TabDocument>> {
        let row = sqlx::query("SELECT body FROM tab_document WHERE tab_handle = ?")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| from_body(r.get("body"))).transpose()
    }

    async fn find_by_url_hash(&self, url_hash: &str) -> Result<Option<TabDocument>> {
        // Prefer the live document when a retired one shares the URL.
        let row = sqlx::query(
            r#"
            SELECT body FROM tab_document
            WHERE url_hash = ?
            ORDER BY is_active DESC, created_us DESC, id
            LIMIT 1
            "#,
        )
        .bind(url_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.map(|r| from_body(r.get("body"))).transpose()
    }

    async fn list_all(&self) -> Result<Vec<TabDocument>> {
        self.fetch_many("SELECT body FROM tab_document ORDER BY created_us, id")
            .await
    }

    async fn list_active(&self) -> Result<Vec<TabDocument>> {
        self.fetch_many(
            r#"
            SELECT body FROM tab_document
            WHERE is_active = 1
            ORDER BY COALESCE(tab_handle, 9223372036854775807), id
            "#,
        )
        .await
    }

    async fn list_recently_indexed(&self, limit: usize) -> Result<Vec<TabDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM tab_document
            WHERE is_enriched = 1
            ORDER BY last_indexed_us DESC, id
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(|row| from_body(row.get("body"))).collect()
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tab_document")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count_of(n))
    }

    async fn count_indexed(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tab_document WHERE is_indexed = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count_of(n))
    }
}
