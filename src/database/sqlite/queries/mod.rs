
use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use itertools::Itertools;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, error, warn};

use super::models::*;
use crate::NexusError;

const DOCUMENT_COLUMNS: &str = "id, title, content, vector_id, content_type, encoding, text_length, metadata, created_at";

/// Bound on bind parameters per `IN (...)` lookup
const LOOKUP_BATCH_SIZE: usize = 500;

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a document, refusing to reuse a `vector_id` that is already referenced
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: &NewDocument) -> Result<Document> {
        let vector_id = to_sql_id(new_document.vector_id)?;
        let text_length = i64::try_from(new_document.text_length).unwrap_or(i64::MAX);
        let metadata = new_document.metadata_json()?;
        let now = Utc::now().naive_utc();

        let inserted = sqlx::query(
            "INSERT INTO documents (title, content, vector_id, content_type, encoding, text_length, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_document.title)
        .bind(&new_document.content)
        .bind(vector_id)
        .bind(&new_document.content_type)
        .bind(&new_document.encoding)
        .bind(text_length)
        .bind(metadata)
        .bind(now)
        .execute(pool)
        .await;

        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                error!(
                    "Vector id {} is already referenced by a stored document; metadata and index are out of sync",
                    new_document.vector_id
                );
                return Err(NexusError::DuplicateVectorId(new_document.vector_id).into());
            }
            Err(e) => return Err(e).context("Failed to create document"),
        };

        debug!(
            "Stored document {} for vector {}",
            id, new_document.vector_id
        );

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by id")?;

        row.map(Document::try_from).transpose()
    }

    #[inline]
    pub async fn get_by_vector_id(pool: &SqlitePool, vector_id: u64) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE vector_id = ?"
        ))
        .bind(to_sql_id(vector_id)?)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by vector id")?;

        row.map(Document::try_from).transpose()
    }

    /// Documents for `vector_ids` in the caller's order.
    ///
    /// Ids without a row are omitted, so the output may be shorter than the
    /// input. A repeated id yields its document once, at its first position.
    #[inline]
    pub async fn get_by_vector_ids(pool: &SqlitePool, vector_ids: &[u64]) -> Result<Vec<Document>> {
        let wanted: Vec<u64> = vector_ids.iter().copied().unique().collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: HashMap<u64, Document> = HashMap::with_capacity(wanted.len());

        for batch in wanted.chunks(LOOKUP_BATCH_SIZE) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE vector_id IN ("
            ));
            let mut separated = builder.separated(", ");
            for vector_id in batch {
                separated.push_bind(to_sql_id(*vector_id)?);
            }
            separated.push_unseparated(")");

            let rows = builder
                .build_query_as::<DocumentRow>()
                .fetch_all(pool)
                .await
                .context("Failed to get documents by vector ids")?;

            for row in rows {
                let id = row.id;
                match Document::try_from(row) {
                    Ok(document) => {
                        found.insert(document.vector_id, document);
                    }
                    Err(e) => warn!("Skipping unreadable document row {}: {:#}", id, e),
                }
            }
        }

        let documents: Vec<Document> = wanted
            .iter()
            .filter_map(|vector_id| found.remove(vector_id))
            .collect();

        debug!(
            "Resolved {} of {} requested vector ids",
            documents.len(),
            wanted.len()
        );
        Ok(documents)
    }

    /// Newest documents first
    #[inline]
    pub async fn list(pool: &SqlitePool, limit: u32, offset: u32) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        rows.into_iter().map(Document::try_from).collect()
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count documents")?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Every referenced vector id, ascending
    #[inline]
    pub async fn all_vector_ids(pool: &SqlitePool) -> Result<Vec<u64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT vector_id FROM documents ORDER BY vector_id")
            .fetch_all(pool)
            .await
            .context("Failed to list vector ids")?;

        ids.into_iter()
            .map(|id| u64::try_from(id).context("Stored vector id is negative"))
            .collect()
    }

    /// Remove a document row. Its vector stays in the index, unreferenced.
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }
}

fn to_sql_id(vector_id: u64) -> Result<i64> {
    i64::try_from(vector_id).with_context(|| format!("Vector id {vector_id} exceeds SQLite range"))
}
