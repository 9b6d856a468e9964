
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Open key/value map stored alongside each document as JSON text.
///
/// Always a JSON object. Rows whose column holds any other JSON value
/// (array, string, number) fail to convert into a [`Document`].
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A stored document, joined to the vector index through `vector_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub vector_id: u64,
    pub content_type: String,
    pub encoding: String,
    pub text_length: u64,
    pub metadata: Metadata,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub vector_id: u64,
    pub content_type: String,
    pub encoding: String,
    pub text_length: u64,
    pub metadata: Metadata,
}

/// Raw `documents` row as SQLite returns it
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub vector_id: i64,
    pub content_type: String,
    pub encoding: String,
    pub text_length: i64,
    pub metadata: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<DocumentRow> for Document {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(row: DocumentRow) -> Result<Self> {
        let metadata = if row.metadata.trim().is_empty() {
            Metadata::new()
        } else {
            serde_json::from_str(&row.metadata)
                .with_context(|| format!("Document {} has malformed metadata", row.id))?
        };

        Ok(Self {
            id: row.id,
            title: row.title,
            content: row.content,
            vector_id: u64::try_from(row.vector_id)
                .with_context(|| format!("Document {} has a negative vector id", row.id))?,
            content_type: row.content_type,
            encoding: row.encoding,
            text_length: u64::try_from(row.text_length).unwrap_or_default(),
            metadata,
            created_at: row.created_at,
        })
    }
}

impl NewDocument {
    /// Metadata serialised for the `metadata` column
    #[inline]
    pub fn metadata_json(&self) -> Result<String> {
        serde_json::to_string(&self.metadata).context("Failed to serialize document metadata")
    }
}
