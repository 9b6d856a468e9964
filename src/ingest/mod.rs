// Ingestion module
// Upload -> text -> embedding -> index append -> metadata row, one writer at a time


pub mod consistency;
pub mod extract;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::database::Database;
use crate::database::models::{Document, Metadata, NewDocument};
use crate::embeddings::Embedder;
use crate::index::SharedIndex;
use crate::{NexusError, Result};

pub use consistency::{ConsistencyReport, ConsistencyValidator};
pub use extract::{ExtractedText, PlainTextExtractor, TextExtractor, guess_content_type};

/// Serialises every write that touches the index or the metadata store
pub type WriteGate = Arc<Mutex<()>>;

/// Raw document handed to the ingestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    #[inline]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its content type from the extension unless given
    #[inline]
    pub async fn from_path(path: &Path, content_type: Option<&str>) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(
            filename,
            content_type.unwrap_or_else(|| guess_content_type(path)),
            bytes,
        ))
    }
}

/// What was stored for one upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReceipt {
    pub id: i64,
    pub title: String,
    pub vector_id: u64,
    pub content_type: String,
    pub encoding: String,
    pub text_length: u64,
    pub metadata: Metadata,
}

impl From<Document> for IngestReceipt {
    #[inline]
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            title: document.title,
            vector_id: document.vector_id,
            content_type: document.content_type,
            encoding: document.encoding,
            text_length: document.text_length,
            metadata: document.metadata,
        }
    }
}

/// Write side of the engine. Clones share the same write gate.
#[derive(Clone)]
pub struct Ingestor {
    database: Database,
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn TextExtractor>,
    write_gate: WriteGate,
}

impl std::fmt::Debug for Ingestor {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("embedder", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    #[inline]
    pub fn new(
        database: Database,
        index: SharedIndex,
        embedder: Arc<dyn Embedder>,
        write_gate: WriteGate,
    ) -> Self {
        Self {
            database,
            index,
            embedder,
            extractor: Arc::new(PlainTextExtractor),
            write_gate,
        }
    }

    #[inline]
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Store one upload.
    ///
    /// The vector is appended and the snapshot persisted before the metadata
    /// row is written, all under the write gate. Cancellation is honoured
    /// until the append; afterwards the row write always runs, and a failure
    /// there leaves a logged orphan vector.
    #[inline]
    pub async fn ingest(&self, upload: Upload, cancel: &CancellationToken) -> Result<IngestReceipt> {
        check_cancelled(cancel)?;

        let extracted = self
            .extractor
            .extract(&upload.bytes, &upload.content_type, &upload.filename)?;
        let text_length = extracted.text.chars().count() as u64;
        debug!(
            "Extracted {} characters from {} ({})",
            text_length, upload.filename, extracted.encoding
        );

        let embedding = self.embed(extracted.text.clone(), cancel).await?;
        check_cancelled(cancel)?;

        let _gate = self.write_gate.lock().await;
        check_cancelled(cancel)?;

        let vector_id = {
            let mut index = self.index.write().await;
            let vector_id = index.insert(&embedding)?;
            let index = index.downgrade();

            if let Err(e) = index.persist() {
                error!(
                    "Orphaned vector {}: snapshot persist failed before storing {}: {}",
                    vector_id, upload.filename, e
                );
                return Err(e);
            }
            vector_id
        };

        let mut metadata = Metadata::new();
        metadata.insert("file_size".to_string(), json!(upload.bytes.len()));
        metadata.insert("processed_at".to_string(), json!(Utc::now().to_rfc3339()));

        let new_document = NewDocument {
            title: upload.filename,
            content: extracted.text,
            vector_id,
            content_type: upload.content_type,
            encoding: extracted.encoding,
            text_length,
            metadata,
        };

        let document = match self.database.insert_document(&new_document).await {
            Ok(document) => document,
            Err(e) => {
                error!(
                    "Orphaned vector {}: metadata write for {} failed: {}",
                    vector_id, new_document.title, e
                );
                return Err(e);
            }
        };

        info!(
            "Stored document {} ({}) with vector id {}",
            document.id, document.title, document.vector_id
        );
        Ok(IngestReceipt::from(document))
    }

    /// Remove a document from the store. Its vector stays behind as an orphan.
    #[inline]
    pub async fn retract(&self, id: i64) -> Result<Document> {
        let _gate = self.write_gate.lock().await;

        let document = self
            .database
            .get_document(id)
            .await?
            .ok_or_else(|| NexusError::NotFound(format!("Document {id}")))?;

        if !self.database.delete_document(id).await? {
            return Err(NexusError::NotFound(format!("Document {id}")));
        }

        info!(
            "Retracted document {} ({}); vector {} is no longer referenced",
            id, document.title, document.vector_id
        );
        Ok(document)
    }

    /// Consistency check that runs while no write is in flight
    #[inline]
    pub async fn validate_consistency(&self) -> Result<ConsistencyReport> {
        let _gate = self.write_gate.lock().await;
        ConsistencyValidator::new(&self.database, &self.index)
            .validate()
            .await
    }

    async fn embed(&self, text: String, cancel: &CancellationToken) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(NexusError::Cancelled),
            joined = task => joined
                .map_err(|e| NexusError::Embedding(format!("Embedding task failed: {e}")))?
                .map_err(|e| NexusError::Embedding(format!("{e:#}"))),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        debug!("Ingestion cancelled before any write");
        Err(NexusError::Cancelled)
    } else {
        Ok(())
    }
}
