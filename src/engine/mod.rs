// Engine module
// Opens the stores described by a `Config` and hands out the read and write sides

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::Database;
use crate::embeddings::{Embedder, create_embedder};
use crate::index::{SharedIndex, VectorIndex};
use crate::ingest::{ConsistencyReport, Ingestor, WriteGate};
use crate::retrieval::Retriever;
use crate::{NexusError, Result};

/// Counts and health of the opened stores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub model: String,
    pub dimension: usize,
    pub relevance_threshold: f32,
    pub documents: u64,
    pub vectors: usize,
    pub consistency: ConsistencyReport,
}

/// Shared handles to the metadata store, vector index and embedder
#[derive(Clone)]
pub struct Engine {
    config: Config,
    database: Database,
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    write_gate: WriteGate,
}

impl std::fmt::Debug for Engine {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("base_dir", &self.config.get_base_dir())
            .field("embedder", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Open with the embedder selected by the configuration
    #[inline]
    pub async fn open(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedder)
            .map_err(|e| NexusError::Embedding(format!("{e:#}")))?;
        Self::open_with_embedder(config, embedder).await
    }

    #[inline]
    pub async fn open_with_embedder(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| NexusError::Config(e.to_string()))?;

        if embedder.dimension() != config.dimension() {
            return Err(NexusError::Config(format!(
                "Embedder {} produces {}-dimensional vectors but the index is configured for {}",
                embedder.model_name(),
                embedder.dimension(),
                config.dimension()
            )));
        }

        let database = Database::initialize_from_config_dir(config.get_base_dir()).await?;
        let mut index = VectorIndex::open(&config);
        reconcile_index(&database, &mut index).await?;
        let index = index.into_shared();

        info!(
            "Opened engine at {} with embedder {} (dimension {})",
            config.get_base_dir().display(),
            embedder.model_name(),
            config.dimension()
        );

        Ok(Self {
            config,
            database,
            index,
            embedder,
            write_gate: WriteGate::default(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    #[inline]
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    #[inline]
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            self.database.clone(),
            Arc::clone(&self.index),
            Arc::clone(&self.embedder),
            Arc::clone(&self.write_gate),
        )
    }

    #[inline]
    pub fn retriever(&self) -> Retriever {
        Retriever::new(
            self.database.clone(),
            Arc::clone(&self.index),
            Arc::clone(&self.embedder),
            &self.config,
        )
    }

    #[inline]
    pub async fn status(&self) -> Result<EngineStatus> {
        let consistency = self.ingestor().validate_consistency().await?;

        Ok(EngineStatus {
            model: self.embedder.model_name().to_string(),
            dimension: self.config.dimension(),
            relevance_threshold: self.config.index.relevance_threshold,
            documents: consistency.stored_documents as u64,
            vectors: consistency.indexed_vectors,
            consistency,
        })
    }

    #[inline]
    pub async fn close(&self) {
        self.database.close().await;
    }
}

/// Make every `vector_id` held by the metadata store addressable in the index.
///
/// A snapshot that was lost or quarantined leaves the index shorter than the
/// ids already handed out. Without padding, the next insert would reuse one of
/// those positions and searches would resolve to the wrong document.
async fn reconcile_index(database: &Database, index: &mut VectorIndex) -> Result<()> {
    let Some(&highest) = database.all_vector_ids().await?.last() else {
        return Ok(());
    };

    if highest < index.size() as u64 {
        return Ok(());
    }

    let reserved = index.reserve_through(highest);
    warn!(
        "Vector index held fewer vectors than the metadata store references; \
         reserved {} positions, affected documents will not match searches",
        reserved
    );
    index.persist()
}
