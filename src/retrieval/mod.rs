// Retrieval module
// Query -> embedding -> index search -> metadata join -> relevant spans


pub mod refiner;
pub mod span;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, RetrievalConfig};
use crate::database::Database;
use crate::database::models::{Document, Metadata};
use crate::embeddings::Embedder;
use crate::index::SharedIndex;
use crate::memory::{MemoryNode, MemoryTreeBuilder};
use crate::{NexusError, Result};

pub use refiner::{IdentityRefiner, QueryRefiner, Refinement};
pub use span::SpanExtractor;

pub const MIN_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 2000;

const NO_RESULTS_MESSAGE: &str = "No matching documents found";

/// Parameters of one search call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_n: usize,
    pub include_content: bool,
    /// Characters returned when no sentence matches the query
    pub chunk_size: usize,
}

impl SearchRequest {
    #[inline]
    pub fn new(query: impl Into<String>) -> Self {
        let defaults = RetrievalConfig::default();
        Self {
            query: query.into(),
            top_n: defaults.default_top_n,
            include_content: false,
            chunk_size: defaults.chunk_size,
        }
    }

    #[inline]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    #[inline]
    pub fn with_content(mut self, include_content: bool) -> Self {
        self.include_content = include_content;
        self
    }

    #[inline]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Copy with `top_n` and `chunk_size` pulled into their accepted ranges
    #[inline]
    pub fn clamped(&self, max_top_n: usize) -> Self {
        Self {
            query: self.query.trim().to_string(),
            top_n: self.top_n.clamp(1, max_top_n.max(1)),
            include_content: self.include_content,
            chunk_size: self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
        }
    }
}

/// A resolved document with its similarity score and excerpt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub vector_id: u64,
    pub content_type: String,
    pub encoding: String,
    pub text_length: u64,
    pub metadata: Metadata,
    pub created_at: NaiveDateTime,
    pub similarity_score: f32,
    pub relevant_span: String,
}

impl SearchHit {
    fn new(document: Document, similarity_score: f32, relevant_span: String, include_content: bool) -> Self {
        Self {
            id: document.id,
            title: document.title,
            content: include_content.then_some(document.content),
            vector_id: document.vector_id,
            content_type: document.content_type,
            encoding: document.encoding,
            text_length: document.text_length,
            metadata: document.metadata,
            created_at: document.created_at,
            similarity_score,
            relevant_span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub message: String,
}

impl SearchResponse {
    fn empty(query: &str, message: &str) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            total: 0,
            message: message.to_string(),
        }
    }

    fn found(query: &str, results: Vec<SearchHit>) -> Self {
        if results.is_empty() {
            return Self::empty(query, NO_RESULTS_MESSAGE);
        }
        Self {
            query: query.to_string(),
            total: results.len(),
            message: format!("Found {} matching documents", results.len()),
            results,
        }
    }
}

/// Read side of the engine. Cheap to clone; safe to share across tasks.
#[derive(Clone)]
pub struct Retriever {
    database: Database,
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    refiner: Arc<dyn QueryRefiner>,
    memory: MemoryTreeBuilder,
    config: RetrievalConfig,
}

impl std::fmt::Debug for Retriever {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_name())
            .field("refiner", &self.refiner.name())
            .field("memory", &self.memory)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    #[inline]
    pub fn new(
        database: Database,
        index: SharedIndex,
        embedder: Arc<dyn Embedder>,
        config: &Config,
    ) -> Self {
        let memory = MemoryTreeBuilder::new(Arc::clone(&embedder), &config.memory);
        Self {
            database,
            index,
            embedder,
            refiner: Arc::new(IdentityRefiner),
            memory,
            config: config.retrieval.clone(),
        }
    }

    #[inline]
    pub fn with_refiner(mut self, refiner: Arc<dyn QueryRefiner>) -> Self {
        self.refiner = refiner;
        self
    }

    #[inline]
    pub fn with_memory_builder(mut self, memory: MemoryTreeBuilder) -> Self {
        self.memory = memory;
        self
    }

    /// Ranked search. Never fails: faults and cancellation yield an empty response.
    #[inline]
    pub async fn search(&self, request: &SearchRequest, cancel: &CancellationToken) -> SearchResponse {
        let request = request.clamped(self.config.max_top_n);

        if request.query.is_empty() {
            return SearchResponse::empty(&request.query, "Query must not be empty");
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Search for '{}' cancelled", request.query);
                SearchResponse::empty(&request.query, "Search cancelled")
            }
            outcome = self.run_search(&request) => match outcome {
                Ok(hits) => SearchResponse::found(&request.query, hits),
                Err(e) => {
                    error!("Search fault for query '{}': {}", request.query, e);
                    SearchResponse::empty(&request.query, NO_RESULTS_MESSAGE)
                }
            },
        }
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let query = self.refine_query(&request.query).await;
        let vector = self.embed_query(&query).await?;

        let hits = {
            let index = self.index.read().await;
            if index.is_empty() {
                debug!("Index is empty, nothing to search");
                return Ok(Vec::new());
            }
            let k = request.top_n.min(index.size());
            index
                .search(&vector, k)
                .map_err(|e| NexusError::SearchFault(format!("Index search failed: {e}")))?
        };

        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let positions: Vec<u64> = hits.iter().map(|hit| hit.position).collect();
        let mut documents: HashMap<u64, Document> = self
            .database
            .get_documents_by_vector_ids(&positions)
            .await
            .map_err(|e| NexusError::SearchFault(format!("Metadata lookup failed: {e}")))?
            .into_iter()
            .map(|document| (document.vector_id, document))
            .collect();

        let extractor = SpanExtractor::new(request.chunk_size, self.config.context_size);

        let results: Vec<SearchHit> = hits
            .into_iter()
            .filter_map(|hit| {
                let Some(document) = documents.remove(&hit.position) else {
                    warn!(
                        "Vector {} (score {:.3}) has no stored document, skipping",
                        hit.position, hit.score
                    );
                    return None;
                };
                let span = extractor.extract(&document.content, &query);
                Some(SearchHit::new(document, hit.score, span, request.include_content))
            })
            .collect();

        debug!("Search for '{}' resolved {} documents", query, results.len());
        Ok(results)
    }

    /// Apply the refiner, keeping `query` unless the rewrite is confident enough
    #[inline]
    pub async fn refine_query(&self, query: &str) -> String {
        let timeout = Duration::from_millis(self.config.refine_timeout_ms);

        match tokio::time::timeout(timeout, self.refiner.refine(query, None)).await {
            Ok(Ok(refinement))
                if refinement.is_accepted(self.config.refine_acceptance)
                    && !refinement.query.trim().is_empty() =>
            {
                if refinement.query != query {
                    debug!(
                        "Refined query '{}' -> '{}' (confidence {:.2})",
                        query, refinement.query, refinement.confidence
                    );
                }
                refinement.query
            }
            Ok(Ok(refinement)) => {
                debug!(
                    "Keeping original query; {} refiner confidence {:.2} is below {:.2}",
                    self.refiner.name(),
                    refinement.confidence,
                    self.config.refine_acceptance
                );
                query.to_string()
            }
            Ok(Err(e)) => {
                warn!("Query refiner {} failed: {:#}", self.refiner.name(), e);
                query.to_string()
            }
            Err(_) => {
                warn!(
                    "Query refiner {} timed out after {:?}",
                    self.refiner.name(),
                    timeout
                );
                query.to_string()
            }
        }
    }

    /// Decompose `query` with the refiner, falling back to the query alone
    #[inline]
    pub async fn sub_queries(&self, query: &str) -> Vec<String> {
        let timeout = Duration::from_millis(self.config.refine_timeout_ms);

        match tokio::time::timeout(timeout, self.refiner.sub_queries(query)).await {
            Ok(Ok(queries)) if !queries.is_empty() => queries,
            Ok(Ok(_)) => vec![query.to_string()],
            Ok(Err(e)) => {
                warn!("Sub-query generation failed: {:#}", e);
                vec![query.to_string()]
            }
            Err(_) => {
                warn!("Sub-query generation timed out after {:?}", timeout);
                vec![query.to_string()]
            }
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();

        tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| NexusError::SearchFault(format!("Embedding task failed: {e}")))?
            .map_err(|e| NexusError::SearchFault(format!("Query embedding failed: {e:#}")))
    }

    /// Stored document by id
    #[inline]
    pub async fn get_document(&self, id: i64) -> Result<Document> {
        self.database
            .get_document(id)
            .await?
            .ok_or_else(|| NexusError::NotFound(format!("Document {id}")))
    }

    /// Memory tree over a stored document, built for this call only
    #[inline]
    pub async fn memory_tree(&self, id: i64, chunk_size: Option<usize>) -> Result<MemoryNode> {
        let document = self.get_document(id).await?;

        let mut builder = self.memory.clone();
        if let Some(chunk_size) = chunk_size {
            builder = builder.with_chunk_size(chunk_size);
        }

        let tree = tokio::task::spawn_blocking(move || builder.build(&document.content))
            .await
            .map_err(|e| NexusError::Other(anyhow::anyhow!("Memory tree task failed: {e}")))??;

        debug!(
            "Memory tree for document {}: {} leaves, height {}",
            id,
            tree.leaf_count(),
            tree.height()
        );
        Ok(tree)
    }
}
