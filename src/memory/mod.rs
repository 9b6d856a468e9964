// Memory tree module
// Hierarchical chunk summaries of a single document, rebuilt per request

#[cfg(test)]
mod tests;

pub mod clustering;
pub mod summarizer;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::MemoryConfig;
use crate::embeddings::{Embedder, mean};
use crate::{NexusError, Result};

pub use clustering::{BalancedKMeansClustering, ClusteringStrategy, ContiguousClustering};
pub use summarizer::{Summarizer, TruncatingSummarizer};

/// One node of a memory tree. Children are owned exclusively by their parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryNode {
    /// Chunk text for leaves, empty for internal nodes
    pub content: String,
    pub embedding: Vec<f32>,
    pub children: Vec<MemoryNode>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl MemoryNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Edges on the longest path from this node to a leaf
    #[inline]
    pub fn height(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.height() + 1)
            .max()
            .unwrap_or(0)
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(Self::leaf_count).sum()
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Text a parent summarises this node by
    fn digest(&self) -> &str {
        if self.is_leaf() {
            &self.content
        } else {
            &self.summary
        }
    }
}

/// Builds memory trees bottom-up from word chunks
#[derive(Clone)]
pub struct MemoryTreeBuilder {
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    max_children: usize,
    summarizer: Arc<dyn Summarizer>,
    clustering: Arc<dyn ClusteringStrategy>,
}

impl std::fmt::Debug for MemoryTreeBuilder {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTreeBuilder")
            .field("embedder", &self.embedder.model_name())
            .field("chunk_size", &self.chunk_size)
            .field("max_children", &self.max_children)
            .field("clustering", &self.clustering.name())
            .finish_non_exhaustive()
    }
}

impl MemoryTreeBuilder {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, config: &MemoryConfig) -> Self {
        Self {
            embedder,
            chunk_size: config.chunk_size.max(1),
            max_children: config.max_children.max(2),
            summarizer: Arc::new(TruncatingSummarizer::new(config.summary_chars)),
            clustering: Arc::new(ContiguousClustering),
        }
    }

    #[inline]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[inline]
    pub fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children.max(2);
        self
    }

    #[inline]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    #[inline]
    pub fn with_clustering(mut self, clustering: Arc<dyn ClusteringStrategy>) -> Self {
        self.clustering = clustering;
        self
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Build the tree for `text`.
    ///
    /// Calls the embedder synchronously; run on a blocking thread from async code.
    #[inline]
    pub fn build(&self, text: &str) -> Result<MemoryNode> {
        let chunks = chunk_words(text, self.chunk_size);
        let mut level = self.leaves(chunks)?;

        let leaf_count = level.len();
        let mut levels = 0usize;

        while level.len() > 1 {
            level = self.merge_level(level);
            levels += 1;
        }

        debug!(
            "Built memory tree with {} leaves over {} levels using {} clustering",
            leaf_count,
            levels,
            self.clustering.name()
        );

        level
            .pop()
            .ok_or_else(|| NexusError::Other(anyhow::anyhow!("Memory tree has no root")))
    }

    fn leaves(&self, chunks: Vec<String>) -> Result<Vec<MemoryNode>> {
        let dimension = self.embedder.dimension();

        if chunks.is_empty() {
            return Ok(vec![MemoryNode {
                content: String::new(),
                embedding: vec![0.0; dimension],
                children: Vec::new(),
                summary: String::new(),
                created_at: Utc::now(),
            }]);
        }

        let embeddings = self
            .embedder
            .embed_batch(&chunks)
            .map_err(|e| NexusError::Embedding(format!("{e:#}")))?;

        if embeddings.len() != chunks.len() {
            return Err(NexusError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        chunks
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| {
                if embedding.len() != dimension {
                    return Err(NexusError::DimensionMismatch {
                        expected: dimension,
                        actual: embedding.len(),
                    });
                }
                Ok(MemoryNode {
                    summary: self.summarizer.summarize(&content),
                    content,
                    embedding,
                    children: Vec::new(),
                    created_at: Utc::now(),
                })
            })
            .collect()
    }

    fn merge_level(&self, level: Vec<MemoryNode>) -> Vec<MemoryNode> {
        let embeddings: Vec<&[f32]> = level.iter().map(|n| n.embedding.as_slice()).collect();
        let mut groups = self.clustering.cluster(&embeddings, self.max_children);

        if !is_valid_grouping(&groups, level.len(), self.max_children) {
            warn!(
                "{} clustering produced an invalid grouping for {} nodes, using contiguous groups",
                self.clustering.name(),
                level.len()
            );
            groups = ContiguousClustering.cluster(&embeddings, self.max_children);
        }

        let mut slots: Vec<Option<MemoryNode>> = level.into_iter().map(Some).collect();

        groups
            .into_iter()
            .map(|group| {
                let children: Vec<MemoryNode> = group
                    .into_iter()
                    .filter_map(|index| slots.get_mut(index).and_then(Option::take))
                    .collect();
                self.parent(children)
            })
            .collect()
    }

    fn parent(&self, children: Vec<MemoryNode>) -> MemoryNode {
        let embedding = mean(children.iter().map(|c| c.embedding.as_slice()))
            .unwrap_or_else(|| vec![0.0; self.embedder.dimension()]);
        let combined = children.iter().map(MemoryNode::digest).join(" ");

        MemoryNode {
            content: String::new(),
            embedding,
            summary: self.summarizer.summarize(&combined),
            children,
            created_at: Utc::now(),
        }
    }
}

/// Split `text` into consecutive chunks of at most `chunk_size` words
#[inline]
pub fn chunk_words(text: &str, chunk_size: usize) -> Vec<String> {
    text.split_whitespace()
        .chunks(chunk_size.max(1))
        .into_iter()
        .map(|mut words| words.join(" "))
        .collect()
}

fn is_valid_grouping(groups: &[Vec<usize>], n: usize, max_children: usize) -> bool {
    if n > 1 && groups.len() >= n {
        return false;
    }

    let mut seen = vec![false; n];
    for group in groups {
        if group.is_empty() || group.len() > max_children {
            return false;
        }
        for &index in group {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
    }
    seen.into_iter().all(|s| s)
}
