// Vector index module
// Append-only collection of unit vectors addressed by insertion position

#[cfg(test)]
mod tests;

pub mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::normalize;
use crate::{NexusError, Result};

/// Index shared between concurrent searches and the single ingestion writer
pub type SharedIndex = Arc<RwLock<VectorIndex>>;

/// A stored vector's position and its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPosition {
    pub position: u64,
    pub score: f32,
}

/// Flat inner-product index over unit-normalised vectors.
///
/// Vectors are stored row-major in one buffer and addressed by their
/// 0-based insertion position, which doubles as the document `vector_id`.
/// Nothing is ever removed or rewritten.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    relevance_threshold: f32,
    vectors: Vec<f32>,
    snapshot_path: Option<PathBuf>,
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize, relevance_threshold: f32) -> Self {
        Self {
            dimension,
            relevance_threshold,
            vectors: Vec::new(),
            snapshot_path: None,
        }
    }

    #[inline]
    pub fn with_snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Open the index described by `config`, loading its snapshot if one exists
    #[inline]
    pub fn open(config: &Config) -> Self {
        Self::load(
            config.snapshot_path(),
            config.dimension(),
            config.index.relevance_threshold,
        )
    }

    /// Load a snapshot, falling back to an empty index when it is missing or unreadable
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P, dimension: usize, relevance_threshold: f32) -> Self {
        let path = path.as_ref();
        let mut index = Self::new(dimension, relevance_threshold).with_snapshot_path(path);

        if !path.exists() {
            info!(
                "No vector snapshot at {}, starting with an empty index",
                path.display()
            );
            return index;
        }

        match snapshot::read_snapshot(path, dimension) {
            Ok(vectors) => {
                index.vectors = vectors;
                info!(
                    "Loaded vector index with {} vectors from {}",
                    index.size(),
                    path.display()
                );
            }
            Err(e) => {
                warn!("{}; falling back to an empty index", e);
                snapshot::quarantine(path);
            }
        }

        index
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn relevance_threshold(&self) -> f32 {
        self.relevance_threshold
    }

    #[inline]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Number of stored vectors
    #[inline]
    pub fn size(&self) -> usize {
        self.vectors.len() / self.dimension.max(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Stored (normalised) vector at `position`
    #[inline]
    pub fn vector(&self, position: u64) -> Option<&[f32]> {
        let start = usize::try_from(position).ok()?.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Append a unit-normalised copy of `vector` and return its position
    #[inline]
    pub fn insert(&mut self, vector: &[f32]) -> Result<u64> {
        self.check_dimension(vector)?;

        let position = self.size() as u64;
        let start = self.vectors.len();
        self.vectors.extend_from_slice(vector);

        if !normalize(&mut self.vectors[start..]) {
            warn!(
                "Vector at position {} has zero norm and can never match a query",
                position
            );
        }

        debug!("Inserted vector at position {}", position);
        Ok(position)
    }

    /// Append zero vectors until `position` is addressable and return how many were added.
    ///
    /// Used when the metadata store references positions a lost snapshot no
    /// longer holds. The filler scores 0 against every query, so those
    /// positions stay occupied without ever matching.
    #[inline]
    pub fn reserve_through(&mut self, position: u64) -> usize {
        let Ok(position) = usize::try_from(position) else {
            return 0;
        };
        let missing = position.saturating_add(1).saturating_sub(self.size());
        if missing > 0 {
            self.vectors.resize(self.vectors.len() + missing * self.dimension, 0.0);
            debug!(
                "Reserved {} empty vectors so position {} is addressable",
                missing, position
            );
        }
        missing
    }

    /// Up to `k` positions scoring above the relevance threshold, best first.
    ///
    /// Scores are inner products of unit vectors (cosine similarity). Equal
    /// scores are ordered by ascending position.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPosition>> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let results = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| ScoredPosition {
                position: position as u64,
                score: crate::embeddings::dot(&query, stored),
            })
            .filter(|hit| hit.score > self.relevance_threshold)
            .sorted_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.position.cmp(&b.position))
            })
            .take(k)
            .collect::<Vec<_>>();

        debug!(
            "Index search over {} vectors returned {} hits (k = {})",
            self.size(),
            results.len(),
            k
        );
        Ok(results)
    }

    /// Write the current contents to the snapshot path.
    ///
    /// Every call rewrites the whole snapshot, so the cost grows with
    /// `size() * dimension`. Ingestion persists after each insert while
    /// holding the write gate, which serialises writers behind this rewrite.
    #[inline]
    pub fn persist(&self) -> Result<()> {
        let path = self.snapshot_path.as_deref().ok_or_else(|| {
            NexusError::Snapshot("Index has no snapshot path configured".to_string())
        })?;

        snapshot::write_snapshot(path, self.dimension, &self.vectors)?;
        debug!(
            "Persisted {} vectors to {}",
            self.size(),
            path.display()
        );
        Ok(())
    }

    /// Wrap into the shared handle used by the engine
    #[inline]
    pub fn into_shared(self) -> SharedIndex {
        Arc::new(RwLock::new(self))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(NexusError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }
}
