// Consistency validation between the vector index and the metadata store
// Orphans are reported, never reclaimed: positions are identities

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::Database;
use crate::index::SharedIndex;

/// Cross-store consistency check results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Number of vectors in the index
    pub indexed_vectors: usize,
    /// Number of document rows
    pub stored_documents: usize,
    /// Index positions no document references
    pub orphaned_vectors: Vec<u64>,
    /// Vector ids referenced by documents but beyond the end of the index
    pub dangling_documents: Vec<u64>,
    /// Overall consistency status
    pub is_consistent: bool,
}

/// Compares index positions with the vector ids stored in the metadata store
pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    index: &'a SharedIndex,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, index: &'a SharedIndex) -> Self {
        Self { database, index }
    }

    /// Run the check. Callers that ingest concurrently should hold the write gate.
    #[inline]
    pub async fn validate(&self) -> Result<ConsistencyReport> {
        info!("Starting index/metadata consistency validation");

        let stored_ids = self.database.all_vector_ids().await?;
        let indexed_vectors = self.index.read().await.size();
        debug!(
            "Found {} vectors in the index and {} document rows",
            indexed_vectors,
            stored_ids.len()
        );

        let report = ConsistencyReport::from_parts(indexed_vectors, &stored_ids);

        if report.is_consistent {
            info!("Consistency validation passed");
        } else {
            warn!("Consistency validation found issues");
            log_consistency_issues(&report);
        }

        Ok(report)
    }
}

impl ConsistencyReport {
    /// Build a report from the index size and every stored vector id
    #[inline]
    pub fn from_parts(indexed_vectors: usize, stored_ids: &[u64]) -> Self {
        let referenced: HashSet<u64> = stored_ids.iter().copied().collect();
        let indexed = indexed_vectors as u64;

        let orphaned_vectors: Vec<u64> = (0..indexed).filter(|id| !referenced.contains(id)).collect();
        let mut dangling_documents: Vec<u64> = stored_ids
            .iter()
            .copied()
            .filter(|id| *id >= indexed)
            .collect();
        dangling_documents.sort_unstable();

        let is_consistent = orphaned_vectors.is_empty() && dangling_documents.is_empty();

        Self {
            indexed_vectors,
            stored_documents: stored_ids.len(),
            orphaned_vectors,
            dangling_documents,
            is_consistent,
        }
    }

    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Stores are consistent: {} vectors indexed, {} documents stored",
                self.indexed_vectors, self.stored_documents
            )
        } else {
            format!(
                "Inconsistencies found: {} orphaned vectors (excluded from results), {} documents without a vector",
                self.orphaned_vectors.len(),
                self.dangling_documents.len()
            )
        }
    }

    /// Get the total number of consistency issues
    #[inline]
    pub fn total_issues(&self) -> usize {
        self.orphaned_vectors.len() + self.dangling_documents.len()
    }
}

fn log_consistency_issues(report: &ConsistencyReport) {
    if !report.orphaned_vectors.is_empty() {
        warn!(
            "Found {} index vectors without a document: {:?}",
            report.orphaned_vectors.len(),
            report.orphaned_vectors
        );
    }

    if !report.dangling_documents.is_empty() {
        warn!(
            "Found {} documents pointing past the end of the index: {:?}",
            report.dangling_documents.len(),
            report.dangling_documents
        );
    }
}
