// Query refinement capability
// Optional rewrite of a query before it is embedded

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::Serialize;

/// A proposed rewrite and the refiner's confidence in it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub query: String,
    /// In `[0, 1]`
    pub confidence: f32,
}

impl Refinement {
    #[inline]
    pub fn new(query: impl Into<String>, confidence: f32) -> Self {
        Self {
            query: query.into(),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
        }
    }

    /// Whether the rewrite clears `acceptance`
    #[inline]
    pub fn is_accepted(&self, acceptance: f32) -> bool {
        self.confidence > acceptance
    }
}

/// Rewrites queries before retrieval.
///
/// Implementations must return promptly; callers bound each call with a
/// timeout and keep the original query when it elapses.
#[async_trait]
pub trait QueryRefiner: Send + Sync {
    async fn refine(&self, query: &str, context: Option<&str>) -> anyhow::Result<Refinement>;

    /// Split a compound question into independent queries
    async fn sub_queries(&self, query: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec![query.to_string()])
    }

    fn name(&self) -> &'static str;
}

/// Pass-through refiner: returns the query unchanged with full confidence
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRefiner;

#[async_trait]
impl QueryRefiner for IdentityRefiner {
    async fn refine(&self, query: &str, _context: Option<&str>) -> anyhow::Result<Refinement> {
        Ok(Refinement::new(query, 1.0))
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}
