// Embeddings module
// The text -> vector boundary: the `Embedder` capability, its providers and vector helpers


pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use anyhow::Result;

use crate::config::EmbedderConfig;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// Output width of all-MiniLM-L6-v2, the reference sentence model
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

/// Maps text to a fixed-length vector.
///
/// Implementations are synchronous and must be deterministic for identical
/// input. They may block (network, model inference); async callers run them
/// on the blocking pool.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Build the embedder selected by `provider`
#[inline]
pub fn create_embedder(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaClient::new(config)?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension as usize))),
        other => Err(anyhow::anyhow!("Unknown embedding provider: {}", other)),
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
#[inline]
pub fn normalize(vector: &mut [f32]) -> bool {
    let norm = l2_norm(vector);
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
    true
}

#[inline]
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Element-wise mean; `None` for an empty input
#[inline]
pub fn mean<'a, I>(vectors: I) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = vectors.into_iter();
    let mut sum = iter.next()?.to_vec();
    let mut count = 1usize;

    for vector in iter {
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += value;
        }
        count += 1;
    }

    let divisor = count as f32;
    for value in &mut sum {
        *value /= divisor;
    }
    Some(sum)
}
