// Shared fixtures for the integration tests

#![allow(dead_code, reason = "each test binary uses a different subset of helpers")]

use std::path::Path;
use std::sync::Arc;

use nexus_rag::config::Config;
use nexus_rag::embeddings::Embedder;
use nexus_rag::engine::Engine;
use nexus_rag::ingest::Upload;

pub const VOCABULARY: &[&str] = &[
    "rust", "python", "sqlite", "vector", "garden", "music", "ocean", "mountain",
];

/// One dimension per vocabulary word, set when the word occurs in the text
#[derive(Debug, Default)]
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered.split(|c: char| !c.is_alphanumeric()).collect();
        Ok(VOCABULARY
            .iter()
            .map(|word| if tokens.contains(word) { 1.0 } else { 0.0 })
            .collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

pub fn keyword_config(dir: &Path) -> Config {
    let mut config = Config::load(dir).expect("default config");
    config.embedder.provider = "hashing".to_string();
    config.embedder.dimension = VOCABULARY.len() as u32;
    config
}

pub async fn keyword_engine(dir: &Path) -> Engine {
    Engine::open_with_embedder(keyword_config(dir), Arc::new(KeywordEmbedder))
        .await
        .expect("engine opens")
}

pub fn text_upload(name: &str, text: &str) -> Upload {
    Upload::new(name, "text/plain", text.as_bytes().to_vec())
}
