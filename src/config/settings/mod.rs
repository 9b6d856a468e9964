
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::DEFAULT_EMBEDDING_DIMENSION;

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "NEXUS_RAG_DIR";

pub const SUPPORTED_PROVIDERS: &[&str] = &["ollama", "hashing"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderConfig {
    pub provider: String,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub dimension: u32,
    pub timeout_seconds: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm:latest".to_string(),
            batch_size: 16,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Results scoring at or below this similarity are dropped
    pub relevance_threshold: f32,
    pub snapshot_file: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.3,
            snapshot_file: "vectors.arrow".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_n: usize,
    pub max_top_n: usize,
    /// Characters returned when no sentence matches the query
    pub chunk_size: usize,
    /// Sentence units kept on each side of the best match
    pub context_size: usize,
    pub refine_acceptance: f32,
    pub refine_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_n: 5,
            max_top_n: 20,
            chunk_size: 500,
            context_size: 100,
            refine_acceptance: 0.8,
            refine_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Words per leaf chunk
    pub chunk_size: usize,
    pub max_children: usize,
    pub summary_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_children: 4,
            summary_chars: 200,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding provider: {0} (must be 'ollama' or 'hashing')")]
    InvalidProvider(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid embedder timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid relevance threshold: {0} (must be in [-1.0, 1.0))")]
    InvalidRelevanceThreshold(f32),
    #[error("Invalid snapshot file name: {0:?}")]
    InvalidSnapshotFile(String),
    #[error("Invalid max top_n: {0} (must be between 1 and 1000)")]
    InvalidMaxTopN(usize),
    #[error("Invalid default top_n: {0} (must be between 1 and max top_n {1})")]
    InvalidDefaultTopN(usize, usize),
    #[error("Invalid retrieval chunk size: {0} (must be between 100 and 2000)")]
    InvalidRetrievalChunkSize(usize),
    #[error("Invalid refine acceptance: {0} (must be between 0.0 and 1.0)")]
    InvalidRefineAcceptance(f32),
    #[error("Invalid refine timeout: {0}ms (must be between 1 and 60000)")]
    InvalidRefineTimeout(u64),
    #[error("Invalid memory chunk size: {0} (must be between 1 and 10000 words)")]
    InvalidMemoryChunkSize(usize),
    #[error("Invalid max children: {0} (must be between 2 and 64)")]
    InvalidMaxChildren(usize),
    #[error("Invalid summary length: {0} (must be between 16 and 4096 characters)")]
    InvalidSummaryChars(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Resolve the data directory: `NEXUS_RAG_DIR` if set, otherwise `~/.nexus-rag`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        dirs::home_dir()
            .map(|home| home.join(".nexus-rag"))
            .or_else(|| dirs::data_dir().map(|data| data.join("nexus-rag")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load the configuration from the default data directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to resolve data directory")?;
        Self::load(config_dir)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedder.validate()?;
        self.index.validate()?;
        self.retrieval.validate()?;
        self.memory.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the SQLite metadata store
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("metadata.db")
    }

    /// Get the path of the vector index snapshot
    #[inline]
    pub fn snapshot_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.index.snapshot_file)
    }

    /// Embedding dimension `D` shared by the embedder, index and memory tree
    #[inline]
    pub fn dimension(&self) -> usize {
        self.embedder.dimension as usize
    }

    #[inline]
    pub fn embedder_url(&self) -> Result<Url, ConfigError> {
        self.embedder.embedder_url()
    }
}

impl EmbedderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(ConfigError::InvalidProvider(self.provider.clone()));
        }

        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.embedder_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(8..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    pub fn embedder_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_provider(&mut self, provider: String) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::InvalidProvider(provider));
        }
        self.provider = provider;
        Ok(())
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbedderConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.embedder_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(8..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.relevance_threshold.is_finite() || !(-1.0..1.0).contains(&self.relevance_threshold)
        {
            return Err(ConfigError::InvalidRelevanceThreshold(
                self.relevance_threshold,
            ));
        }

        let file = self.snapshot_file.trim();
        if file.is_empty() || file.contains('/') || file.contains('\\') {
            return Err(ConfigError::InvalidSnapshotFile(self.snapshot_file.clone()));
        }

        Ok(())
    }

    pub fn set_relevance_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
        let candidate = IndexConfig {
            relevance_threshold: threshold,
            ..self.clone()
        };
        candidate.validate()?;
        self.relevance_threshold = threshold;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.max_top_n) {
            return Err(ConfigError::InvalidMaxTopN(self.max_top_n));
        }

        if self.default_top_n == 0 || self.default_top_n > self.max_top_n {
            return Err(ConfigError::InvalidDefaultTopN(
                self.default_top_n,
                self.max_top_n,
            ));
        }

        if !(100..=2000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidRetrievalChunkSize(self.chunk_size));
        }

        if !(0.0..=1.0).contains(&self.refine_acceptance) {
            return Err(ConfigError::InvalidRefineAcceptance(self.refine_acceptance));
        }

        if !(1..=60_000).contains(&self.refine_timeout_ms) {
            return Err(ConfigError::InvalidRefineTimeout(self.refine_timeout_ms));
        }

        Ok(())
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10_000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidMemoryChunkSize(self.chunk_size));
        }

        if !(2..=64).contains(&self.max_children) {
            return Err(ConfigError::InvalidMaxChildren(self.max_children));
        }

        if !(16..=4096).contains(&self.summary_chars) {
            return Err(ConfigError::InvalidSummaryChars(self.summary_chars));
        }

        Ok(())
    }
}
