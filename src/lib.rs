use thiserror::Error;

pub type Result<T> = std::result::Result<T, NexusError>;

#[derive(Error, Debug)]
pub enum NexusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Text extraction error: {0}")]
    Extraction(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector id {0} is already referenced by a stored document")]
    DuplicateVectorId(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Search fault: {0}")]
    SearchFault(String),

    #[error("Operation cancelled before any durable write")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod engine;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod retrieval;
