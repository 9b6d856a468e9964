use super::*;
use crate::embeddings::HashingEmbedder;
use crate::ingest::Upload;
use crate::retrieval::SearchRequest;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn hashing_config(dir: &TempDir) -> Config {
    let mut config = Config::load(dir.path()).expect("defaults");
    config.embedder.provider = "hashing".to_string();
    config.embedder.dimension = 64;
    config
}

#[tokio::test]
async fn open_creates_stores_in_base_dir() {
    let dir = TempDir::new().expect("temp dir");
    let engine = Engine::open(hashing_config(&dir)).await.expect("open");

    assert!(dir.path().join("metadata.db").exists());
    assert_eq!(engine.embedder().model_name(), "hashing");
    assert_eq!(engine.index().read().await.dimension(), 64);
}

#[tokio::test]
async fn mismatched_embedder_dimension_is_a_config_error() {
    let dir = TempDir::new().expect("temp dir");
    let result =
        Engine::open_with_embedder(hashing_config(&dir), Arc::new(HashingEmbedder::new(32))).await;

    assert!(matches!(result, Err(NexusError::Config(_))));
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = hashing_config(&dir);
    config.memory.max_children = 1;

    assert!(matches!(
        Engine::open(config).await,
        Err(NexusError::Config(_))
    ));
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let cancel = CancellationToken::new();

    {
        let engine = Engine::open(hashing_config(&dir)).await.expect("open");
        engine
            .ingestor()
            .ingest(
                Upload::new("a.txt", "text/plain", b"sqlite vector index".to_vec()),
                &cancel,
            )
            .await
            .expect("ingest");
        engine.close().await;
    }

    let engine = Engine::open(hashing_config(&dir)).await.expect("reopen");
    let status = engine.status().await.expect("status");
    assert_eq!(status.documents, 1);
    assert_eq!(status.vectors, 1);
    assert!(status.consistency.is_consistent);

    let response = engine
        .retriever()
        .search(&SearchRequest::new("sqlite vector index"), &cancel)
        .await;
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].vector_id, 0);
}

#[tokio::test]
async fn open_pads_index_behind_metadata_store() {
    let dir = TempDir::new().expect("temp dir");
    let cancel = CancellationToken::new();

    {
        let engine = Engine::open(hashing_config(&dir)).await.expect("open");
        for name in ["a.txt", "b.txt", "c.txt"] {
            engine
                .ingestor()
                .ingest(Upload::new(name, "text/plain", name.as_bytes().to_vec()), &cancel)
                .await
                .expect("ingest");
        }
        engine.close().await;
    }

    std::fs::remove_file(hashing_config(&dir).snapshot_path()).expect("remove snapshot");

    let engine = Engine::open(hashing_config(&dir)).await.expect("reopen");
    let status = engine.status().await.expect("status");
    assert_eq!(status.vectors, 3);
    assert!(status.consistency.is_consistent);
    assert!(hashing_config(&dir).snapshot_path().exists());
}
