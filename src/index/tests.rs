use super::*;
use tempfile::TempDir;

fn index() -> VectorIndex {
    VectorIndex::new(3, 0.3)
}

#[test]
fn insert_assigns_sequential_positions() {
    let mut index = index();
    assert!(index.is_empty());

    assert_eq!(index.insert(&[1.0, 0.0, 0.0]).expect("insert"), 0);
    assert_eq!(index.insert(&[0.0, 2.0, 0.0]).expect("insert"), 1);
    assert_eq!(index.insert(&[0.0, 0.0, 5.0]).expect("insert"), 2);
    assert_eq!(index.size(), 3);
}

#[test]
fn insert_normalises_stored_vectors() {
    let mut index = index();
    let position = index.insert(&[3.0, 4.0, 0.0]).expect("insert");
    let stored = index.vector(position).expect("stored");

    assert!((stored[0] - 0.6).abs() < 1e-6);
    assert!((stored[1] - 0.8).abs() < 1e-6);
    assert!(index.vector(position + 1).is_none());
}

#[test]
fn insert_rejects_wrong_dimension() {
    let mut index = index();
    let result = index.insert(&[1.0, 0.0]);

    assert!(matches!(
        result,
        Err(NexusError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
    assert_eq!(index.size(), 0);
}

#[test]
fn zero_vector_is_stored_but_never_matches() {
    let mut index = index();
    index.insert(&[0.0, 0.0, 0.0]).expect("insert");
    index.insert(&[1.0, 0.0, 0.0]).expect("insert");

    let hits = index.search(&[1.0, 0.0, 0.0], 10).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].position, 1);
}

#[test]
fn search_orders_by_score_and_applies_threshold() {
    let mut index = index();
    index.insert(&[0.0, 1.0, 0.0]).expect("insert"); // orthogonal
    index.insert(&[1.0, 1.0, 0.0]).expect("insert"); // ~0.707
    index.insert(&[1.0, 0.0, 0.0]).expect("insert"); // exact

    let hits = index.search(&[2.0, 0.0, 0.0], 10).expect("search");
    let positions: Vec<u64> = hits.iter().map(|h| h.position).collect();

    assert_eq!(positions, vec![2, 1]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!(hits.iter().all(|h| h.score > 0.3));
}

#[test]
fn search_never_returns_more_than_k() {
    let mut index = index();
    for _ in 0..5 {
        index.insert(&[1.0, 0.0, 0.0]).expect("insert");
    }

    let hits = index.search(&[1.0, 0.0, 0.0], 2).expect("search");
    assert_eq!(hits.len(), 2);
    // equal scores keep insertion order
    assert_eq!(hits[0].position, 0);
    assert_eq!(hits[1].position, 1);

    assert!(index.search(&[1.0, 0.0, 0.0], 0).expect("search").is_empty());
}

#[test]
fn search_on_empty_index_returns_nothing() {
    let hits = index().search(&[1.0, 0.0, 0.0], 5).expect("search");
    assert!(hits.is_empty());
}

#[test]
fn score_equal_to_threshold_is_excluded() {
    let mut index = VectorIndex::new(2, 0.0);
    index.insert(&[0.0, 1.0]).expect("insert");

    assert!(index.search(&[1.0, 0.0], 1).expect("search").is_empty());
}

#[test]
fn search_rejects_wrong_dimension() {
    let result = index().search(&[1.0], 1);
    assert!(matches!(result, Err(NexusError::DimensionMismatch { .. })));
}

#[test]
fn persist_requires_snapshot_path() {
    assert!(matches!(index().persist(), Err(NexusError::Snapshot(_))));
}

#[test]
fn persist_and_load_restore_identical_results() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("vectors.arrow");

    let mut original = index().with_snapshot_path(&path);
    original.insert(&[1.0, 0.0, 0.0]).expect("insert");
    original.insert(&[1.0, 1.0, 0.0]).expect("insert");
    original.insert(&[0.0, 0.0, 1.0]).expect("insert");
    original.persist().expect("persist");

    let restored = VectorIndex::load(&path, 3, 0.3);
    assert_eq!(restored.size(), 3);

    let query = [0.9, 0.4, 0.1];
    assert_eq!(
        original.search(&query, 3).expect("search"),
        restored.search(&query, 3).expect("search")
    );
}

#[test]
fn each_persist_rewrites_the_whole_snapshot() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("vectors.arrow");

    let mut index = index().with_snapshot_path(&path);
    index.insert(&[1.0, 0.0, 0.0]).expect("insert");
    index.persist().expect("persist");
    let first_len = std::fs::metadata(&path).expect("snapshot").len();

    for _ in 0..16 {
        index.insert(&[0.0, 1.0, 0.0]).expect("insert");
        index.persist().expect("persist");
    }

    let restored = VectorIndex::load(&path, 3, 0.3);
    assert_eq!(restored.size(), 17);
    assert_eq!(restored.vector(0), index.vector(0));
    assert!(std::fs::metadata(&path).expect("snapshot").len() > first_len);
}

#[test]
fn missing_snapshot_loads_empty() {
    let dir = TempDir::new().expect("temp dir");
    let index = VectorIndex::load(dir.path().join("absent.arrow"), 3, 0.3);
    assert!(index.is_empty());
}

#[test]
fn corrupt_snapshot_loads_empty_and_is_kept_aside() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("vectors.arrow");
    std::fs::write(&path, b"corrupt bytes").expect("write");

    let index = VectorIndex::load(&path, 3, 0.3);
    assert!(index.is_empty());
    assert!(dir.path().join("vectors.arrow.corrupted_backup").exists());
    assert_eq!(index.snapshot_path(), Some(path.as_path()));
}

#[tokio::test]
async fn shared_index_allows_concurrent_readers() {
    let mut index = index();
    index.insert(&[1.0, 0.0, 0.0]).expect("insert");
    let shared = index.into_shared();

    let a = shared.read().await;
    let b = shared.read().await;
    assert_eq!(a.size(), b.size());
}

#[test]
fn reserve_through_pads_with_unmatchable_vectors() {
    let mut index = index();
    index.insert(&[1.0, 0.0, 0.0]).expect("insert");

    assert_eq!(index.reserve_through(3), 3);
    assert_eq!(index.size(), 4);
    assert_eq!(index.vector(3), Some(&[0.0, 0.0, 0.0][..]));
    assert_eq!(index.reserve_through(2), 0);
    assert_eq!(index.insert(&[0.0, 1.0, 0.0]).expect("insert"), 4);

    let hits = index.search(&[0.0, 1.0, 0.0], 10).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].position, 4);
}
