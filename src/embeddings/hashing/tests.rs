use super::*;
use crate::embeddings::{dot, normalize};

fn unit(embedder: &HashingEmbedder, text: &str) -> Vec<f32> {
    let mut vector = embedder.embed(text).expect("hashing never fails");
    normalize(&mut vector);
    vector
}

#[test]
fn embedding_has_configured_dimension() {
    let embedder = HashingEmbedder::new(64);
    let vector = embedder.embed("hello world").expect("embed");
    assert_eq!(vector.len(), 64);
    assert_eq!(embedder.dimension(), 64);
}

#[test]
fn embedding_is_deterministic_and_case_insensitive() {
    let embedder = HashingEmbedder::new(128);
    let a = embedder.embed("Rust Ownership Rules").expect("embed");
    let b = embedder.embed("rust ownership rules").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let embedder = HashingEmbedder::new(16);
    let vector = embedder.embed("  ... !!").expect("embed");
    assert!(vector.iter().all(|v| *v == 0.0));
}

#[test]
fn shared_vocabulary_scores_higher() {
    let embedder = HashingEmbedder::new(384);
    let query = unit(&embedder, "sqlite vector index");
    let related = unit(&embedder, "the sqlite vector index stores embeddings");
    let unrelated = unit(&embedder, "bananas ripen quickly in warm kitchens");

    assert!(dot(&query, &related) > dot(&query, &unrelated));
    assert!((dot(&related, &related) - 1.0).abs() < 1e-5);
}

#[test]
fn fnv_reference_values() {
    assert_eq!(fnv1a(b""), FNV_OFFSET_BASIS);
    assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
}
