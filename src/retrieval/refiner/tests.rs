use super::*;

#[tokio::test]
async fn identity_returns_query_with_full_confidence() {
    let refinement = IdentityRefiner
        .refine("how do lifetimes work", None)
        .await
        .expect("identity never fails");

    assert_eq!(refinement.query, "how do lifetimes work");
    assert!((refinement.confidence - 1.0).abs() < f32::EPSILON);
    assert!(refinement.is_accepted(0.8));
}

#[tokio::test]
async fn default_sub_queries_is_the_query_itself() {
    let queries = IdentityRefiner
        .sub_queries("a and b")
        .await
        .expect("sub queries");
    assert_eq!(queries, vec!["a and b".to_string()]);
}

#[test]
fn confidence_is_clamped() {
    assert!((Refinement::new("q", 1.7).confidence - 1.0).abs() < f32::EPSILON);
    assert!(Refinement::new("q", -0.2).confidence.abs() < f32::EPSILON);
    assert!(Refinement::new("q", f32::NAN).confidence.abs() < f32::EPSILON);
}

#[test]
fn acceptance_is_strictly_greater() {
    let refinement = Refinement::new("q", 0.8);
    assert!(!refinement.is_accepted(0.8));
    assert!(refinement.is_accepted(0.79));
}

#[test]
fn identity_name() {
    assert_eq!(IdentityRefiner.name(), "identity");
}
