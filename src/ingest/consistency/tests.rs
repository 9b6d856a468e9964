use super::*;
use crate::database::models::{Metadata, NewDocument};
use crate::index::VectorIndex;
use tempfile::TempDir;

#[test]
fn consistent_report() {
    let report = ConsistencyReport::from_parts(3, &[2, 0, 1]);

    assert!(report.is_consistent);
    assert_eq!(report.total_issues(), 0);
    assert_eq!(report.stored_documents, 3);
    assert!(report.summary().contains("Stores are consistent"));
}

#[test]
fn orphans_and_dangling_rows_are_reported() {
    let report = ConsistencyReport::from_parts(4, &[0, 9, 2, 7]);

    assert!(!report.is_consistent);
    assert_eq!(report.orphaned_vectors, vec![1, 3]);
    assert_eq!(report.dangling_documents, vec![7, 9]);
    assert_eq!(report.total_issues(), 4);

    let summary = report.summary();
    assert!(summary.contains("2 orphaned vectors"));
    assert!(summary.contains("2 documents without a vector"));
}

#[test]
fn empty_stores_are_consistent() {
    let report = ConsistencyReport::from_parts(0, &[]);
    assert!(report.is_consistent);
}

#[tokio::test]
async fn validator_reads_both_stores() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;

    let mut index = VectorIndex::new(2, 0.3);
    index.insert(&[1.0, 0.0])?;
    index.insert(&[0.0, 1.0])?;
    let index = index.into_shared();

    database
        .insert_document(&NewDocument {
            title: "only.txt".to_string(),
            content: "only one row".to_string(),
            vector_id: 1,
            content_type: "text/plain".to_string(),
            encoding: "utf-8".to_string(),
            text_length: 12,
            metadata: Metadata::new(),
        })
        .await?;

    let report = ConsistencyValidator::new(&database, &index).validate().await?;
    assert_eq!(report.indexed_vectors, 2);
    assert_eq!(report.orphaned_vectors, vec![0]);
    assert!(report.dangling_documents.is_empty());
    Ok(())
}
