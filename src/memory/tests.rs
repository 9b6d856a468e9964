use super::*;
use crate::embeddings::HashingEmbedder;

fn builder(chunk_size: usize) -> MemoryTreeBuilder {
    MemoryTreeBuilder::new(Arc::new(HashingEmbedder::new(16)), &MemoryConfig::default())
        .with_chunk_size(chunk_size)
}

fn words(n: usize) -> String {
    (0..n).map(|i| format!("word{i}")).join(" ")
}

fn assert_shape(node: &MemoryNode, max_children: usize) {
    if !node.is_leaf() {
        assert!((1..=max_children).contains(&node.children.len()));
        assert!(node.content.is_empty());
        node.children.iter().for_each(|c| assert_shape(c, max_children));
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Err(anyhow::anyhow!("model offline"))
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0; 3])
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "short"
    }
}

#[test]
fn chunk_words_splits_on_word_count() {
    let chunks = chunk_words("a b  c\nd e", 2);
    assert_eq!(chunks, vec!["a b", "c d", "e"]);
    assert!(chunk_words("   ", 5).is_empty());
}

#[test]
fn single_chunk_is_a_leaf_root() {
    let tree = builder(10).build("just a few words").expect("build");

    assert!(tree.is_leaf());
    assert_eq!(tree.height(), 0);
    assert_eq!(tree.content, "just a few words");
    assert_eq!(tree.summary, "just a few words");
    assert_eq!(tree.embedding.len(), 16);
}

#[test]
fn empty_text_yields_empty_leaf() {
    let tree = builder(10).build("").expect("build");

    assert!(tree.is_leaf());
    assert!(tree.content.is_empty());
    assert_eq!(tree.embedding, vec![0.0; 16]);
}

#[test]
fn height_is_ceil_log_of_leaf_count() {
    let cases = [(2, 1), (4, 1), (5, 2), (16, 2), (17, 3), (64, 3), (65, 4)];
    for (leaves, expected_height) in cases {
        let tree = builder(1).build(&words(leaves)).expect("build");

        assert_eq!(tree.leaf_count(), leaves, "leaves for n={leaves}");
        assert_eq!(tree.height(), expected_height, "height for n={leaves}");
        assert_shape(&tree, 4);
    }
}

#[test]
fn leaves_keep_document_order_with_contiguous_clustering() {
    let tree = builder(2).build(&words(10)).expect("build");

    fn collect<'a>(node: &'a MemoryNode, out: &mut Vec<&'a str>) {
        if node.is_leaf() {
            out.push(&node.content);
        }
        node.children.iter().for_each(|c| collect(c, out));
    }

    let mut leaves = Vec::new();
    collect(&tree, &mut leaves);
    assert_eq!(
        leaves,
        vec!["word0 word1", "word2 word3", "word4 word5", "word6 word7", "word8 word9"]
    );
}

#[test]
fn parent_embedding_is_mean_of_children() {
    let tree = builder(1).build("alpha beta").expect("build");
    let left = &tree.children[0].embedding;
    let right = &tree.children[1].embedding;

    for (i, value) in tree.embedding.iter().enumerate() {
        assert!((value - (left[i] + right[i]) / 2.0).abs() < 1e-6);
    }
}

#[test]
fn parent_summary_comes_from_child_contents() {
    let tree = builder(1)
        .with_summarizer(Arc::new(TruncatingSummarizer::new(11)))
        .build("alpha beta gamma")
        .expect("build");

    assert_eq!(tree.summary, "alpha beta...");
    assert_eq!(tree.children[2].summary, "gamma");
}

#[test]
fn node_count_matches_structure() {
    let tree = builder(1).build(&words(5)).expect("build");
    // 5 leaves, 2 level-one parents, 1 root
    assert_eq!(tree.node_count(), 8);
}

#[test]
fn kmeans_clustering_keeps_tree_contract() {
    let tree = builder(1)
        .with_clustering(Arc::new(BalancedKMeansClustering::default()))
        .build(&words(23))
        .expect("build");

    assert_eq!(tree.leaf_count(), 23);
    assert_eq!(tree.height(), 3);
    assert_shape(&tree, 4);
}

#[test]
fn custom_max_children_changes_fan_out() {
    let tree = builder(1).with_max_children(2).build(&words(8)).expect("build");
    assert_eq!(tree.height(), 3);
    assert_shape(&tree, 2);
}

#[test]
fn embedder_failure_is_reported() {
    let builder = MemoryTreeBuilder::new(Arc::new(FailingEmbedder), &MemoryConfig::default());
    assert!(matches!(builder.build("some text"), Err(NexusError::Embedding(_))));
}

#[test]
fn wrong_dimension_is_reported() {
    let builder = MemoryTreeBuilder::new(Arc::new(ShortEmbedder), &MemoryConfig::default());
    assert!(matches!(
        builder.build("some text"),
        Err(NexusError::DimensionMismatch {
            expected: 4,
            actual: 3
        })
    ));
}

#[test]
fn invalid_grouping_is_detected() {
    assert!(is_valid_grouping(&[vec![0, 1], vec![2]], 3, 2));
    assert!(!is_valid_grouping(&[vec![0], vec![1], vec![2]], 3, 4));
    assert!(!is_valid_grouping(&[vec![0, 1, 1]], 3, 4));
    assert!(!is_valid_grouping(&[vec![0, 1, 2]], 3, 2));
    assert!(!is_valid_grouping(&[vec![0, 1]], 3, 4));
}

#[test]
fn tree_serializes_to_json() {
    let tree = builder(1).build("alpha beta").expect("build");
    let json = serde_json::to_value(&tree).expect("serializes");

    assert_eq!(json["children"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["children"][0]["content"], "alpha");
}
