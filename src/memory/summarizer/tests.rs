use super::*;

#[test]
fn short_text_is_returned_whole() {
    let summarizer = TruncatingSummarizer::new(20);
    assert_eq!(summarizer.summarize("  brief note  "), "brief note");
}

#[test]
fn long_text_is_cut_and_marked() {
    let summarizer = TruncatingSummarizer::new(5);
    assert_eq!(summarizer.summarize("abcdefghij"), "abcde...");
}

#[test]
fn text_of_exact_budget_is_not_marked() {
    let summarizer = TruncatingSummarizer::new(5);
    assert_eq!(summarizer.summarize("abcde"), "abcde");
}

#[test]
fn truncation_respects_char_boundaries() {
    let summarizer = TruncatingSummarizer::new(3);
    assert_eq!(summarizer.summarize("ééééé"), "ééé...");
}

#[test]
fn default_budget_matches_config_default() {
    assert_eq!(TruncatingSummarizer::default().max_chars(), 200);
}
