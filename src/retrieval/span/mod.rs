// Relevant-span extraction
// Picks the sentence unit with the most query terms and returns it with surrounding context


use std::collections::BTreeSet;

use crate::config::RetrievalConfig;

const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Locates the passage of a document most relevant to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanExtractor {
    chunk_size: usize,
    context_size: usize,
}

impl SpanExtractor {
    #[inline]
    pub fn new(chunk_size: usize, context_size: usize) -> Self {
        Self {
            chunk_size,
            context_size,
        }
    }

    #[inline]
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.chunk_size, config.context_size)
    }

    #[inline]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// Best-matching sentence unit plus `context_size` units on each side.
    ///
    /// A unit scores one point per distinct query term it contains
    /// (case-insensitive substring). The earliest unit wins ties. When no unit
    /// contains any term, the first `chunk_size` characters are returned.
    #[inline]
    pub fn extract(&self, content: &str, query: &str) -> String {
        let terms = query_terms(query);
        let units = sentence_units(content);

        let mut best: Option<(usize, usize)> = None;
        for (index, unit) in units.iter().enumerate() {
            let lowered = unit.to_lowercase();
            let score = terms.iter().filter(|term| lowered.contains(term.as_str())).count();
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        let Some((index, _)) = best else {
            return leading_chars(content, self.chunk_size).to_string();
        };

        let start = index.saturating_sub(self.context_size);
        let end = index
            .saturating_add(self.context_size)
            .saturating_add(1)
            .min(units.len());

        units.get(start..end).unwrap_or_default().join(" ")
    }
}

impl Default for SpanExtractor {
    #[inline]
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

/// Split text after each `.`, `!` or `?`, trimming units and dropping empty ones
#[inline]
pub fn sentence_units(text: &str) -> Vec<&str> {
    text.split_inclusive(TERMINATORS)
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
        .collect()
}

/// Distinct lower-cased whitespace-separated terms
#[inline]
pub fn query_terms(query: &str) -> BTreeSet<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Prefix of `text` holding at most `max_chars` characters
#[inline]
pub fn leading_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text.get(..cut).unwrap_or(text),
        None => text,
    }
}
