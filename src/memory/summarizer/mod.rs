#[cfg(test)]
mod tests;

/// Derives the short `summary` text of a memory node
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> String;
}

/// Keeps the first `max_chars` characters, marking cut text with `...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncatingSummarizer {
    max_chars: usize,
}

impl TruncatingSummarizer {
    pub const ELLIPSIS: &'static str = "...";

    #[inline]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    #[inline]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }
}

impl Default for TruncatingSummarizer {
    #[inline]
    fn default() -> Self {
        Self::new(200)
    }
}

impl Summarizer for TruncatingSummarizer {
    #[inline]
    fn summarize(&self, text: &str) -> String {
        let text = text.trim();
        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => {
                let mut summary = text.get(..cut).unwrap_or(text).trim_end().to_string();
                summary.push_str(Self::ELLIPSIS);
                summary
            }
            None => text.to_string(),
        }
    }
}
