#[cfg(test)]
mod tests;

use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::{NexusError, Result};

/// Declared types whose text needs a format-specific decoder
const BINARY_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub encoding: String,
}

/// Turns uploaded bytes into plain text
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], content_type: &str, filename: &str) -> Result<ExtractedText>;
}

/// Decodes text uploads: the BOM's encoding when one is present, UTF-8 when
/// valid, Windows-1252 otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    #[inline]
    fn extract(&self, bytes: &[u8], content_type: &str, filename: &str) -> Result<ExtractedText> {
        let declared = content_type.trim().to_ascii_lowercase();
        if BINARY_DOCUMENT_TYPES.contains(&declared.as_str()) {
            return Err(NexusError::Extraction(format!(
                "{filename}: no text decoder for content type {content_type}"
            )));
        }

        let (encoding, text) = decode(bytes);
        debug!("Decoded {} as {}", filename, encoding.name());

        Ok(ExtractedText {
            text,
            encoding: encoding.name().to_ascii_lowercase(),
        })
    }
}

fn decode(bytes: &[u8]) -> (&'static Encoding, String) {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let body = bytes.get(bom_length..).unwrap_or_default();
        let (text, had_errors) = encoding.decode_without_bom_handling(body);
        if had_errors {
            warn!("Replaced malformed {} sequences", encoding.name());
        }
        return (encoding, text.into_owned());
    }

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return (UTF_8, text.into_owned());
    }

    // every byte maps to a character in windows-1252, so this never replaces
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (WINDOWS_1252, text.into_owned())
}

/// Content type implied by a file extension, defaulting to `text/plain`
#[inline]
pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "text/plain",
    }
}
