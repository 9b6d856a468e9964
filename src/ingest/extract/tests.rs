use super::*;

#[test]
fn utf8_text_is_decoded() {
    let extracted = PlainTextExtractor
        .extract("naïve café".as_bytes(), "text/plain", "notes.txt")
        .expect("extract");

    assert_eq!(extracted.text, "naïve café");
    assert_eq!(extracted.encoding, "utf-8");
}

#[test]
fn byte_order_mark_is_stripped() {
    let extracted = PlainTextExtractor
        .extract(b"\xEF\xBB\xBFhello", "text/plain", "bom.txt")
        .expect("extract");
    assert_eq!(extracted.text, "hello");
    assert_eq!(extracted.encoding, "utf-8");
}

#[test]
fn utf16_byte_order_mark_selects_utf16() {
    let extracted = PlainTextExtractor
        .extract(b"\xFF\xFEh\x00i\x00", "text/plain", "wide.txt")
        .expect("extract");
    assert_eq!(extracted.text, "hi");
    assert_eq!(extracted.encoding, "utf-16le");
}

#[test]
fn invalid_utf8_falls_back_to_windows_1252() {
    let extracted = PlainTextExtractor
        .extract(b"caf\xe9", "text/plain", "latin.txt")
        .expect("extract");

    assert_eq!(extracted.text, "café");
    assert_eq!(extracted.encoding, "windows-1252");
}

#[test]
fn windows_1252_punctuation_is_decoded() {
    let extracted = PlainTextExtractor
        .extract(b"\x93hello\x94 \x80", "text/plain", "quotes.txt")
        .expect("extract");

    assert_eq!(extracted.text, "\u{201C}hello\u{201D} \u{20AC}");
    assert_eq!(extracted.encoding, "windows-1252");
}

#[test]
fn binary_document_types_are_rejected() {
    for content_type in ["application/pdf", "APPLICATION/MSWORD"] {
        let result = PlainTextExtractor.extract(b"%PDF-1.7", content_type, "paper.pdf");
        assert!(matches!(result, Err(NexusError::Extraction(_))));
    }
}

#[test]
fn empty_upload_is_empty_text() {
    let extracted = PlainTextExtractor
        .extract(b"", "text/plain", "empty.txt")
        .expect("extract");
    assert!(extracted.text.is_empty());
}

#[test]
fn content_type_guessing() {
    assert_eq!(guess_content_type(Path::new("a/README.MD")), "text/markdown");
    assert_eq!(guess_content_type(Path::new("paper.pdf")), "application/pdf");
    assert_eq!(guess_content_type(Path::new("data.csv")), "text/csv");
    assert_eq!(guess_content_type(Path::new("no_extension")), "text/plain");
}
