//! Scan detection from text-layer density.

use serde::Serialize;

/// Documents with fewer meaningful words than this are treated as scanned.
pub const MIN_MEANINGFUL_WORDS: usize = 10;

/// Outcome of classifying a document's text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanClassification {
    pub meaningful_words: usize,
    pub needs_ocr: bool,
}

/// Count whitespace-separated tokens longer than two characters.
pub fn meaningful_word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .count()
}

/// Decide whether a document needs OCR. Pure function of the text.
pub fn classify(text: &str, min_meaningful_words: usize) -> ScanClassification {
    let meaningful_words = meaningful_word_count(text);
    ScanClassification {
        meaningful_words,
        needs_ocr: meaningful_words < min_meaningful_words,
    }
}
