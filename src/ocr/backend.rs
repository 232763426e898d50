//! OCR engine abstraction.
//!
//! The pipeline only needs "image in, page text plus optional geometry out",
//! so engines are hidden behind [`OcrBackend`] and can be swapped or faked.

use std::time::Instant;
use thiserror::Error;

use super::rasterizer::RasterPage;
use crate::models::PageText;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Malformed engine output: {0}")]
    MalformedOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Latin base letters, Romanian diacritics (comma and legacy cedilla forms),
/// digits and common punctuation.
pub const DEFAULT_CHAR_WHITELIST: &str = concat!(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "abcdefghijklmnopqrstuvwxyz",
    "ĂÂÎȘȚăâîșțŞŢşţ",
    "0123456789",
    " .,;:!?-_()[]/\"'%&@#+=*"
);

/// Engine settings shared by OCR backends.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// Tesseract-style language set, e.g. "ron+eng".
    pub languages: String,
    /// Characters the engine may emit. Empty disables the whitelist.
    pub char_whitelist: String,
    /// Page segmentation mode (3 = fully automatic).
    pub page_seg_mode: u8,
    /// Engine mode (2 = legacy and LSTM combined).
    pub engine_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "ron+eng".to_string(),
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            page_seg_mode: 3,
            engine_mode: 2,
        }
    }
}

/// Trait for OCR backends.
pub trait OcrBackend: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Check if this backend is available (binaries installed, models present).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Recognize one rendered page.
    ///
    /// `progress` receives the engine's own completion fraction in [0, 1]
    /// for this page, as often as the engine reports it.
    fn recognize(
        &self,
        page: &RasterPage,
        progress: &mut dyn FnMut(f32),
    ) -> Result<PageText, OcrError>;

    /// Recognize a page and log how long it took.
    fn recognize_timed(
        &self,
        page: &RasterPage,
        progress: &mut dyn FnMut(f32),
    ) -> Result<PageText, OcrError> {
        let start = Instant::now();
        let result = self.recognize(page, progress);
        tracing::debug!(
            "{} recognized page {} in {}ms",
            self.name(),
            page.page_number,
            start.elapsed().as_millis()
        );
        result
    }
}
