//! docseek - phrase search over stored PDFs with OCR fallback.
//!
//! Finds every occurrence of a query in a stored document. Documents with a
//! usable text layer are searched directly; scanned documents are rendered
//! and recognized with Tesseract, and each match gets a highlight box on the
//! rendered page. Progress and results are produced as a stream of events.

pub mod config;
pub mod models;
pub mod ocr;
pub mod search;
