//! Text extraction, rasterization and OCR collaborators.
//!
//! Extracts text from documents using:
//! - pdftotext / pdfinfo (Poppler) for the PDF text layer and page count
//! - pdftoppm (Poppler) to render pages for OCR and thumbnails
//! - Tesseract OCR for scanned pages, with word and line geometry
//!
//! Each tool sits behind a trait so the search pipeline can be driven with
//! other implementations.

mod backend;
mod extractor;
mod rasterizer;
mod tesseract;
mod tools;

pub use backend::{OcrBackend, OcrConfig, OcrError, DEFAULT_CHAR_WHITELIST};
pub use extractor::{DocumentTextSource, ExtractionError, TextExtractor};
pub use rasterizer::{
    render_thumbnail, ConvertProgress, PageRasterizer, PageRenderer, PdftoppmRenderer,
    RasterError, RasterPage, RasterWorkspace,
};
pub use tesseract::{parse_tsv, TesseractBackend};
pub use tools::check_binary;
