//! Document models produced by text extraction and OCR.
//!
//! All of these are created fresh for a single search invocation and
//! dropped when it ends.

use serde::{Deserialize, Serialize};

/// Text pulled out of a PDF, optionally split per page.
///
/// The extractor leaves `per_page` empty. On the OCR branch a new document
/// carrying the recognized pages is built with [`ExtractedDocument::with_pages`];
/// the text-native branch keeps the whole document in `full_text` only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub page_count: u32,
    pub full_text: String,
    pub per_page: Vec<PageText>,
}

impl ExtractedDocument {
    pub fn new(page_count: u32, full_text: impl Into<String>) -> Self {
        Self {
            page_count,
            full_text: full_text.into(),
            per_page: Vec::new(),
        }
    }

    /// The same document with its recognized pages attached, in page order.
    pub fn with_pages(self, mut pages: Vec<PageText>) -> Self {
        pages.sort_by_key(|p| p.page_number);
        Self {
            per_page: pages,
            ..self
        }
    }
}

/// Recognized content of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    /// Page number (1-indexed).
    pub page_number: u32,
    pub text: String,
    pub words: Vec<TextBox>,
    pub lines: Vec<TextBox>,
}

impl PageText {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            words: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<TextBox>) -> Self {
        self.words = words;
        self
    }

    pub fn with_lines(mut self, lines: Vec<TextBox>) -> Self {
        self.lines = lines;
        self
    }

    /// Whether any geometry came back from the engine for this page.
    pub fn has_geometry(&self) -> bool {
        !self.words.is_empty() || !self.lines.is_empty()
    }
}

/// A recognized word or line with its bounding box in raster pixel space.
///
/// Always satisfies `x1 >= x0` and `y1 >= y0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub text: String,
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    /// Engine confidence, 0-100.
    pub confidence: f32,
}

pub type WordBox = TextBox;
pub type LineBox = TextBox;

impl TextBox {
    /// Build a box from two corners in any order.
    pub fn new(text: impl Into<String>, corners: (u32, u32, u32, u32), confidence: f32) -> Self {
        let (xa, ya, xb, yb) = corners;
        Self {
            text: text.into(),
            x0: xa.min(xb),
            y0: ya.min(yb),
            x1: xa.max(xb),
            y1: ya.max(yb),
            confidence: confidence.clamp(0.0, 100.0),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// A box with no area cannot anchor a highlight.
    pub fn is_valid(&self) -> bool {
        self.x1 > self.x0 && self.y1 > self.y0
    }
}

/// Pixel dimensions of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterSize {
    pub width: u32,
    pub height: u32,
}

impl RasterSize {
    /// Resolution used for OCR passes.
    pub const OCR: RasterSize = RasterSize {
        width: 600,
        height: 800,
    };

    /// Resolution used for page thumbnails.
    pub const THUMBNAIL: RasterSize = RasterSize {
        width: 400,
        height: 500,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}
