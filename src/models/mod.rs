//! Data models for docseek.

mod document;
mod search;

pub use document::{ExtractedDocument, LineBox, PageText, RasterSize, TextBox, WordBox};
pub use search::{CoordinateMethod, Coordinates, MatchOccurrence};
