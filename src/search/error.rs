//! Fatal pipeline errors.

use std::path::PathBuf;
use thiserror::Error;

use super::events::PipelineFailure;
use crate::ocr::{ExtractionError, RasterError};

/// Errors that end a search run.
///
/// Per-page OCR failures are not here: they are logged, reported as
/// `ocr_error` progress events, and the run continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No document found after trying {} location(s)", attempts.len())]
    FileNotFound { attempts: Vec<PathBuf> },

    #[error("Document could not be read as a PDF: {0}")]
    UnreadableDocument(#[source] ExtractionError),

    #[error("Page rasterization failed: {0}")]
    RasterizationFailed(#[source] RasterError),

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Search cancelled: event receiver disconnected")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Short human-readable reason for the error event.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "File not found",
            Self::UnreadableDocument(_) => "Unreadable document",
            Self::RasterizationFailed(_) => "Rasterization failed",
            Self::InvalidQuery(_) => "Invalid query",
            Self::Cancelled => "Cancelled",
            Self::Io(_) => "IO error",
        }
    }

    pub fn to_failure(&self) -> PipelineFailure {
        let attempts = match self {
            Self::FileNotFound { attempts } => attempts
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            _ => Vec::new(),
        };
        PipelineFailure {
            reason: self.reason().to_string(),
            detail: self.to_string(),
            attempts,
        }
    }
}
