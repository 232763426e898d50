//! Text extraction from PDFs using pdftotext and pdfinfo.

use std::path::Path;
use std::process::Command;
use thiserror::Error;

use super::tools::{
    check_binary, classify_output, CommandOutcome, PDFINFO_HINT, PDFTOTEXT_HINT, REQUIRED_TOOLS,
};
use crate::models::ExtractedDocument;

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of raw document text and page count.
pub trait DocumentTextSource: Send + Sync {
    /// Pull the text layer out of a PDF without rasterizing it.
    ///
    /// The returned document has `per_page` empty.
    fn extract(&self, pdf_path: &Path) -> Result<ExtractedDocument, ExtractionError>;
}

/// Text extractor backed by Poppler's command-line tools.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor;

impl TextExtractor {
    /// Create a new text extractor.
    pub fn new() -> Self {
        Self
    }

    /// Run pdftotext on a whole PDF file.
    ///
    /// Page breaks come back as form feeds; they are turned into newlines so
    /// that matching and context windows treat them as ordinary whitespace.
    pub fn run_pdftotext(&self, file_path: &Path) -> Result<String, ExtractionError> {
        let output = Command::new("pdftotext")
            .args(["-enc", "UTF-8"])
            .arg(file_path)
            .arg("-") // Output to stdout
            .output();

        match classify_output(output)? {
            CommandOutcome::Success(text) => Ok(text.replace('\u{c}', "\n")),
            CommandOutcome::Failed(stderr) => Err(ExtractionError::ExtractionFailed(format!(
                "pdftotext failed: {}",
                stderr
            ))),
            CommandOutcome::NotFound => Err(ExtractionError::ToolNotFound(PDFTOTEXT_HINT.into())),
        }
    }

    /// Get the page count of a PDF via pdfinfo.
    pub fn get_pdf_page_count(&self, file_path: &Path) -> Result<u32, ExtractionError> {
        let output = Command::new("pdfinfo").arg(file_path).output();

        match classify_output(output)? {
            CommandOutcome::Success(stdout) => parse_page_count(&stdout).ok_or_else(|| {
                ExtractionError::ExtractionFailed("pdfinfo reported no page count".to_string())
            }),
            CommandOutcome::Failed(stderr) => Err(ExtractionError::ExtractionFailed(format!(
                "pdfinfo failed: {}",
                stderr
            ))),
            CommandOutcome::NotFound => Err(ExtractionError::ToolNotFound(PDFINFO_HINT.into())),
        }
    }

    /// Check if required tools are available.
    pub fn check_tools() -> Vec<(String, bool)> {
        REQUIRED_TOOLS
            .iter()
            .map(|tool| (tool.to_string(), check_binary(tool)))
            .collect()
    }
}

impl DocumentTextSource for TextExtractor {
    fn extract(&self, pdf_path: &Path) -> Result<ExtractedDocument, ExtractionError> {
        let page_count = self.get_pdf_page_count(pdf_path)?;
        let text = self.run_pdftotext(pdf_path)?;
        tracing::debug!(
            "Extracted {} chars over {} pages from {}",
            text.len(),
            page_count,
            pdf_path.display()
        );
        Ok(ExtractedDocument::new(page_count, text))
    }
}

/// Read the `Pages:` line out of pdfinfo output.
fn parse_page_count(pdfinfo_output: &str) -> Option<u32> {
    pdfinfo_output
        .lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let out = "Title:          Caiet de sarcini\nProducer:       pdfTeX\nPages:          15\nEncrypted:      no\n";
        assert_eq!(parse_page_count(out), Some(15));
    }

    #[test]
    fn test_parse_page_count_missing() {
        assert_eq!(parse_page_count("Title: x\n"), None);
        assert_eq!(parse_page_count("Pages: many\n"), None);
    }

    #[test]
    fn test_check_tools_lists_every_tool() {
        let tools = TextExtractor::check_tools();
        let names: Vec<_> = tools.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, REQUIRED_TOOLS.to_vec());
    }
}
