//! Shared helpers for the external command-line tools.
//!
//! Every collaborator here shells out to Poppler or Tesseract binaries, so
//! they share the same "not found vs. failed" distinction when a command
//! does not succeed.

use std::io;
use std::process::{ExitStatus, Output};

pub const PDFTOTEXT_HINT: &str = "pdftotext (install poppler-utils)";
pub const PDFINFO_HINT: &str = "pdfinfo (install poppler-utils)";
pub const PDFTOPPM_HINT: &str = "pdftoppm (install poppler-utils)";
pub const TESSERACT_HINT: &str = "tesseract (install tesseract-ocr)";

/// Tools the pipeline shells out to.
pub const REQUIRED_TOOLS: [&str; 4] = ["pdftotext", "pdfinfo", "pdftoppm", "tesseract"];

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// How a finished command ended, with stdout captured on success.
#[derive(Debug)]
pub enum CommandOutcome {
    Success(String),
    Failed(String),
    NotFound,
}

/// Classify a captured command result.
///
/// Stdout is decoded lossily; stderr is returned as the failure message.
pub fn classify_output(result: io::Result<Output>) -> io::Result<CommandOutcome> {
    match result {
        Ok(output) if output.status.success() => Ok(CommandOutcome::Success(
            String::from_utf8_lossy(&output.stdout).to_string(),
        )),
        Ok(output) => Ok(CommandOutcome::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CommandOutcome::NotFound),
        Err(e) => Err(e),
    }
}

/// Classify a command run for its exit status only.
pub fn classify_status(result: io::Result<ExitStatus>) -> io::Result<CommandOutcome> {
    match result {
        Ok(status) if status.success() => Ok(CommandOutcome::Success(String::new())),
        Ok(status) => Ok(CommandOutcome::Failed(format!("exited with {}", status))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CommandOutcome::NotFound),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_not_found() {
        assert!(!check_binary("docseek-definitely-not-a-real-binary"));
    }

    #[test]
    fn test_spawn_not_found_is_classified() {
        let result = std::process::Command::new("docseek-definitely-not-a-real-binary").output();
        let outcome = classify_output(result).unwrap();
        assert!(matches!(outcome, CommandOutcome::NotFound));
    }

    #[test]
    fn test_other_io_errors_propagate() {
        let result: io::Result<Output> = Err(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(classify_output(result).is_err());
    }
}
