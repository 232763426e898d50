//! Locating the stored document for a request.

use std::path::{Path, PathBuf};

use super::error::PipelineError;

/// Candidate locations for a document, in the order they are tried:
/// `base/file_name`, `base/file_path/file_name`, `base/file_path`.
pub fn candidate_paths(base: &Path, file_name: &str, file_path: &str) -> Vec<PathBuf> {
    let file_path = file_path.trim_start_matches('/');
    let mut candidates = vec![
        base.join(file_name),
        base.join(file_path).join(file_name),
        base.join(file_path),
    ];
    // An empty sub-path makes the first two candidates identical.
    candidates.dedup();
    candidates
}

/// First candidate that exists as a regular file.
pub fn resolve_document(
    base: &Path,
    file_name: &str,
    file_path: &str,
) -> Result<PathBuf, PipelineError> {
    let attempts = candidate_paths(base, file_name, file_path);
    for candidate in &attempts {
        if candidate.is_file() {
            tracing::debug!("Resolved document to {}", candidate.display());
            return Ok(candidate.clone());
        }
    }
    tracing::warn!(
        "Document '{}' not found under {} (sub-path '{}')",
        file_name,
        base.display(),
        file_path
    );
    Err(PipelineError::FileNotFound { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prefers_base_file_name() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir_all(base.path().join("2024/tenders")).unwrap();
        std::fs::write(base.path().join("caiet.pdf"), b"%PDF").unwrap();
        std::fs::write(base.path().join("2024/tenders/caiet.pdf"), b"%PDF").unwrap();

        let found = resolve_document(base.path(), "caiet.pdf", "2024/tenders").unwrap();
        assert_eq!(found, base.path().join("caiet.pdf"));
    }

    #[test]
    fn test_falls_back_to_sub_path_then_full_path() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir_all(base.path().join("2024")).unwrap();
        std::fs::write(base.path().join("2024/caiet.pdf"), b"%PDF").unwrap();

        let found = resolve_document(base.path(), "caiet.pdf", "2024").unwrap();
        assert_eq!(found, base.path().join("2024/caiet.pdf"));

        let found = resolve_document(base.path(), "renamed.pdf", "2024/caiet.pdf").unwrap();
        assert_eq!(found, base.path().join("2024/caiet.pdf"));
    }

    #[test]
    fn test_missing_reports_every_attempt() {
        let base = TempDir::new().unwrap();
        let err = resolve_document(base.path(), "lipsa.pdf", "arhiva").unwrap_err();
        match err {
            PipelineError::FileNotFound { attempts } => {
                assert_eq!(
                    attempts,
                    vec![
                        base.path().join("lipsa.pdf"),
                        base.path().join("arhiva/lipsa.pdf"),
                        base.path().join("arhiva"),
                    ]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_sub_path_never_resolves_to_base_dir() {
        let base = TempDir::new().unwrap();
        let err = resolve_document(base.path(), "lipsa.pdf", "").unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound { .. }));
        assert_eq!(candidate_paths(base.path(), "lipsa.pdf", "").len(), 2);
    }
}
