//! Configuration management for docseek using the prefer crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::RasterSize;
use crate::ocr::{OcrConfig, DEFAULT_CHAR_WHITELIST};
use crate::search::PipelineOptions;

/// Environment variable overriding the storage directory.
pub const STORAGE_DIR_ENV: &str = "DOCSEEK_STORAGE_DIR";
/// Environment variable overriding the Tesseract language list.
pub const OCR_LANGUAGES_ENV: &str = "DOCSEEK_OCR_LANGUAGES";

/// Runtime settings for the search pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base directory documents are resolved against.
    pub storage_dir: PathBuf,
    /// Page cap for the streaming search.
    pub ocr_page_cap: u32,
    /// Page cap for the legacy non-streaming search.
    pub legacy_page_cap: u32,
    /// Resolution pages are rendered at for OCR.
    pub ocr_raster: RasterSize,
    /// Resolution of preview thumbnails.
    pub thumbnail_raster: RasterSize,
    pub languages: String,
    pub char_whitelist: String,
    pub page_seg_mode: u8,
    pub engine_mode: u8,
    /// Below this many meaningful words a document is treated as scanned.
    pub min_meaningful_words: usize,
    /// Parent directory for per-search scratch directories.
    pub temp_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./documents"),
            ocr_page_cap: 10,
            legacy_page_cap: 3,
            ocr_raster: RasterSize::OCR,
            thumbnail_raster: RasterSize::THUMBNAIL,
            languages: "ron+eng".to_string(),
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            page_seg_mode: 3,
            engine_mode: 2,
            min_meaningful_words: 10,
            temp_root: None,
        }
    }
}

impl Settings {
    /// Engine options for the Tesseract backend.
    pub fn ocr_config(&self) -> OcrConfig {
        OcrConfig {
            languages: self.languages.clone(),
            char_whitelist: self.char_whitelist.clone(),
            page_seg_mode: self.page_seg_mode,
            engine_mode: self.engine_mode,
        }
    }

    /// Options for the streaming pipeline.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            page_cap: self.ocr_page_cap,
            raster: self.ocr_raster,
            min_meaningful_words: self.min_meaningful_words,
            temp_root: self.temp_root.clone(),
            abort_on_raster_failure: false,
        }
    }

    /// Apply `DOCSEEK_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(STORAGE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.storage_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
        if let Some(languages) = lookup(OCR_LANGUAGES_ENV).filter(|v| !v.trim().is_empty()) {
            self.languages = languages;
        }
        self
    }
}

/// Raster dimensions as written in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterConfig {
    pub width: u32,
    pub height: u32,
}

impl From<RasterConfig> for RasterSize {
    fn from(value: RasterConfig) -> Self {
        RasterSize::new(value.width, value.height)
    }
}

/// OCR section of a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_whitelist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_seg_mode: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_mode: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_cap: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_page_cap: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raster: Option<RasterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<RasterConfig>,
}

/// Configuration file contents. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage directory, `~` and config-relative paths allowed.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "storage")]
    pub storage_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_meaningful_words: Option<usize>,
    #[serde(default)]
    pub ocr: OcrSection,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load the config file, falling back to defaults.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("docseek").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => {
                tracing::debug!("No docseek config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports TOML, YAML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined onto `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Layer this file over the default settings.
    pub fn to_settings(&self) -> Settings {
        let defaults = Settings::default();
        let base = self.base_dir();
        let ocr = &self.ocr;

        Settings {
            storage_dir: self
                .storage_dir
                .as_deref()
                .map(|p| self.resolve_path(p, &base))
                .unwrap_or(defaults.storage_dir),
            ocr_page_cap: ocr.page_cap.unwrap_or(defaults.ocr_page_cap),
            legacy_page_cap: ocr.legacy_page_cap.unwrap_or(defaults.legacy_page_cap),
            ocr_raster: ocr.raster.map(Into::into).unwrap_or(defaults.ocr_raster),
            thumbnail_raster: ocr
                .thumbnail
                .map(Into::into)
                .unwrap_or(defaults.thumbnail_raster),
            languages: ocr.languages.clone().unwrap_or(defaults.languages),
            char_whitelist: ocr.char_whitelist.clone().unwrap_or(defaults.char_whitelist),
            page_seg_mode: ocr.page_seg_mode.unwrap_or(defaults.page_seg_mode),
            engine_mode: ocr.engine_mode.unwrap_or(defaults.engine_mode),
            min_meaningful_words: self
                .min_meaningful_words
                .unwrap_or(defaults.min_meaningful_words),
            temp_root: self
                .temp_root
                .as_deref()
                .map(|p| self.resolve_path(p, &base)),
        }
    }
}

/// Load settings from an explicit config file or by discovery, then apply
/// environment overrides.
pub async fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?,
        None => Config::load().await,
    };
    if let Some(ref path) = config.source_path {
        tracing::info!("Loaded config from {}", path.display());
    }
    Ok(config.to_settings().with_env_overrides())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.ocr_page_cap, 10);
        assert_eq!(settings.legacy_page_cap, 3);
        assert_eq!(settings.ocr_raster, RasterSize::new(600, 800));
        assert_eq!(settings.thumbnail_raster, RasterSize::new(400, 500));
        assert_eq!(settings.ocr_config().languages, "ron+eng");
        assert!(!settings.pipeline_options().abort_on_raster_failure);
    }

    #[tokio::test]
    async fn test_load_toml_relative_to_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docseek.toml");
        std::fs::write(
            &path,
            r#"
storage_dir = "pdfs"
min_meaningful_words = 25

[ocr]
languages = "eng"
page_cap = 4
raster = { width = 1200, height = 1600 }
"#,
        )
        .unwrap();

        let settings = Config::load_from_path(&path).await.unwrap().to_settings();
        assert_eq!(settings.storage_dir, dir.path().join("pdfs"));
        assert_eq!(settings.min_meaningful_words, 25);
        assert_eq!(settings.languages, "eng");
        assert_eq!(settings.ocr_page_cap, 4);
        assert_eq!(settings.ocr_raster, RasterSize::new(1200, 1600));
        assert_eq!(settings.thumbnail_raster, RasterSize::THUMBNAIL);
        assert_eq!(settings.legacy_page_cap, 3);
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("docseek.yaml");
        std::fs::write(&yaml, "storage_dir: /srv/docs\nocr:\n  legacy_page_cap: 2\n").unwrap();
        let settings = Config::load_from_path(&yaml).await.unwrap().to_settings();
        assert_eq!(settings.storage_dir, PathBuf::from("/srv/docs"));
        assert_eq!(settings.legacy_page_cap, 2);

        let json = dir.path().join("docseek.json");
        std::fs::write(&json, r#"{"ocr": {"page_seg_mode": 6}}"#).unwrap();
        let settings = Config::load_from_path(&json).await.unwrap().to_settings();
        assert_eq!(settings.page_seg_mode, 6);
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docseek.toml");
        std::fs::write(&path, "storage_dir = [").unwrap();
        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.contains("TOML"));
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::default().with_overrides_from(|key| match key {
            STORAGE_DIR_ENV => Some("/mnt/arhiva".to_string()),
            OCR_LANGUAGES_ENV => Some("eng".to_string()),
            _ => None,
        });
        assert_eq!(settings.storage_dir, PathBuf::from("/mnt/arhiva"));
        assert_eq!(settings.languages, "eng");

        let untouched = Settings::default().with_overrides_from(|_| Some("  ".to_string()));
        assert_eq!(untouched, Settings::default());
    }
}
