//! Tesseract OCR backend implementation.
//!
//! Runs the tesseract binary with TSV output so a single pass yields both
//! the page text and word/line geometry.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use super::backend::{OcrBackend, OcrConfig, OcrError};
use super::rasterizer::RasterPage;
use super::tools::{check_binary, classify_output, CommandOutcome, TESSERACT_HINT};
use crate::models::{PageText, TextBox};

/// Tesseract OCR backend.
pub struct TesseractBackend {
    config: OcrConfig,
}

impl TesseractBackend {
    /// Create a new Tesseract backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: OcrConfig::default(),
        }
    }

    /// Create a new Tesseract backend with custom configuration.
    pub fn with_config(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Arguments after the image path.
    fn command_args(&self) -> Vec<String> {
        let mut args = vec![
            "stdout".to_string(),
            "-l".to_string(),
            self.config.languages.clone(),
            "--psm".to_string(),
            self.config.page_seg_mode.to_string(),
            "--oem".to_string(),
            self.config.engine_mode.to_string(),
            "-c".to_string(),
            "preserve_interword_spaces=1".to_string(),
        ];
        if !self.config.char_whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!(
                "tessedit_char_whitelist={}",
                self.config.char_whitelist
            ));
        }
        args.push("tsv".to_string());
        args
    }

    fn run_tesseract_tsv(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .args(self.command_args())
            .output();

        match classify_output(output)? {
            CommandOutcome::Success(tsv) => Ok(tsv),
            CommandOutcome::Failed(stderr) => {
                Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr)))
            }
            CommandOutcome::NotFound => Err(OcrError::BackendNotAvailable(TESSERACT_HINT.into())),
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if check_binary("tesseract") {
            "Tesseract is available".to_string()
        } else {
            "Tesseract not installed. Install with: apt install tesseract-ocr tesseract-ocr-ron"
                .to_string()
        }
    }

    fn recognize(
        &self,
        page: &RasterPage,
        progress: &mut dyn FnMut(f32),
    ) -> Result<PageText, OcrError> {
        // The CLI gives no intermediate progress, only start and finish.
        progress(0.0);
        let tsv = self.run_tesseract_tsv(&page.path)?;
        let page_text = parse_tsv(&tsv, page.page_number)?;
        progress(1.0);
        Ok(page_text)
    }
}

const LEVEL_WORD: u8 = 5;
const TSV_COLUMNS: usize = 12;

/// One word row from tesseract TSV output.
struct TsvWord {
    line_key: (u32, u32, u32),
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    conf: f32,
    text: String,
}

fn parse_field<T: std::str::FromStr>(field: &str, name: &str, row: usize) -> Result<T, OcrError> {
    field
        .trim()
        .parse()
        .map_err(|_| OcrError::MalformedOutput(format!("bad {} '{}' on row {}", name, field, row)))
}

/// Parse tesseract TSV into page text, word boxes and line boxes.
///
/// Lines are rebuilt from word rows sharing the same block, paragraph and
/// line numbers; their boxes are the union of their words.
pub fn parse_tsv(tsv: &str, page_number: u32) -> Result<PageText, OcrError> {
    let mut words = Vec::new();

    for (row, raw) in tsv.lines().enumerate() {
        if row == 0 && raw.starts_with("level") {
            continue;
        }
        if raw.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = raw.splitn(TSV_COLUMNS, '\t').collect();
        if fields.len() < TSV_COLUMNS - 1 {
            return Err(OcrError::MalformedOutput(format!(
                "expected {} columns on row {}, got {}",
                TSV_COLUMNS,
                row,
                fields.len()
            )));
        }
        let level: u8 = parse_field(fields[0], "level", row)?;
        if level != LEVEL_WORD {
            continue;
        }
        let text = fields.get(11).map(|t| t.trim()).unwrap_or("");
        if text.is_empty() {
            continue;
        }
        words.push(TsvWord {
            line_key: (
                parse_field(fields[2], "block_num", row)?,
                parse_field(fields[3], "par_num", row)?,
                parse_field(fields[4], "line_num", row)?,
            ),
            left: parse_field(fields[6], "left", row)?,
            top: parse_field(fields[7], "top", row)?,
            width: parse_field(fields[8], "width", row)?,
            height: parse_field(fields[9], "height", row)?,
            conf: parse_field::<f32>(fields[10], "conf", row)?.max(0.0),
            text: text.to_string(),
        });
    }

    let mut grouped: BTreeMap<(u32, u32, u32), Vec<&TsvWord>> = BTreeMap::new();
    for word in &words {
        grouped.entry(word.line_key).or_default().push(word);
    }

    let mut lines = Vec::with_capacity(grouped.len());
    for line_words in grouped.values() {
        let text = line_words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let x0 = line_words.iter().map(|w| w.left).min().unwrap_or(0);
        let y0 = line_words.iter().map(|w| w.top).min().unwrap_or(0);
        let x1 = line_words.iter().map(|w| w.left + w.width).max().unwrap_or(0);
        let y1 = line_words.iter().map(|w| w.top + w.height).max().unwrap_or(0);
        let conf = line_words.iter().map(|w| w.conf).sum::<f32>() / line_words.len() as f32;
        lines.push(TextBox::new(text, (x0, y0, x1, y1), conf));
    }

    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let word_boxes = words
        .into_iter()
        .map(|w| {
            TextBox::new(
                w.text,
                (w.left, w.top, w.left + w.width, w.top + w.height),
                w.conf,
            )
        })
        .collect();

    Ok(PageText::new(page_number, text)
        .with_words(word_boxes)
        .with_lines(lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t600\t800\t-1\t
2\t1\t1\t0\t0\t0\t40\t50\t300\t60\t-1\t
3\t1\t1\t1\t0\t0\t40\t50\t300\t60\t-1\t
4\t1\t1\t1\t1\t0\t40\t50\t250\t20\t-1\t
5\t1\t1\t1\t1\t1\t40\t50\t60\t20\t95.5\tCaiet
5\t1\t1\t1\t1\t2\t110\t52\t30\t18\t91\tde
5\t1\t1\t1\t1\t3\t150\t50\t140\t20\t88\tsarcini
4\t1\t1\t1\t2\t0\t40\t90\t120\t20\t-1\t
5\t1\t1\t1\t2\t1\t40\t90\t120\t20\t80\tproiect
";

    #[test]
    fn test_parse_tsv_words_and_lines() {
        let page = parse_tsv(SAMPLE_TSV, 3).unwrap();
        assert_eq!(page.page_number, 3);
        assert_eq!(page.text, "Caiet de sarcini\nproiect");
        assert_eq!(page.words.len(), 4);
        assert_eq!(page.lines.len(), 2);

        let first = &page.words[0];
        assert_eq!(first.text, "Caiet");
        assert_eq!((first.x0, first.y0, first.x1, first.y1), (40, 50, 100, 70));

        let line = &page.lines[0];
        assert_eq!(line.text, "Caiet de sarcini");
        assert_eq!((line.x0, line.y0, line.x1, line.y1), (40, 50, 290, 70));
    }

    #[test]
    fn test_parse_tsv_skips_empty_words() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n5\t1\t1\t1\t1\t1\t10\t10\t5\t5\t-1\t \n";
        let page = parse_tsv(tsv, 1).unwrap();
        assert!(page.words.is_empty());
        assert!(page.text.is_empty());
    }

    #[test]
    fn test_parse_tsv_rejects_garbage() {
        let err = parse_tsv("level\n5\tx\n", 1).unwrap_err();
        assert!(matches!(err, OcrError::MalformedOutput(_)));
    }

    #[test]
    fn test_command_args_include_engine_settings() {
        let backend = TesseractBackend::new();
        let args = backend.command_args();
        assert_eq!(args.first().map(String::as_str), Some("stdout"));
        assert_eq!(args.last().map(String::as_str), Some("tsv"));
        assert!(args.windows(2).any(|w| w[0] == "-l" && w[1] == "ron+eng"));
        assert!(args.windows(2).any(|w| w[0] == "--psm" && w[1] == "3"));
        assert!(args.windows(2).any(|w| w[0] == "--oem" && w[1] == "2"));
        assert!(args.iter().any(|a| a.starts_with("tessedit_char_whitelist=")));
    }

    #[test]
    fn test_empty_whitelist_is_omitted() {
        let backend = TesseractBackend::with_config(OcrConfig {
            char_whitelist: String::new(),
            ..Default::default()
        });
        assert!(!backend
            .command_args()
            .iter()
            .any(|a| a.starts_with("tessedit_char_whitelist=")));
    }
}
