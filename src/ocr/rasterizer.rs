//! PDF page rasterization using pdftoppm.
//!
//! Pages are rendered one at a time, in order, into a per-invocation
//! scratch directory that is removed when the workspace is dropped.

use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use thiserror::Error;

use super::tools::{classify_status, CommandOutcome, PDFTOPPM_HINT};
use crate::models::RasterSize;

/// Errors from page rasterization.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Conversion failed for page {page}: {reason}")]
    ConversionFailed { page: u32, reason: String },

    #[error("No pages could be rasterized")]
    RasterizationFailed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Renders a single PDF page to an image file.
pub trait PageRenderer: Send + Sync {
    /// Render `page` of `pdf_path` at exactly `size` pixels into `output_dir`,
    /// returning the written image path.
    fn render_page(
        &self,
        pdf_path: &Path,
        page: u32,
        size: RasterSize,
        output_dir: &Path,
    ) -> Result<PathBuf, RasterError>;
}

/// Page renderer backed by Poppler's pdftoppm.
#[derive(Debug, Clone, Default)]
pub struct PdftoppmRenderer;

impl PdftoppmRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render_page(
        &self,
        pdf_path: &Path,
        page: u32,
        size: RasterSize,
        output_dir: &Path,
    ) -> Result<PathBuf, RasterError> {
        let page_str = page.to_string();
        let width = size.width.to_string();
        let height = size.height.to_string();
        let output_prefix = output_dir.join(format!("page-{}", page));

        let status = Command::new("pdftoppm")
            .args(["-png", "-singlefile", "-f", &page_str, "-l", &page_str])
            .args(["-scale-to-x", &width, "-scale-to-y", &height])
            .arg(pdf_path)
            .arg(&output_prefix)
            .status();

        match classify_status(status)? {
            CommandOutcome::Success(_) => {
                let image_path = output_prefix.with_extension("png");
                if image_path.exists() {
                    Ok(image_path)
                } else {
                    Err(RasterError::ConversionFailed {
                        page,
                        reason: "no image generated".to_string(),
                    })
                }
            }
            CommandOutcome::Failed(reason) => Err(RasterError::ConversionFailed { page, reason }),
            CommandOutcome::NotFound => Err(RasterError::ToolNotFound(PDFTOPPM_HINT.into())),
        }
    }
}

/// Scratch directory for one invocation's raster images.
///
/// Named with a random suffix so concurrent invocations never share it.
/// The directory and anything left in it are removed on drop.
#[derive(Debug)]
pub struct RasterWorkspace {
    dir: TempDir,
}

impl RasterWorkspace {
    /// Create a workspace under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docseek-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!("Created raster workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete one consumed image. Failures are logged, never returned.
    pub fn discard(&self, image: &Path) {
        if let Err(e) = std::fs::remove_file(image) {
            tracing::warn!("Failed to delete raster image {}: {}", image.display(), e);
        }
    }

    /// Remove the directory now instead of waiting for drop.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!("Failed to remove raster workspace {}: {}", path.display(), e);
        }
    }
}

/// A page successfully rendered for OCR.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPage {
    pub page_number: u32,
    pub path: PathBuf,
    pub size: RasterSize,
}

/// Progress notification for a page about to be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertProgress {
    pub page_number: u32,
    pub pages_to_convert: u32,
}

/// Converts the leading pages of a PDF to images, bounded by a page cap.
pub struct PageRasterizer<'a> {
    renderer: &'a dyn PageRenderer,
    size: RasterSize,
    page_cap: u32,
}

impl<'a> PageRasterizer<'a> {
    pub fn new(renderer: &'a dyn PageRenderer, size: RasterSize, page_cap: u32) -> Self {
        Self {
            renderer,
            size,
            page_cap,
        }
    }

    /// Number of pages that will be attempted for a document.
    pub fn pages_to_convert(&self, page_count: u32) -> u32 {
        page_count.min(self.page_cap)
    }

    /// Render pages `1..=min(page_count, page_cap)` in order.
    ///
    /// The first conversion failure stops the loop; pages converted before it
    /// are kept. `before_page` may break to stop early (cancellation), which
    /// also keeps what was converted so far. Returns `RasterizationFailed`
    /// only if nothing was converted.
    pub fn rasterize<F>(
        &self,
        pdf_path: &Path,
        page_count: u32,
        workspace: &RasterWorkspace,
        mut before_page: F,
    ) -> Result<Vec<RasterPage>, RasterError>
    where
        F: FnMut(ConvertProgress) -> ControlFlow<()>,
    {
        let pages_to_convert = self.pages_to_convert(page_count);
        let mut pages = Vec::with_capacity(pages_to_convert as usize);

        for page_number in 1..=pages_to_convert {
            let progress = ConvertProgress {
                page_number,
                pages_to_convert,
            };
            if before_page(progress).is_break() {
                break;
            }

            match self
                .renderer
                .render_page(pdf_path, page_number, self.size, workspace.path())
            {
                Ok(path) => pages.push(RasterPage {
                    page_number,
                    path,
                    size: self.size,
                }),
                Err(e) => {
                    tracing::warn!(
                        "Stopping rasterization at page {}/{}: {}",
                        page_number,
                        pages_to_convert,
                        e
                    );
                    break;
                }
            }
        }

        if pages.is_empty() {
            return Err(RasterError::RasterizationFailed);
        }
        Ok(pages)
    }
}

/// Render a single page as a thumbnail image at `output`.
///
/// Independent of the OCR pass: it uses its own resolution and writes
/// straight to the requested path.
pub fn render_thumbnail(
    renderer: &dyn PageRenderer,
    pdf_path: &Path,
    page: u32,
    size: RasterSize,
    output: &Path,
) -> Result<PathBuf, RasterError> {
    let workspace = RasterWorkspace::create(None)?;
    let rendered = renderer.render_page(pdf_path, page, size, workspace.path())?;
    std::fs::copy(&rendered, output)?;
    workspace.close();
    Ok(output.to_path_buf())
}
