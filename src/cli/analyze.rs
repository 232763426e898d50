//! Document inspection commands (tool check, classification, thumbnails).

use std::path::Path;

use console::style;

use docseek::config::Settings;
use docseek::ocr::{
    render_thumbnail, DocumentTextSource, OcrBackend, PdftoppmRenderer, TesseractBackend,
    TextExtractor,
};
use docseek::search::classify;

/// Check analysis tool availability.
pub async fn cmd_check() -> anyhow::Result<()> {
    println!("\n{}", style("Tool Status").bold());
    println!("{}", "-".repeat(50));

    let tools = TextExtractor::check_tools();
    println!("\n{}", style("Poppler:").cyan());
    let mut all_found = true;

    for (tool, available) in &tools {
        if tool == "tesseract" {
            continue;
        }
        let status = if *available {
            style("✓ found").green()
        } else {
            all_found = false;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    println!("\n{}", style("OCR Backend:").cyan());
    let tesseract = TesseractBackend::new();
    let tesseract_status = if tesseract.is_available() {
        style("✓ available").green()
    } else {
        all_found = false;
        style("✗ not available").red()
    };
    println!("  {:<15} {}", "Tesseract", tesseract_status);
    if !tesseract.is_available() {
        println!(
            "                  {}",
            style(tesseract.availability_hint()).dim()
        );
    }

    println!();
    if all_found {
        println!("{} All tools available", style("✓").green());
    } else {
        println!(
            "{} Some tools are missing; scanned documents cannot be searched",
            style("!").yellow()
        );
    }

    Ok(())
}

/// Print whether a PDF would be searched through its text layer or OCR.
pub async fn cmd_classify(settings: &Settings, pdf: &Path) -> anyhow::Result<()> {
    let pdf_path = pdf.to_path_buf();
    let document =
        tokio::task::spawn_blocking(move || TextExtractor::new().extract(&pdf_path)).await??;
    let classification = classify(&document.full_text, settings.min_meaningful_words);

    println!("{} {}", style("Document:").bold(), pdf.display());
    println!("  {:<18} {}", "Pages", document.page_count);
    println!("  {:<18} {}", "Text length", document.full_text.chars().count());
    println!(
        "  {:<18} {}",
        "Meaningful words", classification.meaningful_words
    );
    let decision = if classification.needs_ocr {
        style("scanned, OCR required").yellow()
    } else {
        style("text layer").green()
    };
    println!("  {:<18} {}", "Decision", decision);

    Ok(())
}

/// Render one page at the thumbnail resolution.
pub async fn cmd_thumbnail(
    settings: &Settings,
    pdf: &Path,
    page: u32,
    output: &Path,
) -> anyhow::Result<()> {
    if page == 0 {
        anyhow::bail!("page numbers start at 1");
    }
    let size = settings.thumbnail_raster;
    let pdf_path = pdf.to_path_buf();
    let output_path = output.to_path_buf();
    let written = tokio::task::spawn_blocking(move || {
        render_thumbnail(
            &PdftoppmRenderer::new(),
            &pdf_path,
            page,
            size,
            &output_path,
        )
    })
    .await??;

    println!(
        "{} Page {} rendered to {} ({}x{})",
        style("✓").green(),
        page,
        written.display(),
        size.width,
        size.height
    );
    Ok(())
}
