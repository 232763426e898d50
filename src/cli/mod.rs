//! CLI parser and command dispatch.

mod analyze;
mod search;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use docseek::config::load_settings;

#[derive(Parser)]
#[command(name = "docseek")]
#[command(about = "Phrase search over stored PDFs with OCR fallback")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Arguments shared by the streaming and legacy searches.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Name of the stored document
    file_name: String,

    /// Text to search for
    query: String,

    /// Storage-relative sub-path of the document
    #[arg(short, long, default_value = "")]
    path: String,

    /// Storage directory (overrides config)
    #[arg(short, long, env = "DOCSEEK_STORAGE_DIR")]
    storage: Option<PathBuf>,

    /// Treat the query as a case-insensitive regular expression
    #[arg(long)]
    regex: bool,

    /// Maximum number of pages to OCR (overrides config)
    #[arg(long)]
    page_cap: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a document, streaming progress and results as NDJSON
    Search(SearchArgs),

    /// Search a document and print only the final result
    Find(SearchArgs),

    /// Check availability of the external tools
    Check,

    /// Report whether a PDF has a usable text layer
    Classify {
        /// PDF file to inspect
        pdf: PathBuf,
    },

    /// Render one page of a PDF as a thumbnail
    Thumbnail {
        /// PDF file to render
        pdf: PathBuf,
        /// Page number (1-based)
        page: u32,
        /// Output PNG path
        output: PathBuf,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Search(args) => search::cmd_search(&settings, args).await,
        Commands::Find(args) => search::cmd_find(&settings, args).await,
        Commands::Check => analyze::cmd_check().await,
        Commands::Classify { pdf } => analyze::cmd_classify(&settings, &pdf).await,
        Commands::Thumbnail { pdf, page, output } => {
            analyze::cmd_thumbnail(&settings, &pdf, page, &output).await
        }
    }
}
