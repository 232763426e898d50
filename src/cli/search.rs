//! Search commands: the streaming NDJSON search and the legacy one-shot find.

use std::io::Write;
use std::sync::Arc;

use docseek::config::Settings;
use docseek::search::{PipelineEvent, QueryMode, SearchPipeline, SearchRequest};

use super::SearchArgs;

fn build(settings: &Settings, args: SearchArgs) -> (SearchPipeline, SearchRequest) {
    let mut settings = settings.clone();
    if let Some(storage) = args.storage {
        settings.storage_dir = storage;
    }

    let mut pipeline = SearchPipeline::from_settings(&settings);
    if let Some(cap) = args.page_cap {
        let mut options = pipeline.options().clone();
        options.page_cap = cap;
        pipeline = pipeline.with_options(options).with_legacy_page_cap(cap);
    }

    let mode = if args.regex {
        QueryMode::Regex
    } else {
        QueryMode::Literal
    };
    let request = SearchRequest::new(args.file_name, args.path, args.query).with_mode(mode);
    (pipeline, request)
}

/// Stream every pipeline event to stdout, one JSON object per line.
pub async fn cmd_search(settings: &Settings, args: SearchArgs) -> anyhow::Result<()> {
    let (pipeline, request) = build(settings, args);
    let mut events = Arc::new(pipeline).stream(request);

    let stdout = std::io::stdout();
    let mut failed = false;
    while let Some(event) = events.recv().await {
        if let PipelineEvent::Error(_) = event {
            failed = true;
        }
        let line = event.to_json_line()?;
        let mut out = stdout.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
    }

    if failed {
        anyhow::bail!("search failed");
    }
    Ok(())
}

/// Run the legacy search and print only its final payload.
pub async fn cmd_find(settings: &Settings, args: SearchArgs) -> anyhow::Result<()> {
    let (pipeline, request) = build(settings, args);
    let outcome = tokio::task::spawn_blocking(move || pipeline.search_once(&request)).await?;

    match outcome {
        PipelineEvent::Complete(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        PipelineEvent::Error(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure)?);
            anyhow::bail!("{}: {}", failure.reason, failure.detail)
        }
        PipelineEvent::Progress(_) => anyhow::bail!("search ended without a result"),
    }
}
