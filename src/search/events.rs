//! Pipeline events and the channel they are written to.
//!
//! The pipeline only produces [`PipelineEvent`] values; framing them on a
//! wire (NDJSON on stdout, an HTTP body, ...) is up to the receiver.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::MatchOccurrence;

/// Named pipeline stages, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    FileFound,
    Analysis,
    OcrStart,
    ConvertStart,
    ConvertPage,
    OcrProcessing,
    OcrPage,
    OcrRecognize,
    OcrPageComplete,
    OcrError,
    SearchStart,
    TextSearch,
}

/// Incremental status update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    /// Overall completion percentage, never decreasing within a run.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_ocr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meaningful_words: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
    /// Engine-reported progress for the current page, 0-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, message: impl Into<String>, progress: u8) -> Self {
        Self {
            stage,
            message: message.into(),
            progress: progress.min(100),
            file_path: None,
            page: None,
            total_pages: None,
            needs_ocr: None,
            meaningful_words: None,
            text_length: None,
            engine_progress: None,
            matches: None,
            error: None,
        }
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn page(mut self, page: u32, total_pages: u32) -> Self {
        self.page = Some(page);
        self.total_pages = Some(total_pages);
        self
    }

    pub fn total_pages(mut self, total_pages: u32) -> Self {
        self.total_pages = Some(total_pages);
        self
    }

    pub fn analysis(mut self, needs_ocr: bool, meaningful_words: usize, text_length: usize) -> Self {
        self.needs_ocr = Some(needs_ocr);
        self.meaningful_words = Some(meaningful_words);
        self.text_length = Some(text_length);
        self
    }

    pub fn engine_progress(mut self, fraction: f32) -> Self {
        self.engine_progress = Some((fraction.clamp(0.0, 1.0) * 100.0).round() as u8);
        self
    }

    pub fn matches(mut self, matches: usize) -> Self {
        self.matches = Some(matches);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Final payload of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub results: Vec<MatchOccurrence>,
    pub total_matches: usize,
    #[serde(rename = "isOCRDocument")]
    pub is_ocr_document: bool,
    pub text_length: usize,
    pub num_pages: u32,
}

/// Final payload of a failed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailure {
    pub reason: String,
    pub detail: String,
    /// Paths tried while resolving the input file.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<String>,
}

/// A message on the pipeline's event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    Complete(SearchSummary),
    Error(PipelineFailure),
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Progress(_))
    }

    /// One line of newline-delimited JSON, without the newline.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Write side of the event stream.
///
/// Keeps reported progress monotonic and tells the pipeline when nobody
/// is listening any more. A detached sink drops every event.
#[derive(Debug)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
    last_progress: AtomicU8,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self {
            tx: Some(tx),
            last_progress: AtomicU8::new(0),
        }
    }

    pub fn detached() -> Self {
        Self {
            tx: None,
            last_progress: AtomicU8::new(0),
        }
    }

    /// Send a progress update, raising its percentage to the last one sent
    /// if it would go backwards.
    pub fn progress(&self, mut event: ProgressEvent) {
        let previous = self
            .last_progress
            .fetch_max(event.progress, Ordering::Relaxed);
        event.progress = event.progress.max(previous);
        tracing::debug!(stage = ?event.stage, progress = event.progress, "{}", event.message);
        self.send(PipelineEvent::Progress(event));
    }

    /// Send the terminal event.
    pub fn finish(&self, event: PipelineEvent) {
        debug_assert!(event.is_terminal());
        self.send(event);
    }

    /// Whether the receiver has gone away.
    pub fn is_cancelled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.is_closed())
    }

    fn send(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("Event receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        sink.progress(ProgressEvent::new(Stage::Init, "start", 0));
        sink.progress(ProgressEvent::new(Stage::Analysis, "analysis", 15));
        sink.progress(ProgressEvent::new(Stage::ConvertPage, "late", 10));

        let mut seen = Vec::new();
        while let Ok(PipelineEvent::Progress(p)) = rx.try_recv() {
            seen.push(p.progress);
        }
        assert_eq!(seen, vec![0, 15, 15]);
    }

    #[test]
    fn test_cancelled_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        assert!(!sink.is_cancelled());
        drop(rx);
        assert!(sink.is_cancelled());
        sink.progress(ProgressEvent::new(Stage::Init, "nobody listens", 0));
    }

    #[test]
    fn test_detached_sink_is_never_cancelled() {
        let sink = EventSink::detached();
        sink.progress(ProgressEvent::new(Stage::Init, "dropped", 0));
        assert!(!sink.is_cancelled());
    }

    #[test]
    fn test_progress_wire_format() {
        let event = PipelineEvent::Progress(
            ProgressEvent::new(Stage::OcrRecognize, "Recognizing page 2", 47)
                .page(2, 5)
                .engine_progress(0.5),
        );
        let value: serde_json::Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["stage"], "ocr_recognize");
        assert_eq!(value["progress"], 47);
        assert_eq!(value["page"], 2);
        assert_eq!(value["totalPages"], 5);
        assert_eq!(value["engineProgress"], 50);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_terminal_wire_format() {
        let complete = PipelineEvent::Complete(SearchSummary {
            results: Vec::new(),
            total_matches: 0,
            is_ocr_document: true,
            text_length: 12,
            num_pages: 3,
        });
        let value = serde_json::to_value(&complete).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["isOCRDocument"], true);
        assert_eq!(value["numPages"], 3);
        assert!(complete.is_terminal());

        let error = PipelineEvent::Error(PipelineFailure {
            reason: "File not found".to_string(),
            detail: "no candidate existed".to_string(),
            attempts: vec!["/data/a.pdf".to_string()],
        });
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["attempts"][0], "/data/a.pdf");
    }
}
