//! The search pipeline.
//!
//! Resolves the document, extracts its text layer, decides whether it needs
//! OCR, recognizes pages if so, and then locates every occurrence of the
//! query with a highlight box where one can be recovered. Stages run
//! sequentially on one thread; progress goes out through an [`EventSink`].

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::classifier::{classify, MIN_MEANINGFUL_WORDS};
use super::coordinates::{CoordinateResolver, DocumentShape, MatchSite};
use super::error::PipelineError;
use super::events::{EventSink, PipelineEvent, ProgressEvent, SearchSummary, Stage};
use super::locator::{
    build_matcher, context_window, estimate_page, find_matches, AggregatedText, QueryMode,
};
use super::resolve::resolve_document;
use crate::config::Settings;
use crate::models::{ExtractedDocument, MatchOccurrence, PageText, RasterSize};
use crate::ocr::{
    DocumentTextSource, OcrBackend, PageRasterizer, PageRenderer, PdftoppmRenderer, RasterError,
    RasterWorkspace, TesseractBackend, TextExtractor,
};

// Progress budget: conversion runs 20-35%, recognition 35-85%.
const CONVERT_START: u8 = 20;
const CONVERT_SPAN: f32 = 15.0;
const OCR_START: u8 = 35;
const OCR_SPAN: f32 = 50.0;

/// A search request as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub file_name: String,
    /// Storage-relative sub-path, may be empty.
    pub file_path: String,
    pub search_query: String,
    pub query_mode: QueryMode,
}

impl SearchRequest {
    pub fn new(
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        search_query: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            search_query: search_query.into(),
            query_mode: QueryMode::Literal,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.query_mode = mode;
        self
    }
}

/// Tunables for one pipeline flavor.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Maximum number of pages rendered and recognized.
    pub page_cap: u32,
    /// Resolution pages are rendered at for OCR.
    pub raster: RasterSize,
    pub min_meaningful_words: usize,
    /// Parent for per-run scratch directories; system temp when unset.
    pub temp_root: Option<PathBuf>,
    /// Fail the run when no page can be rendered, instead of completing
    /// with no OCR results.
    pub abort_on_raster_failure: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            page_cap: 10,
            raster: RasterSize::OCR,
            min_meaningful_words: MIN_MEANINGFUL_WORDS,
            temp_root: None,
            abort_on_raster_failure: false,
        }
    }
}

/// Search pipeline over a storage directory and its collaborators.
#[derive(Clone)]
pub struct SearchPipeline {
    storage_dir: PathBuf,
    extractor: Arc<dyn DocumentTextSource>,
    renderer: Arc<dyn PageRenderer>,
    ocr: Arc<dyn OcrBackend>,
    resolver: Arc<CoordinateResolver>,
    options: PipelineOptions,
    legacy_page_cap: u32,
}

impl SearchPipeline {
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        extractor: Arc<dyn DocumentTextSource>,
        renderer: Arc<dyn PageRenderer>,
        ocr: Arc<dyn OcrBackend>,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            extractor,
            renderer,
            ocr,
            resolver: Arc::new(CoordinateResolver::standard()),
            options: PipelineOptions::default(),
            legacy_page_cap: 3,
        }
    }

    /// Pipeline backed by Poppler and Tesseract, configured from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.storage_dir.clone(),
            Arc::new(TextExtractor::new()),
            Arc::new(PdftoppmRenderer::new()),
            Arc::new(TesseractBackend::with_config(settings.ocr_config())),
        )
        .with_options(settings.pipeline_options())
        .with_legacy_page_cap(settings.legacy_page_cap)
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_legacy_page_cap(mut self, page_cap: u32) -> Self {
        self.legacy_page_cap = page_cap;
        self
    }

    pub fn with_resolver(mut self, resolver: CoordinateResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The same pipeline with the legacy caller's page cap, failing hard
    /// when no page can be rendered.
    pub fn legacy(&self) -> Self {
        let mut legacy = self.clone();
        legacy.options.page_cap = self.legacy_page_cap;
        legacy.options.abort_on_raster_failure = true;
        legacy
    }

    /// Run in a blocking task and stream events as they happen.
    ///
    /// The stream always ends with exactly one `complete` or `error` event.
    /// Dropping the receiver cancels the run at the next stage boundary.
    /// Must be called from within a tokio runtime.
    pub fn stream(self: Arc<Self>, request: SearchRequest) -> mpsc::UnboundedReceiver<PipelineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            let sink = EventSink::new(tx);
            self.execute(&request, &sink);
        });
        rx
    }

    /// Non-streaming entry point used by the legacy caller.
    ///
    /// Returns only the terminal event.
    pub fn search_once(&self, request: &SearchRequest) -> PipelineEvent {
        let legacy = self.legacy();
        let sink = EventSink::detached();
        legacy.outcome(request, &sink)
    }

    /// Run the pipeline and send the terminal event to `sink`.
    pub fn execute(&self, request: &SearchRequest, sink: &EventSink) {
        let terminal = self.outcome(request, sink);
        sink.finish(terminal);
    }

    fn outcome(&self, request: &SearchRequest, sink: &EventSink) -> PipelineEvent {
        let span = tracing::info_span!("search", invocation = %Uuid::new_v4());
        let _guard = span.enter();

        match self.run(request, sink) {
            Ok(summary) => {
                tracing::info!(
                    "Search for '{}' in {} finished with {} match(es)",
                    request.search_query,
                    request.file_name,
                    summary.total_matches
                );
                PipelineEvent::Complete(summary)
            }
            Err(e) => {
                tracing::error!("Search for '{}' failed: {}", request.search_query, e);
                PipelineEvent::Error(e.to_failure())
            }
        }
    }

    /// Run every stage, emitting progress but not the terminal event.
    pub fn run(
        &self,
        request: &SearchRequest,
        sink: &EventSink,
    ) -> Result<SearchSummary, PipelineError> {
        let query = request.search_query.trim();
        if query.is_empty() {
            return Err(PipelineError::InvalidQuery("query is empty".to_string()));
        }
        let matcher = build_matcher(query, request.query_mode)
            .map_err(|e| PipelineError::InvalidQuery(e.to_string()))?;

        sink.progress(ProgressEvent::new(Stage::Init, "Starting search", 0));

        let pdf_path = resolve_document(&self.storage_dir, &request.file_name, &request.file_path)?;
        sink.progress(
            ProgressEvent::new(Stage::FileFound, "Document located", 5)
                .file_path(pdf_path.display().to_string()),
        );
        self.check_cancelled(sink)?;

        let document = self
            .extractor
            .extract(&pdf_path)
            .map_err(PipelineError::UnreadableDocument)?;
        let classification = classify(&document.full_text, self.options.min_meaningful_words);
        sink.progress(
            ProgressEvent::new(
                Stage::Analysis,
                if classification.needs_ocr {
                    "Scanned document detected, OCR required"
                } else {
                    "Text layer found"
                },
                15,
            )
            .analysis(
                classification.needs_ocr,
                classification.meaningful_words,
                document.full_text.chars().count(),
            )
            .total_pages(document.page_count),
        );
        self.check_cancelled(sink)?;

        if classification.needs_ocr {
            let pages = self.recognize_pages(&pdf_path, &document, sink)?;
            let recognized = document.with_pages(pages);
            sink.progress(ProgressEvent::new(Stage::SearchStart, "Searching recognized text", 88));
            Ok(self.search_ocr_pages(&matcher, &recognized, sink))
        } else {
            Ok(self.search_text_layer(&matcher, &document, sink))
        }
    }

    fn check_cancelled(&self, sink: &EventSink) -> Result<(), PipelineError> {
        if sink.is_cancelled() {
            tracing::info!("Receiver gone, stopping search");
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Render and recognize the leading pages.
    ///
    /// Rendering stops at the first failed page; recognition skips failed
    /// pages and carries on. Scratch images are deleted as soon as they
    /// are consumed and the scratch directory when this returns.
    fn recognize_pages(
        &self,
        pdf_path: &Path,
        document: &ExtractedDocument,
        sink: &EventSink,
    ) -> Result<Vec<PageText>, PipelineError> {
        let workspace = RasterWorkspace::create(self.options.temp_root.as_deref())?;
        let rasterizer = PageRasterizer::new(
            self.renderer.as_ref(),
            self.options.raster,
            self.options.page_cap,
        );
        let pages_to_convert = rasterizer.pages_to_convert(document.page_count);

        sink.progress(ProgressEvent::new(Stage::OcrStart, "Starting OCR", CONVERT_START));
        sink.progress(
            ProgressEvent::new(
                Stage::ConvertStart,
                format!("Converting {} page(s) to images", pages_to_convert),
                CONVERT_START,
            )
            .total_pages(pages_to_convert),
        );

        let converted = rasterizer.rasterize(pdf_path, document.page_count, &workspace, |p| {
            if sink.is_cancelled() {
                return ControlFlow::Break(());
            }
            let done = (p.page_number - 1) as f32 / p.pages_to_convert.max(1) as f32;
            sink.progress(
                ProgressEvent::new(
                    Stage::ConvertPage,
                    format!("Converting page {}/{}", p.page_number, p.pages_to_convert),
                    CONVERT_START + (done * CONVERT_SPAN) as u8,
                )
                .page(p.page_number, p.pages_to_convert),
            );
            ControlFlow::Continue(())
        });
        self.check_cancelled(sink)?;

        let raster_pages = match converted {
            Ok(pages) => pages,
            Err(RasterError::RasterizationFailed) if !self.options.abort_on_raster_failure => {
                tracing::warn!(
                    "No pages of {} could be rasterized, continuing without OCR results",
                    pdf_path.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(PipelineError::RasterizationFailed(e)),
        };

        let total = raster_pages.len() as u32;
        let slice = OCR_SPAN / total.max(1) as f32;
        sink.progress(
            ProgressEvent::new(
                Stage::OcrProcessing,
                format!("Recognizing {} page(s) with {}", total, self.ocr.name()),
                OCR_START,
            )
            .total_pages(total),
        );

        let mut recognized = Vec::with_capacity(raster_pages.len());
        for (i, page) in raster_pages.iter().enumerate() {
            if sink.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let slice_start = OCR_START as f32 + i as f32 * slice;
            let number = page.page_number;

            sink.progress(
                ProgressEvent::new(
                    Stage::OcrPage,
                    format!("Processing page {}/{}", i + 1, total),
                    slice_start as u8,
                )
                .page(number, total),
            );

            let mut on_engine_progress = |fraction: f32| {
                let fraction = fraction.clamp(0.0, 1.0);
                sink.progress(
                    ProgressEvent::new(
                        Stage::OcrRecognize,
                        format!("Recognizing page {}", number),
                        (slice_start + fraction * slice) as u8,
                    )
                    .page(number, total)
                    .engine_progress(fraction),
                );
            };
            let result = self.ocr.recognize_timed(page, &mut on_engine_progress);
            workspace.discard(&page.path);

            match result {
                Ok(page_text) => {
                    if !page_text.has_geometry() {
                        tracing::debug!(
                            "Page {} came back without word or line boxes, highlights will be estimated",
                            number
                        );
                    }
                    sink.progress(
                        ProgressEvent::new(
                            Stage::OcrPageComplete,
                            format!(
                                "Page {} done: {} word(s) recognized",
                                number,
                                page_text.words.len()
                            ),
                            (slice_start + slice) as u8,
                        )
                        .page(number, total),
                    );
                    recognized.push(page_text);
                }
                Err(e) => {
                    tracing::warn!("OCR failed for page {}: {}", number, e);
                    sink.progress(
                        ProgressEvent::new(
                            Stage::OcrError,
                            format!("OCR failed for page {}", number),
                            (slice_start + slice) as u8,
                        )
                        .page(number, total)
                        .error(e.to_string()),
                    );
                }
            }
        }

        workspace.close();
        Ok(recognized)
    }

    fn search_ocr_pages(
        &self,
        matcher: &Regex,
        document: &ExtractedDocument,
        sink: &EventSink,
    ) -> SearchSummary {
        let pages = &document.per_page;
        let aggregated = AggregatedText::from_pages(pages);
        let shape = DocumentShape::of(&aggregated.text);
        let by_number: HashMap<u32, &PageText> = pages.iter().map(|p| (p.page_number, p)).collect();
        let mut seen_on_page: HashMap<u32, usize> = HashMap::new();

        let matches = find_matches(matcher, &aggregated.text);
        let mut results = Vec::with_capacity(matches.len());

        for (match_index, m) in matches.iter().enumerate() {
            let Some(span) = aggregated.span_for(m.start) else {
                continue;
            };
            let index_on_page = {
                let counter = seen_on_page.entry(span.page_number).or_insert(0);
                let current = *counter;
                *counter += 1;
                current
            };

            let coordinates = by_number.get(&span.page_number).and_then(|page| {
                let site = MatchSite {
                    page: *page,
                    match_text: &m.matched_text,
                    page_offset: m.start.checked_sub(span.offset),
                    index_on_page,
                    match_index,
                    document_char_index: m.char_index,
                    shape,
                    raster: self.options.raster,
                };
                self.resolver.resolve(&site)
            });

            results.push(MatchOccurrence {
                match_index,
                page_number: span.page_number,
                match_text: m.matched_text.clone(),
                context: context_window(&aggregated.text, m.start, m.end),
                coordinates,
                is_ocr: true,
            });
        }

        sink.progress(
            ProgressEvent::new(
                Stage::TextSearch,
                format!("Found {} match(es) in recognized text", results.len()),
                90,
            )
            .matches(results.len()),
        );

        SearchSummary {
            total_matches: results.len(),
            results,
            is_ocr_document: true,
            text_length: shape.char_len,
            num_pages: document.page_count,
        }
    }

    /// Text-native search. Pages are estimated from the match position and
    /// no coordinates are produced.
    fn search_text_layer(
        &self,
        matcher: &Regex,
        document: &ExtractedDocument,
        sink: &EventSink,
    ) -> SearchSummary {
        let text = &document.full_text;
        let text_chars = text.chars().count();

        sink.progress(ProgressEvent::new(Stage::TextSearch, "Searching document text", 50));

        let results: Vec<MatchOccurrence> = find_matches(matcher, text)
            .into_iter()
            .enumerate()
            .map(|(match_index, m)| MatchOccurrence {
                match_index,
                page_number: estimate_page(m.char_index, text_chars, document.page_count),
                context: context_window(text, m.start, m.end),
                match_text: m.matched_text,
                coordinates: None,
                is_ocr: false,
            })
            .collect();

        sink.progress(
            ProgressEvent::new(
                Stage::TextSearch,
                format!("Found {} match(es)", results.len()),
                90,
            )
            .matches(results.len()),
        );

        SearchSummary {
            total_matches: results.len(),
            results,
            is_ocr_document: false,
            text_length: text_chars,
            num_pages: document.page_count,
        }
    }
}
