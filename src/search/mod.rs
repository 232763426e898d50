//! Phrase search over stored PDFs.
//!
//! The pipeline resolves a document, decides between the text layer and
//! OCR, finds every occurrence of the query and, for OCR pages, recovers a
//! highlight box through a chain of coordinate strategies.

mod classifier;
mod coordinates;
mod error;
mod events;
mod locator;
mod pipeline;
mod resolve;

pub use classifier::{classify, meaningful_word_count, ScanClassification, MIN_MEANINGFUL_WORDS};
pub use coordinates::{
    bounded_box, CoordinateResolver, CoordinateStrategy, DocumentShape, ExactWordStrategy,
    LineStrategy, MatchSite, PartialWordStrategy, ReferenceWordStrategy, SyntheticStrategy,
    TextLayoutStrategy, MAX_BOX_WIDTH, MIN_BOX_HEIGHT, MIN_BOX_WIDTH,
};
pub use error::PipelineError;
pub use events::{EventSink, PipelineEvent, PipelineFailure, ProgressEvent, SearchSummary, Stage};
pub use locator::{
    build_matcher, context_window, estimate_page, find_matches, AggregatedText, PageSpan,
    QueryMode, RawMatch, CONTEXT_RADIUS,
};
pub use pipeline::{PipelineOptions, SearchPipeline, SearchRequest};
pub use resolve::{candidate_paths, resolve_document};
