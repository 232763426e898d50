//! Highlight coordinate recovery for OCR matches.
//!
//! A match is resolved by walking an ordered chain of strategies and taking
//! the first box produced. Engine geometry comes first; the later tiers
//! estimate or fabricate a position and say so through their method tag and
//! a lower confidence.

use crate::models::{CoordinateMethod, Coordinates, PageText, RasterSize, TextBox};

pub const MIN_BOX_WIDTH: u32 = 30;
pub const MIN_BOX_HEIGHT: u32 = 20;
pub const MAX_BOX_WIDTH: u32 = 300;

const REFERENCE_WORD_LIMIT: usize = 20;
const PAGE_MARGIN_X: u32 = 50;
const PAGE_MARGIN_Y: u32 = 60;

/// Shape of the whole searched text, used by the synthetic tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentShape {
    pub avg_words_per_line: f64,
    pub char_len: usize,
}

impl DocumentShape {
    /// Short lines on average suggest forms and tables rather than prose.
    pub const STRUCTURED_WORDS_PER_LINE: f64 = 8.0;

    pub fn of(text: &str) -> Self {
        let (lines, words) = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .fold((0usize, 0usize), |(lines, words), line| {
                (lines + 1, words + line.split_whitespace().count())
            });
        Self {
            avg_words_per_line: if lines == 0 {
                0.0
            } else {
                words as f64 / lines as f64
            },
            char_len: text.chars().count(),
        }
    }

    pub fn is_structured(&self) -> bool {
        self.avg_words_per_line < Self::STRUCTURED_WORDS_PER_LINE
    }
}

/// Everything known about one match when resolving its box.
#[derive(Debug, Clone, Copy)]
pub struct MatchSite<'a> {
    pub page: &'a PageText,
    /// Text as it matched in the searched text, not the query pattern.
    pub match_text: &'a str,
    /// Byte offset of the match inside `page.text`, when known.
    pub page_offset: Option<usize>,
    /// Position of this match among the matches on the same page.
    pub index_on_page: usize,
    /// Position of this match among all matches in the document.
    pub match_index: usize,
    /// Character offset of the match in the whole searched text.
    pub document_char_index: usize,
    pub shape: DocumentShape,
    pub raster: RasterSize,
}

/// One tier of the coordinate fallback chain.
pub trait CoordinateStrategy: Send + Sync {
    fn method(&self) -> CoordinateMethod;

    fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates>;
}

/// Ordered chain of strategies; the first that yields a box wins.
pub struct CoordinateResolver {
    strategies: Vec<Box<dyn CoordinateStrategy>>,
}

impl CoordinateResolver {
    pub fn new(strategies: Vec<Box<dyn CoordinateStrategy>>) -> Self {
        Self { strategies }
    }

    /// Exact word, partial word, line, reference word, text layout, then
    /// synthetic placement.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ExactWordStrategy),
            Box::new(PartialWordStrategy),
            Box::new(LineStrategy),
            Box::new(ReferenceWordStrategy),
            Box::new(TextLayoutStrategy),
            Box::new(SyntheticStrategy),
        ])
    }

    pub fn methods(&self) -> Vec<CoordinateMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    pub fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates> {
        self.strategies.iter().find_map(|strategy| {
            let coordinates = strategy.resolve(site);
            if let Some(ref c) = coordinates {
                tracing::trace!(
                    "Match {} on page {} resolved by {} at ({}, {})",
                    site.match_index,
                    site.page.page_number,
                    c.method,
                    c.x,
                    c.y
                );
            }
            coordinates
        })
    }
}

impl Default for CoordinateResolver {
    fn default() -> Self {
        Self::standard()
    }
}

/// Clamp a box into the raster and keep it plausibly sized.
pub fn bounded_box(
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    raster: RasterSize,
    method: CoordinateMethod,
    confidence: f32,
) -> Coordinates {
    let image_width = raster.width.max(1);
    let image_height = raster.height.max(1);

    let width = (width.max(0) as u32)
        .clamp(MIN_BOX_WIDTH, MAX_BOX_WIDTH)
        .min(image_width);
    let height = (height.max(0) as u32).max(MIN_BOX_HEIGHT).min(image_height);
    let x = (x.max(0) as u32).min(image_width - width);
    let y = (y.max(0) as u32).min(image_height - height);

    Coordinates {
        x,
        y,
        width,
        height,
        image_width,
        image_height,
        method,
        confidence: confidence.clamp(0.0, 1.0),
        reference_word: None,
    }
}

fn box_coordinates(
    b: &TextBox,
    raster: RasterSize,
    method: CoordinateMethod,
    confidence: f32,
) -> Coordinates {
    bounded_box(
        b.x0 as i64,
        b.y0 as i64,
        b.width() as i64,
        b.height() as i64,
        raster,
        method,
        confidence,
    )
}

/// Lowercase and strip surrounding punctuation.
fn normalize_token(s: &str) -> String {
    s.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// Valid word boxes in reading order (top to bottom, then left to right).
fn sorted_words<'a, F>(page: &'a PageText, mut keep: F) -> Vec<&'a TextBox>
where
    F: FnMut(&TextBox) -> bool,
{
    let mut words: Vec<&TextBox> = page
        .words
        .iter()
        .filter(|w| w.is_valid() && keep(w))
        .collect();
    words.sort_by_key(|w| (w.y0, w.x0));
    words
}

fn pick<T>(candidates: &[T], index: usize) -> Option<&T> {
    if candidates.is_empty() {
        None
    } else {
        candidates.get(index % candidates.len())
    }
}

/// Word whose normalized text equals the matched text.
pub struct ExactWordStrategy;

impl CoordinateStrategy for ExactWordStrategy {
    fn method(&self) -> CoordinateMethod {
        CoordinateMethod::ExactWord
    }

    fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates> {
        let target = normalize_token(site.match_text);
        if target.is_empty() {
            return None;
        }
        let candidates = sorted_words(site.page, |w| normalize_token(&w.text) == target);
        let word = pick(&candidates, site.index_on_page)?;
        Some(box_coordinates(word, site.raster, self.method(), 0.95))
    }
}

/// Word containing the matched text, or contained in it.
pub struct PartialWordStrategy;

impl PartialWordStrategy {
    /// Words shorter than this are too common to anchor a multi-word match.
    const MIN_CONTAINED_LEN: usize = 2;
}

impl CoordinateStrategy for PartialWordStrategy {
    fn method(&self) -> CoordinateMethod {
        CoordinateMethod::PartialWord
    }

    fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates> {
        let target = site.match_text.trim().to_lowercase();
        if target.is_empty() {
            return None;
        }
        let candidates = sorted_words(site.page, |w| {
            let word = normalize_token(&w.text);
            if word.is_empty() {
                return false;
            }
            word.contains(&target)
                || (word.chars().count() >= Self::MIN_CONTAINED_LEN && target.contains(&word))
        });
        let word = pick(&candidates, site.index_on_page)?;
        Some(box_coordinates(word, site.raster, self.method(), 0.8))
    }
}

/// Line containing the matched text, narrowed to its share of the line.
pub struct LineStrategy;

impl CoordinateStrategy for LineStrategy {
    fn method(&self) -> CoordinateMethod {
        CoordinateMethod::Line
    }

    fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates> {
        let target = site.match_text.trim().to_lowercase();
        if target.is_empty() {
            return None;
        }
        let mut candidates: Vec<(&TextBox, usize)> = site
            .page
            .lines
            .iter()
            .filter(|l| l.is_valid())
            .filter_map(|l| {
                let lowered = l.text.to_lowercase();
                lowered
                    .find(&target)
                    .map(|at| (l, lowered[..at].chars().count()))
            })
            .collect();
        candidates.sort_by_key(|(l, _)| (l.y0, l.x0));

        let (line, chars_before) = pick(&candidates, site.index_on_page)?;
        let line_chars = line.text.chars().count().max(1) as f64;
        let char_width = line.width() as f64 / line_chars;
        let x = line.x0 as f64 + *chars_before as f64 * char_width;
        let width = target.chars().count() as f64 * char_width;

        Some(bounded_box(
            x.round() as i64,
            line.y0 as i64,
            width.round() as i64,
            line.height() as i64,
            site.raster,
            self.method(),
            0.7,
        ))
    }
}

/// Any recognized word on the page, offset so repeats do not overlap.
pub struct ReferenceWordStrategy;

impl CoordinateStrategy for ReferenceWordStrategy {
    fn method(&self) -> CoordinateMethod {
        CoordinateMethod::Reference
    }

    fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates> {
        let words: Vec<&TextBox> = site
            .page
            .words
            .iter()
            .filter(|w| w.is_valid())
            .take(REFERENCE_WORD_LIMIT)
            .collect();
        let word = pick(&words, site.index_on_page)?;

        let dx = (site.index_on_page % 4) as i64 * 15;
        let dy = dx / 3;
        let mut coordinates = bounded_box(
            word.x0 as i64 + dx,
            word.y0 as i64 + dy,
            word.width() as i64,
            word.height() as i64,
            site.raster,
            self.method(),
            0.4,
        );
        coordinates.reference_word = Some(word.text.clone());
        Some(coordinates)
    }
}

/// Position estimated from where the match sits in the page text.
pub struct TextLayoutStrategy;

impl TextLayoutStrategy {
    fn locate(site: &MatchSite<'_>) -> Option<usize> {
        let text = &site.page.text;
        match site.page_offset {
            Some(offset) if offset <= text.len() && text.is_char_boundary(offset) => Some(offset),
            _ => text.to_lowercase().find(&site.match_text.to_lowercase()).filter(|at| {
                // Lowercasing can shift byte offsets; only trust aligned hits.
                text.is_char_boundary(*at)
            }),
        }
    }
}

impl CoordinateStrategy for TextLayoutStrategy {
    fn method(&self) -> CoordinateMethod {
        CoordinateMethod::RealTextBased
    }

    fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates> {
        let text = &site.page.text;
        if text.trim().is_empty() {
            return None;
        }
        let offset = Self::locate(site)?;

        let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = text[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(text.len());
        let line_number = text[..line_start].matches('\n').count();
        let line_count = text.lines().count();
        let line_len = text[line_start..line_end].chars().count();
        let chars_before = text[line_start..offset].chars().count();

        let area_width = site.raster.width.saturating_sub(2 * PAGE_MARGIN_X).max(1) as f64;
        let area_height = site.raster.height.saturating_sub(2 * PAGE_MARGIN_Y).max(1) as f64;
        let line_height = (area_height / line_count.max(20) as f64).clamp(20.0, 40.0);
        let char_width = area_width / line_len.max(50) as f64;

        let jitter = ((site.index_on_page * 3) % 10) as f64;
        let x = PAGE_MARGIN_X as f64 + chars_before as f64 * char_width + jitter;
        let y = PAGE_MARGIN_Y as f64 + line_number as f64 * line_height + jitter;
        let width = site.match_text.chars().count() as f64 * char_width;

        Some(bounded_box(
            x.round() as i64,
            y.round() as i64,
            width.round() as i64,
            line_height.round() as i64,
            site.raster,
            self.method(),
            0.5,
        ))
    }
}

/// Fabricated position from the match's relative place in the document.
///
/// Used when the page has no usable text at all. The result is always
/// tagged as synthetic and carries a low confidence.
pub struct SyntheticStrategy;

impl SyntheticStrategy {
    const GRID_COLUMNS: u32 = 3;
    const GRID_ROWS: u32 = 25;
    const FLOWING_LINES: u32 = 35;
    const X_PRIME: usize = 17;
    const Y_PRIME: usize = 23;
}

impl CoordinateStrategy for SyntheticStrategy {
    fn method(&self) -> CoordinateMethod {
        CoordinateMethod::FlowingText
    }

    fn resolve(&self, site: &MatchSite<'_>) -> Option<Coordinates> {
        let relative = if site.shape.char_len == 0 {
            0.0
        } else {
            (site.document_char_index as f64 / site.shape.char_len as f64).clamp(0.0, 1.0)
        };
        let area_width = site.raster.width.saturating_sub(2 * PAGE_MARGIN_X).max(1);
        let area_height = site.raster.height.saturating_sub(2 * PAGE_MARGIN_Y).max(1);
        let width = (site.match_text.chars().count() as u32 * 8).max(MIN_BOX_WIDTH);
        let index = site.match_index;

        if site.shape.is_structured() {
            let cells = Self::GRID_COLUMNS * Self::GRID_ROWS;
            let cell = ((relative * cells as f64) as u32).min(cells - 1);
            let column_width = area_width / Self::GRID_COLUMNS;
            let row_height = area_height / Self::GRID_ROWS;
            let x = PAGE_MARGIN_X
                + (cell % Self::GRID_COLUMNS) * column_width
                + ((index * Self::X_PRIME) % 40) as u32;
            let y = PAGE_MARGIN_Y
                + (cell / Self::GRID_COLUMNS) * row_height
                + ((index * Self::Y_PRIME) % 15) as u32;
            Some(bounded_box(
                x as i64,
                y as i64,
                width as i64,
                row_height as i64,
                site.raster,
                CoordinateMethod::StructuredGrid,
                0.6,
            ))
        } else {
            let line = ((relative * Self::FLOWING_LINES as f64) as u32).min(Self::FLOWING_LINES - 1);
            let line_height = area_height / Self::FLOWING_LINES;
            let span = area_width.saturating_sub(width).max(1) as usize;
            let x = PAGE_MARGIN_X + ((index * Self::X_PRIME * 7) % span) as u32;
            let y = PAGE_MARGIN_Y + line * line_height + ((index * Self::Y_PRIME) % 10) as u32;
            Some(bounded_box(
                x as i64,
                y as i64,
                width as i64,
                line_height as i64,
                site.raster,
                CoordinateMethod::FlowingText,
                0.65,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: u32, y: u32) -> TextBox {
        TextBox::new(text, (x, y, x + 60, y + 20), 90.0)
    }

    fn site<'a>(page: &'a PageText, match_text: &'a str, index_on_page: usize) -> MatchSite<'a> {
        MatchSite {
            page,
            match_text,
            page_offset: None,
            index_on_page,
            match_index: index_on_page,
            document_char_index: 0,
            shape: DocumentShape::of(&page.text),
            raster: RasterSize::OCR,
        }
    }

    fn assert_within_raster(c: &Coordinates) {
        assert!(c.x + c.width <= c.image_width, "{:?}", c);
        assert!(c.y + c.height <= c.image_height, "{:?}", c);
        assert!(c.width >= MIN_BOX_WIDTH.min(c.image_width));
        assert!(c.width <= MAX_BOX_WIDTH);
    }

    #[test]
    fn test_exact_word_preferred_and_cycles_in_reading_order() {
        let page = PageText::new(1, "caiet de sarcini caiet").with_words(vec![
            word("caiet,", 300, 200),
            word("caietul", 40, 40),
            word("Caiet", 100, 100),
        ]);
        let resolver = CoordinateResolver::standard();

        let first = resolver.resolve(&site(&page, "caiet", 0)).unwrap();
        let second = resolver.resolve(&site(&page, "caiet", 1)).unwrap();
        assert_eq!(first.method, CoordinateMethod::ExactWord);
        assert_eq!(second.method, CoordinateMethod::ExactWord);
        assert_eq!(first.origin(), (100, 100));
        assert_eq!(second.origin(), (300, 200));

        let third = resolver.resolve(&site(&page, "caiet", 2)).unwrap();
        assert_eq!(third.origin(), first.origin());
    }

    #[test]
    fn test_partial_word_when_no_exact() {
        let page = PageText::new(1, "caietul").with_words(vec![word("caietul", 40, 40)]);
        let c = CoordinateResolver::standard()
            .resolve(&site(&page, "caiet", 0))
            .unwrap();
        assert_eq!(c.method, CoordinateMethod::PartialWord);
        assert_eq!(c.origin(), (40, 40));
    }

    #[test]
    fn test_line_tier_narrows_to_match() {
        let line = TextBox::new("Anexa caiet", (100, 300, 210, 320), 80.0);
        let page = PageText::new(2, "Anexa caiet").with_lines(vec![line]);
        let c = CoordinateResolver::standard()
            .resolve(&site(&page, "caiet", 0))
            .unwrap();
        assert_eq!(c.method, CoordinateMethod::Line);
        // 11 chars over 110px, match starts after 6 chars.
        assert_eq!(c.x, 160);
        assert_eq!(c.y, 300);
        assert_eq!(c.width, MIN_BOX_WIDTH.max(50));
    }

    #[test]
    fn test_reference_tier_jitters_and_records_word() {
        let page = PageText::new(1, "alte cuvinte").with_words(vec![
            word("alte", 100, 100),
            word("cuvinte", 200, 100),
        ]);
        let resolver = CoordinateResolver::standard();
        let a = resolver.resolve(&site(&page, "sarcini", 0)).unwrap();
        let b = resolver.resolve(&site(&page, "sarcini", 2)).unwrap();
        assert_eq!(a.method, CoordinateMethod::Reference);
        assert_eq!(a.reference_word.as_deref(), Some("alte"));
        assert_eq!(a.origin(), (100, 100));
        assert_eq!(b.reference_word.as_deref(), Some("alte"));
        assert_eq!(b.origin(), (130, 110));
        assert!(a.confidence < 0.5);
    }

    #[test]
    fn test_text_layout_tier_without_geometry() {
        let text = "Titlu\nprima linie\nvezi caiet aici";
        let page = PageText::new(1, text);
        let mut s = site(&page, "caiet", 0);
        s.page_offset = text.find("caiet");
        let c = CoordinateResolver::standard().resolve(&s).unwrap();
        assert_eq!(c.method, CoordinateMethod::RealTextBased);
        // 500px area over max(15, 50) chars = 10px per char; 680px over 20 lines = 34px.
        assert_eq!(c.x, PAGE_MARGIN_X + 5 * 10);
        assert_eq!(c.y, PAGE_MARGIN_Y + 2 * 34);
        assert_eq!((c.image_width, c.image_height), (600, 800));
    }

    #[test]
    fn test_synthetic_tier_for_empty_page() {
        let page = PageText::new(3, "");
        let mut s = site(&page, "caiet", 4);
        s.shape = DocumentShape {
            avg_words_per_line: 3.0,
            char_len: 1000,
        };
        s.document_char_index = 500;
        let c = CoordinateResolver::standard().resolve(&s).unwrap();
        assert_eq!(c.method, CoordinateMethod::StructuredGrid);
        assert!(c.confidence >= 0.6 && c.confidence <= 0.7);

        s.shape.avg_words_per_line = 12.0;
        let flowing = CoordinateResolver::standard().resolve(&s).unwrap();
        assert_eq!(flowing.method, CoordinateMethod::FlowingText);
        assert_within_raster(&flowing);
    }

    #[test]
    fn test_synthetic_boxes_vary_by_index() {
        let page = PageText::new(1, "");
        let mut a = site(&page, "caiet", 0);
        a.shape = DocumentShape {
            avg_words_per_line: 12.0,
            char_len: 100,
        };
        let mut b = a;
        b.match_index = 1;
        let strategy = SyntheticStrategy;
        assert_ne!(
            strategy.resolve(&a).unwrap().origin(),
            strategy.resolve(&b).unwrap().origin()
        );
    }

    #[test]
    fn test_bounded_box_clamps_everything() {
        let c = bounded_box(
            590,
            795,
            1000,
            5,
            RasterSize::OCR,
            CoordinateMethod::Line,
            3.0,
        );
        assert_eq!(c.width, MAX_BOX_WIDTH);
        assert_eq!(c.height, MIN_BOX_HEIGHT);
        assert_within_raster(&c);
        assert_eq!(c.confidence, 1.0);

        let negative = bounded_box(-20, -5, 0, 0, RasterSize::OCR, CoordinateMethod::Line, 0.5);
        assert_eq!(negative.origin(), (0, 0));
        assert_eq!(negative.width, MIN_BOX_WIDTH);
    }

    #[test]
    fn test_tiny_raster_still_bounded() {
        let c = bounded_box(5, 5, 100, 100, RasterSize::new(10, 10), CoordinateMethod::Line, 0.5);
        assert_eq!((c.width, c.height), (10, 10));
        assert_eq!(c.origin(), (0, 0));
    }

    #[test]
    fn test_document_shape() {
        let shape = DocumentShape::of("Nume: Ion\nData: azi\n\nSuma: 5");
        assert_eq!(shape.avg_words_per_line, 2.0);
        assert!(shape.is_structured());
        assert!(!DocumentShape::of(&"cuvant ".repeat(12)).is_structured());
    }

    #[test]
    fn test_standard_chain_order() {
        assert_eq!(
            CoordinateResolver::standard().methods(),
            vec![
                CoordinateMethod::ExactWord,
                CoordinateMethod::PartialWord,
                CoordinateMethod::Line,
                CoordinateMethod::Reference,
                CoordinateMethod::RealTextBased,
                CoordinateMethod::FlowingText,
            ]
        );
    }
}
