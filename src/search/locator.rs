//! Finding query occurrences and attributing them to pages.

use regex::{Regex, RegexBuilder};

use crate::models::PageText;

/// Characters of context kept on each side of a match.
pub const CONTEXT_RADIUS: usize = 50;

/// How the search query is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// Matched verbatim, ignoring case.
    #[default]
    Literal,
    /// Interpreted as a regular expression, ignoring case.
    Regex,
}

/// Compile the query into a case-insensitive matcher.
pub fn build_matcher(query: &str, mode: QueryMode) -> Result<Regex, regex::Error> {
    let pattern = match mode {
        QueryMode::Literal => regex::escape(query),
        QueryMode::Regex => query.to_string(),
    };
    RegexBuilder::new(&pattern).case_insensitive(true).build()
}

/// A raw occurrence in the searched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    /// Byte offset of the match start.
    pub start: usize,
    /// Byte offset just past the match.
    pub end: usize,
    /// Character offset of the match start.
    pub char_index: usize,
    pub matched_text: String,
}

/// All non-empty matches, in order of appearance.
pub fn find_matches(matcher: &Regex, text: &str) -> Vec<RawMatch> {
    let mut chars_seen = 0;
    let mut last_byte = 0;

    matcher
        .find_iter(text)
        .filter(|m| !m.as_str().is_empty())
        .map(|m| {
            chars_seen += text[last_byte..m.start()].chars().count();
            last_byte = m.start();
            RawMatch {
                start: m.start(),
                end: m.end(),
                char_index: chars_seen,
                matched_text: m.as_str().to_string(),
            }
        })
        .collect()
}

/// Surrounding text for a match with newlines collapsed to single spaces.
pub fn context_window(text: &str, start: usize, end: usize) -> String {
    let before_start = text[..start]
        .char_indices()
        .rev()
        .take(CONTEXT_RADIUS)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let after_end = text[end..]
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    let mut context = String::with_capacity(after_end - before_start);
    let mut in_break = false;
    for c in text[before_start..after_end].chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                context.push(' ');
            }
            in_break = true;
        } else {
            context.push(c);
            in_break = false;
        }
    }
    context.trim().to_string()
}

/// Byte span of one page inside the aggregated OCR text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub page_number: u32,
    pub offset: usize,
    pub len: usize,
}

impl PageSpan {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.offset && index < self.offset + self.len
    }
}

/// Page texts joined in page order with one space between pages.
#[derive(Debug, Clone, Default)]
pub struct AggregatedText {
    pub text: String,
    pub spans: Vec<PageSpan>,
}

impl AggregatedText {
    pub fn from_pages(pages: &[PageText]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            spans.push(PageSpan {
                page_number: page.page_number,
                offset: text.len(),
                len: page.text.len(),
            });
            text.push_str(&page.text);
        }
        Self { text, spans }
    }

    /// Span of the first page containing `index`.
    ///
    /// A match starting on an inter-page separator belongs to the page
    /// before it.
    pub fn span_for(&self, index: usize) -> Option<&PageSpan> {
        self.spans
            .iter()
            .find(|span| span.contains(index))
            .or_else(|| self.spans.iter().rev().find(|span| span.offset <= index))
    }
}

/// Estimate the page of a match in text that has no page boundaries.
///
/// Proportional to the match's position in the whole text; this is an
/// approximation and may be off by a page or more on uneven documents.
pub fn estimate_page(char_index: usize, text_char_len: usize, page_count: u32) -> u32 {
    if text_char_len == 0 || page_count == 0 {
        return 1;
    }
    let ratio = char_index as f64 / text_char_len as f64;
    let page = (ratio * page_count as f64).ceil() as u32;
    page.clamp(1, page_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "This is caiet de sarcini for the project caiet again.";

    #[test]
    fn test_finds_every_occurrence_in_order() {
        let matcher = build_matcher("caiet", QueryMode::Literal).unwrap();
        let matches = find_matches(&matcher, SAMPLE);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.matched_text == "caiet"));
        assert!(matches[0].start < matches[1].start);
        assert_eq!(matches[0].char_index, 8);
    }

    #[test]
    fn test_context_does_not_bleed_past_end() {
        let matcher = build_matcher("caiet", QueryMode::Literal).unwrap();
        let matches = find_matches(&matcher, SAMPLE);
        let second = &matches[1];
        let context = context_window(SAMPLE, second.start, second.end);
        assert!(context.ends_with("caiet again."));
        assert!(SAMPLE.contains(&context));
    }

    #[test]
    fn test_matching_ignores_case_and_keeps_verbatim_text() {
        let matcher = build_matcher("CAIET", QueryMode::Literal).unwrap();
        let matches = find_matches(&matcher, "Caiet de sarcini");
        assert_eq!(matches[0].matched_text, "Caiet");
    }

    #[test]
    fn test_literal_mode_escapes_metacharacters() {
        let matcher = build_matcher("art. 5(1)", QueryMode::Literal).unwrap();
        assert_eq!(find_matches(&matcher, "conform art. 5(1) din lege").len(), 1);
        assert!(find_matches(&matcher, "conform art5 1").is_empty());
    }

    #[test]
    fn test_regex_mode() {
        let matcher = build_matcher(r"lot\s+\d+", QueryMode::Regex).unwrap();
        let matches = find_matches(&matcher, "Lot 1 si LOT  22");
        let found: Vec<_> = matches.iter().map(|m| m.matched_text.as_str()).collect();
        assert_eq!(found, vec!["Lot 1", "LOT  22"]);
        assert!(build_matcher("(unclosed", QueryMode::Regex).is_err());
    }

    #[test]
    fn test_empty_matches_are_skipped() {
        let matcher = build_matcher("x*", QueryMode::Regex).unwrap();
        let matches = find_matches(&matcher, "abxxc");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched_text, "xx");
    }

    #[test]
    fn test_char_index_with_multibyte_text() {
        let matcher = build_matcher("sarcini", QueryMode::Literal).unwrap();
        let text = "țară ăâî sarcini și sarcini";
        let matches = find_matches(&matcher, text);
        assert_eq!(matches[0].char_index, 9);
        assert_eq!(matches[1].char_index, 20);
    }

    #[test]
    fn test_context_collapses_newlines_and_respects_char_boundaries() {
        let text = format!("{}\n\ncaiet\nde sarcini", "ș".repeat(80));
        let start = text.find("caiet").unwrap();
        let context = context_window(&text, start, start + "caiet".len());
        assert!(context.contains(" caiet de sarcini"));
        assert!(!context.contains('\n'));
        assert_eq!(context.chars().filter(|c| *c == 'ș').count(), 48);
    }

    #[test]
    fn test_aggregation_and_page_attribution() {
        let pages = vec![
            PageText::new(1, "first page"),
            PageText::new(2, "second caiet"),
            PageText::new(4, "caiet four"),
        ];
        let aggregated = AggregatedText::from_pages(&pages);
        assert_eq!(aggregated.text, "first page second caiet caiet four");

        let matcher = build_matcher("caiet", QueryMode::Literal).unwrap();
        let pages_found: Vec<u32> = find_matches(&matcher, &aggregated.text)
            .iter()
            .filter_map(|m| aggregated.span_for(m.start).map(|s| s.page_number))
            .collect();
        assert_eq!(pages_found, vec![2, 4]);
    }

    #[test]
    fn test_separator_belongs_to_previous_page() {
        let pages = vec![PageText::new(1, "ab"), PageText::new(2, "cd")];
        let aggregated = AggregatedText::from_pages(&pages);
        assert_eq!(aggregated.span_for(2).map(|s| s.page_number), Some(1));
    }

    #[test]
    fn test_estimate_page() {
        assert_eq!(estimate_page(0, 1000, 5), 1);
        assert_eq!(estimate_page(500, 1000, 5), 3);
        assert_eq!(estimate_page(999, 1000, 5), 5);
        assert_eq!(estimate_page(10, 0, 5), 1);
        assert_eq!(estimate_page(10, 100, 0), 1);
    }
}
