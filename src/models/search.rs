//! Search result models.

use serde::{Deserialize, Serialize};

use super::RasterSize;

/// How a highlight box was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinateMethod {
    /// A recognized word equal to the query.
    ExactWord,
    /// A recognized word containing, or contained in, the query.
    PartialWord,
    /// A recognized line containing the query.
    Line,
    /// Some recognized word on the page, offset by a small jitter.
    Reference,
    /// Synthetic grid placement for short-line documents.
    StructuredGrid,
    /// Synthetic line placement for prose-like documents.
    FlowingText,
    /// Estimated from the page text layout.
    RealTextBased,
}

impl CoordinateMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactWord => "EXACT_WORD",
            Self::PartialWord => "PARTIAL_WORD",
            Self::Line => "LINE",
            Self::Reference => "REFERENCE",
            Self::StructuredGrid => "STRUCTURED_GRID",
            Self::FlowingText => "FLOWING_TEXT",
            Self::RealTextBased => "REAL_TEXT_BASED",
        }
    }

    /// Whether the box was derived from engine geometry rather than fabricated.
    pub fn is_engine_derived(&self) -> bool {
        matches!(
            self,
            Self::ExactWord | Self::PartialWord | Self::Line | Self::Reference
        )
    }
}

impl std::fmt::Display for CoordinateMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A highlight rectangle expressed in the raster space of its page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub method: CoordinateMethod,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Word used as anchor by the reference tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_word: Option<String>,
}

impl Coordinates {
    pub fn raster(&self) -> RasterSize {
        RasterSize {
            width: self.image_width,
            height: self.image_height,
        }
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}

/// One occurrence of the query in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOccurrence {
    /// 0-based, in order of first appearance in the aggregated text.
    pub match_index: usize,
    pub page_number: u32,
    /// The matched substring, verbatim.
    pub match_text: String,
    pub context: String,
    /// Always `None` for text-native documents.
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "isOCR")]
    pub is_ocr: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serializes_as_tag() {
        let json = serde_json::to_string(&CoordinateMethod::RealTextBased).unwrap();
        assert_eq!(json, "\"REAL_TEXT_BASED\"");
        assert_eq!(CoordinateMethod::ExactWord.to_string(), "EXACT_WORD");
    }

    #[test]
    fn test_occurrence_wire_names() {
        let occurrence = MatchOccurrence {
            match_index: 0,
            page_number: 2,
            match_text: "caiet".to_string(),
            context: "caiet de sarcini".to_string(),
            coordinates: None,
            is_ocr: false,
        };
        let value = serde_json::to_value(&occurrence).unwrap();
        assert_eq!(value["matchIndex"], 0);
        assert_eq!(value["pageNumber"], 2);
        assert_eq!(value["isOCR"], false);
        assert!(value["coordinates"].is_null());
    }

    #[test]
    fn test_synthetic_methods_are_not_engine_derived() {
        assert!(CoordinateMethod::Reference.is_engine_derived());
        assert!(!CoordinateMethod::StructuredGrid.is_engine_derived());
        assert!(!CoordinateMethod::RealTextBased.is_engine_derived());
    }
}
