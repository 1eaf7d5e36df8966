//! Rule-based field extractors for receipt text.

pub mod amounts;
pub mod dates;
pub mod merchant;

pub use amounts::{AmountExtractor, parse_receipt_amount};
pub use dates::{DateExtractor, parse_year};
pub use merchant::MerchantExtractor;

use serde::Serialize;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the first occurrence of the field. Earlier lines win.
    fn extract(&self, text: &str) -> Option<HintMatch<Self::Output>> {
        self.extract_all(text).into_iter().next()
    }

    /// Extract all occurrences of the field, in line order.
    fn extract_all(&self, text: &str) -> Vec<HintMatch<Self::Output>>;
}

/// A heuristic hit with its confidence and origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// 1-based line in the source text.
    pub line: usize,
    /// Source text that was matched.
    pub source: String,
}

impl<T> HintMatch<T> {
    pub fn new(value: T, confidence: f32, line: usize, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            line,
            source: source.into(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> HintMatch<U> {
        HintMatch {
            value: f(self.value),
            confidence: self.confidence,
            line: self.line,
            source: self.source,
        }
    }
}

/// Trimmed, non-empty lines with their 1-based position.
pub(crate) fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}
