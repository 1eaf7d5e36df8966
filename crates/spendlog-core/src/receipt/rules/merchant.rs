//! Merchant name extraction from the receipt header.

use crate::receipt::patterns::{CURRENCY_SYMBOL, NON_MERCHANT_WORDS, STORE_NAME};
use super::{FieldExtractor, HintMatch};

/// Only the top of the receipt is searched.
const HEADER_LINES: usize = 5;

/// Merchant name extractor. Yields the bare name, e.g. `"WALMART"`.
pub struct MerchantExtractor {
    header_lines: usize,
}

impl MerchantExtractor {
    pub fn new() -> Self {
        Self {
            header_lines: HEADER_LINES,
        }
    }

    /// Search `lines` lines from the top instead of the default five.
    pub fn with_header_lines(mut self, lines: usize) -> Self {
        self.header_lines = lines;
        self
    }

    fn match_line(line: &str) -> Option<(String, f32)> {
        if let Some(caps) = STORE_NAME.captures(line) {
            return Some((caps[1].trim().to_string(), 0.8));
        }
        if looks_like_business_name(line) {
            return Some((line.to_string(), 0.5));
        }
        None
    }
}

impl Default for MerchantExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for MerchantExtractor {
    type Output = String;

    fn extract_all(&self, text: &str) -> Vec<HintMatch<String>> {
        // blank lines count toward the header window
        text.lines()
            .take(self.header_lines)
            .enumerate()
            .filter_map(|(i, raw)| {
                let line = raw.trim();
                if line.is_empty() {
                    return None;
                }
                Self::match_line(line)
                    .map(|(name, confidence)| HintMatch::new(name, confidence, i + 1, line))
            })
            .collect()
    }
}

/// Upper-case line of 4 to 49 characters with no digits, currency or total keywords.
fn looks_like_business_name(line: &str) -> bool {
    let len = line.chars().count();
    (4..50).contains(&len)
        && line.chars().any(char::is_alphabetic)
        && line == line.to_uppercase()
        && !line.chars().any(|c| c.is_ascii_digit())
        && !CURRENCY_SYMBOL.is_match(line)
        && !NON_MERCHANT_WORDS.is_match(line)
}
