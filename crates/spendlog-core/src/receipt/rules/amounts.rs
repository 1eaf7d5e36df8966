//! Amount extraction for receipts.

use crate::receipt::patterns::AMOUNT_LINE;
use super::{FieldExtractor, HintMatch, numbered_lines};

/// Labeled amount extractor ("TOTAL: $23.45").
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = f64;

    fn extract_all(&self, text: &str) -> Vec<HintMatch<f64>> {
        let mut results = Vec::new();

        for (line_no, line) in numbered_lines(text) {
            let Some(caps) = AMOUNT_LINE.captures(line) else {
                continue;
            };
            if let Some(amount) = parse_receipt_amount(&caps[1]) {
                results.push(HintMatch::new(amount, 0.9, line_no, &caps[0]));
            }
        }

        results
    }
}

/// Parse a receipt amount token. Thousands separators and stray spaces are removed.
pub fn parse_receipt_amount(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite() && *a > 0.0)
}
