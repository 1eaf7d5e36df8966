//! Date extraction for receipts.

use chrono::NaiveDate;

use crate::receipt::patterns::{DATE_DMY, DATE_YMD};
use super::{FieldExtractor, HintMatch, numbered_lines};
use crate::import::validator::{day_first, month_first};

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = NaiveDate;

    fn extract_all(&self, text: &str) -> Vec<HintMatch<NaiveDate>> {
        let mut results = Vec::new();

        for (line_no, line) in numbered_lines(text) {
            // (start, end, date, source) for every valid date on the line
            let mut found: Vec<(usize, usize, NaiveDate, &str)> = Vec::new();

            for caps in DATE_YMD.captures_iter(line) {
                let year: i32 = caps[1].parse().unwrap_or(0);
                let month: u32 = caps[2].parse().unwrap_or(0);
                let day: u32 = caps[3].parse().unwrap_or(0);

                if let (Some(m), Some(date)) =
                    (caps.get(0), NaiveDate::from_ymd_opt(year, month, day))
                {
                    found.push((m.start(), m.end(), date, m.as_str()));
                }
            }

            // DD/MM/YYYY, falling back to MM/DD/YYYY
            for caps in DATE_DMY.captures_iter(line) {
                let Some(m) = caps.get(0) else { continue };
                // never read part of a year-first date as a day
                if found.iter().any(|(s, e, _, _)| m.start() < *e && *s < m.end()) {
                    continue;
                }
                let a: u32 = caps[1].parse().unwrap_or(0);
                let b: u32 = caps[2].parse().unwrap_or(0);
                let year = parse_year(&caps[3]);

                if let Some(date) = day_first(year, a, b).or_else(|| month_first(year, a, b)) {
                    found.push((m.start(), m.end(), date, m.as_str()));
                }
            }

            found.sort_by_key(|(start, ..)| *start);
            results.extend(
                found
                    .into_iter()
                    .map(|(_, _, date, source)| HintMatch::new(date, 0.9, line_no, source)),
            );
        }

        results
    }
}

/// Expand a two-digit year: 00-50 are 2000s, 51-99 are 1900s.
pub fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 {
        if year <= 50 { 2000 + year } else { 1900 + year }
    } else {
        year
    }
}
