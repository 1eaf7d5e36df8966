//! Conversion of mapped rows into validated expense records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MappingError, RejectionReason};
use crate::import::mapping::{ColumnMapping, FieldKey};
use crate::import::tabular::RawRow;
use crate::models::expense::{Category, ExpenseRecord, match_category};

lazy_static! {
    static ref NUMERIC_DATE: Regex =
        Regex::new(r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4})$").unwrap();
}

/// Policy for rows whose date column is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateParsingMode {
    /// Reject the row with `MissingDate`.
    Strict,
    /// Use the current time.
    #[default]
    Lenient,
}

/// Field values of one row, after projection through a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedRow<'r> {
    pub amount: Option<&'r str>,
    pub description: Option<&'r str>,
    pub category: Option<&'r str>,
    pub date: Option<&'r str>,
    pub notes: Option<&'r str>,
}

impl<'r> ProjectedRow<'r> {
    /// Collect each field from its mapped columns. When several columns feed
    /// one field, the first non-blank cell wins.
    pub fn project(row: &'r RawRow, mapping: &ColumnMapping) -> Self {
        let mut projected = Self::default();

        for (header, value) in row.iter() {
            if value.trim().is_empty() {
                continue;
            }
            let Some(assignment) = mapping.get(header) else {
                continue;
            };
            let slot = match assignment.field {
                FieldKey::Amount => &mut projected.amount,
                FieldKey::Description => &mut projected.description,
                FieldKey::Category => &mut projected.category,
                FieldKey::Date => &mut projected.date,
                FieldKey::Notes => &mut projected.notes,
                FieldKey::Ignore => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        projected
    }
}

/// Records and rejections from validating many rows.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub records: Vec<ExpenseRecord>,
    /// Source row index of each entry in `records`.
    pub source_rows: Vec<usize>,
    pub rejections: Vec<RejectionReason>,
}

/// Validates rows against a complete mapping and a category snapshot.
#[derive(Debug, Clone)]
pub struct RowValidator<'a> {
    mapping: &'a ColumnMapping,
    categories: &'a [Category],
    mode: DateParsingMode,
    now: DateTime<Utc>,
}

impl<'a> RowValidator<'a> {
    /// Refuses mappings that lack a required field, whatever their confidence.
    pub fn new(
        mapping: &'a ColumnMapping,
        categories: &'a [Category],
        mode: DateParsingMode,
    ) -> Result<Self, MappingError> {
        mapping.ensure_complete()?;
        Ok(Self {
            mapping,
            categories,
            mode,
            now: Utc::now(),
        })
    }

    /// Fix the timestamp used for rows without a date in lenient mode.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn validate(&self, row: &RawRow) -> Result<ExpenseRecord, RejectionReason> {
        let index = row.index();
        let fields = ProjectedRow::project(row, self.mapping);

        let raw_amount = fields.amount.unwrap_or("");
        let amount = parse_amount(raw_amount).ok_or_else(|| RejectionReason::InvalidAmount {
            row: index,
            value: raw_amount.to_string(),
        })?;

        let description = fields
            .description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(RejectionReason::MissingDescription { row: index })?;

        let category_id = fields.category.and_then(|text| {
            let matched = match_category(self.categories, text);
            if matched.is_none() {
                debug!("Row {}: no category named \"{}\"", index, text.trim());
            }
            matched.map(|c| c.id.clone())
        });

        let created_at = match fields.date {
            Some(text) => parse_date(text).ok_or_else(|| RejectionReason::InvalidDate {
                row: index,
                value: text.to_string(),
            })?,
            None => match self.mode {
                DateParsingMode::Strict => {
                    return Err(RejectionReason::MissingDate { row: index });
                }
                DateParsingMode::Lenient => self.now,
            },
        };

        let notes = fields.notes.map(str::trim).unwrap_or("").to_string();

        Ok(ExpenseRecord::new(
            amount,
            description.to_string(),
            category_id,
            notes,
            created_at,
        ))
    }

    /// Validate every row, collecting rejections instead of stopping.
    pub fn validate_all(&self, rows: &[RawRow]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for row in rows {
            match self.validate(row) {
                Ok(record) => {
                    report.records.push(record);
                    report.source_rows.push(row.index());
                }
                Err(reason) => {
                    warn!("{}", reason);
                    report.rejections.push(reason);
                }
            }
        }
        info!(
            "Validated {} rows: {} accepted, {} rejected",
            rows.len(),
            report.records.len(),
            report.rejections.len()
        );
        report
    }
}

/// Parse a positive, finite amount. Currency symbols and thousands separators are ignored.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | '₹') && !c.is_whitespace())
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite() && *a > 0.0)
}

/// Parse date text: ISO forms first, then day-first, then month-first numeric dates.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    parse_iso(text).or_else(|| {
        let (a, b, year) = split_numeric_date(text)?;
        let date = day_first(year, a, b).or_else(|| month_first(year, a, b))?;
        Some(midnight_utc(date))
    })
}

fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(midnight_utc(date));
        }
    }
    None
}

fn split_numeric_date(text: &str) -> Option<(u32, u32, i32)> {
    let caps = NUMERIC_DATE.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?))
}

/// `a` is the day, `b` the month.
pub(crate) fn day_first(year: i32, a: u32, b: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, b, a)
}

/// `a` is the month, `b` the day.
pub(crate) fn month_first(year: i32, a: u32, b: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, a, b)
}

pub(crate) fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::mapping::ColumnMapper;
    use crate::import::tabular::{FileKind, TabularParser};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn rows(csv: &str) -> (ColumnMapping, Vec<RawRow>) {
        let table = TabularParser::new().parse(csv.as_bytes(), FileKind::Csv).unwrap();
        let mapping = ColumnMapper::new().infer_mapping(table.headers());
        (mapping, table.into_rows())
    }

    fn categories() -> Vec<Category> {
        vec![Category::new("cat-food", "Food")]
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_non_numeric_amount() {
        let (mapping, rows) = rows("amount,description\nabc,x\n");
        let cats = categories();
        let validator = RowValidator::new(&mapping, &cats, DateParsingMode::Lenient).unwrap();
        assert_eq!(
            validator.validate(&rows[0]),
            Err(RejectionReason::InvalidAmount { row: 1, value: "abc".into() })
        );
    }

    #[test]
    fn test_rejects_zero_and_negative_amounts() {
        let (mapping, rows) = rows("amount,description\n0,x\n-5,y\n,z\n");
        let cats = categories();
        let validator = RowValidator::new(&mapping, &cats, DateParsingMode::Lenient).unwrap();
        let report = validator.validate_all(&rows);
        assert!(report.records.is_empty());
        assert_eq!(
            report.rejections.iter().map(|r| r.row()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_report_keeps_source_rows_of_records() {
        let (mapping, rows) = rows("amount,description\n5,Tea\nabc,Cake\n7,Bus\n");
        let cats = categories();
        let validator = RowValidator::new(&mapping, &cats, DateParsingMode::Lenient).unwrap();
        let report = validator.validate_all(&rows);

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.source_rows, vec![1, 3]);
    }

    #[test]
    fn test_rejects_empty_description() {
        let (mapping, rows) = rows("amount,description\n10,\"  \"\n");
        let cats = categories();
        let validator = RowValidator::new(&mapping, &cats, DateParsingMode::Lenient).unwrap();
        assert_eq!(
            validator.validate(&rows[0]),
            Err(RejectionReason::MissingDescription { row: 1 })
        );
    }

    #[test]
    fn test_accepts_valid_row() {
        let (mapping, rows) = rows("amount,description,date\n10.50, Coffee ,2024-03-01\n");
        let cats = categories();
        let validator = RowValidator::new(&mapping, &cats, DateParsingMode::Strict).unwrap();
        let record = validator.validate(&rows[0]).unwrap();

        assert_eq!(record.amount(), 10.5);
        assert_eq!(record.description(), "Coffee");
        assert!(record.created_at_iso().starts_with("2024-03-01T"));
        assert_eq!(record.category_id(), None);
    }

    #[test]
    fn test_category_match_is_soft() {
        let (mapping, rows) = rows("amount,description,category\n1,a,FOOD\n2,b,Rent\n");
        let cats = categories();
        let validator = RowValidator::new(&mapping, &cats, DateParsingMode::Lenient).unwrap();
        let report = validator.validate_all(&rows);

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].category_id(), Some("cat-food"));
        assert_eq!(report.records[1].category_id(), None);
    }

    #[test]
    fn test_missing_date_by_mode() {
        let (mapping, rows) = rows("amount,description,date\n1,a,\n");
        let cats = categories();

        let strict = RowValidator::new(&mapping, &cats, DateParsingMode::Strict).unwrap();
        assert_eq!(
            strict.validate(&rows[0]),
            Err(RejectionReason::MissingDate { row: 1 })
        );

        let lenient = RowValidator::new(&mapping, &cats, DateParsingMode::Lenient)
            .unwrap()
            .with_now(fixed_now());
        assert_eq!(lenient.validate(&rows[0]).unwrap().created_at(), fixed_now());
    }

    #[test]
    fn test_unparseable_date_rejected_in_both_modes() {
        let (mapping, rows) = rows("amount,description,date\n1,a,yesterday\n");
        let cats = categories();
        for mode in [DateParsingMode::Strict, DateParsingMode::Lenient] {
            let validator = RowValidator::new(&mapping, &cats, mode).unwrap();
            assert_eq!(
                validator.validate(&rows[0]),
                Err(RejectionReason::InvalidDate { row: 1, value: "yesterday".into() })
            );
        }
    }

    #[test]
    fn test_refuses_incomplete_mapping() {
        let (mapping, _) = rows("amount,vendor\n1,a\n");
        let cats = categories();
        assert!(RowValidator::new(&mapping, &cats, DateParsingMode::Lenient).is_err());
    }

    #[test]
    fn test_ignored_columns_are_not_projected() {
        let (mut mapping, rows) = rows("amount,description,category\n1,a,Food\n");
        mapping.assign("category", FieldKey::Ignore).unwrap();
        let projected = ProjectedRow::project(&rows[0], &mapping);
        assert_eq!(projected.category, None);
        assert_eq!(projected.amount, Some("1"));
    }

    #[test]
    fn test_notes_are_carried() {
        let (mapping, rows) = rows("amount,description,memo\n4,Taxi, late night \n");
        let cats = categories();
        let validator = RowValidator::new(&mapping, &cats, DateParsingMode::Lenient).unwrap();
        assert_eq!(validator.validate(&rows[0]).unwrap().notes(), "late night");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("10.50"), Some(10.5));
        assert_eq!(parse_amount("$1,234.56"), Some(1234.56));
        assert_eq!(parse_amount(" 7 "), Some(7.0));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("-3"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let day = |y, m, d| midnight_utc(NaiveDate::from_ymd_opt(y, m, d).unwrap());

        assert_eq!(parse_date("2024-03-01"), Some(day(2024, 3, 1)));
        assert_eq!(
            parse_date("2024-03-01T10:15:00Z"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-03-01 10:15"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap())
        );
        // day-first wins when both readings are valid
        assert_eq!(parse_date("03/04/2024"), Some(day(2024, 4, 3)));
        // month-first is the fallback
        assert_eq!(parse_date("03/15/2024"), Some(day(2024, 3, 15)));
        assert_eq!(parse_date("31-12-2023"), Some(day(2023, 12, 31)));
        assert_eq!(parse_date("13/13/2024"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }
}
