//! Expense data models shared by the tabular and receipt pipelines.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, RejectionReason};

/// A user-defined expense category, supplied by the caller as a read-only snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Backend document id.
    #[serde(rename = "$id")]
    pub id: String,

    /// Display name, matched case-insensitively against imported category text.
    pub category_name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, category_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category_name: category_name.into(),
        }
    }
}

/// Find the category whose name equals `text`, ignoring case and surrounding whitespace.
pub fn match_category<'a>(categories: &'a [Category], text: &str) -> Option<&'a Category> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    categories
        .iter()
        .find(|c| c.category_name.trim().to_lowercase() == needle)
}

/// A validated expense. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    amount: f64,
    description: String,
    category_id: Option<String>,
    notes: String,
    #[serde(serialize_with = "serialize_iso")]
    created_at: DateTime<Utc>,
}

impl ExpenseRecord {
    /// Only the validators in this crate construct records, after every check passed.
    pub(crate) fn new(
        amount: f64,
        description: String,
        category_id: Option<String>,
        notes: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(amount.is_finite() && amount > 0.0);
        debug_assert!(!description.trim().is_empty());
        Self {
            amount,
            description,
            category_id,
            notes,
            created_at,
        }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category_id.as_deref()
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `createdAt` as an ISO-8601 string with millisecond precision (`2024-03-01T00:00:00.000Z`).
    pub fn created_at_iso(&self) -> String {
        to_iso(&self.created_at)
    }
}

fn to_iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_iso<S: serde::Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&to_iso(at))
}

/// One failed row or item in an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based index of the source row or record.
    pub row_index: usize,
    pub reason: String,
}

/// Aggregate result of a bulk import. Returned to the caller for display, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<RowError>,
}

impl ImportOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records accounted for.
    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }

    pub fn is_clean(&self) -> bool {
        self.failed_count == 0
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, row_index: usize, reason: impl Into<String>) {
        self.failed_count += 1;
        self.errors.push(RowError {
            row_index,
            reason: reason.into(),
        });
    }

    pub fn record_persistence_failure(&mut self, row_index: usize, error: &PersistenceError) {
        self.record_failure(row_index, format!("Row {row_index}: {error}"));
    }

    /// Fold a validation rejection into the outcome.
    pub fn record_rejection(&mut self, rejection: &RejectionReason) {
        self.record_failure(rejection.row(), rejection.to_string());
    }

    /// The first `limit` reasons, followed by `...` when more were dropped.
    pub fn summary_lines(&self, limit: usize) -> Vec<String> {
        let mut lines: Vec<String> = self
            .errors
            .iter()
            .take(limit)
            .map(|e| e.reason.clone())
            .collect();
        if self.errors.len() > limit {
            lines.push("...".to_string());
        }
        lines
    }
}
