//! Best-effort expense hints from OCR'd receipt text.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::RejectionReason;
use crate::import::validator::midnight_utc;
use crate::models::expense::ExpenseRecord;

use super::rules::{AmountExtractor, DateExtractor, FieldExtractor, HintMatch, MerchantExtractor};

/// Receipts are imported one at a time; rejections refer to row 1.
const RECEIPT_ROW: usize = 1;

/// Suggested field values for a receipt, each with its confidence.
///
/// Any hint may be absent. Values are suggestions for a person to confirm or edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartialExpenseHints {
    pub amount: Option<HintMatch<f64>>,
    pub date: Option<HintMatch<NaiveDate>>,
    pub description: Option<HintMatch<String>>,
}

impl PartialExpenseHints {
    pub fn amount(&self) -> Option<f64> {
        self.amount.as_ref().map(|h| h.value)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date.as_ref().map(|h| h.value)
    }

    /// Date as `YYYY-MM-DD`.
    pub fn date_iso(&self) -> Option<String> {
        self.date().map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_ref().map(|h| h.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.date.is_none() && self.description.is_none()
    }

    /// Build a record from confirmed hints. Amount, description and date are all required.
    pub fn to_record(&self, category_id: Option<String>) -> Result<ExpenseRecord, RejectionReason> {
        let amount = self.amount().ok_or_else(|| RejectionReason::InvalidAmount {
            row: RECEIPT_ROW,
            value: String::new(),
        })?;
        let description = self
            .description()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(RejectionReason::MissingDescription { row: RECEIPT_ROW })?;
        let date = self
            .date()
            .ok_or(RejectionReason::MissingDate { row: RECEIPT_ROW })?;

        Ok(ExpenseRecord::new(
            amount,
            description.to_string(),
            category_id,
            String::new(),
            midnight_utc(date),
        ))
    }
}

/// Heuristic receipt text parser.
pub struct ReceiptTextParser {
    amounts: AmountExtractor,
    dates: DateExtractor,
    merchant: MerchantExtractor,
}

impl ReceiptTextParser {
    pub fn new() -> Self {
        Self {
            amounts: AmountExtractor::new(),
            dates: DateExtractor::new(),
            merchant: MerchantExtractor::new(),
        }
    }

    /// Extract hints from raw text. Never fails; unknown fields stay `None`.
    pub fn parse(&self, text: &str) -> PartialExpenseHints {
        info!("Parsing receipt from {} characters of text", text.len());

        let hints = PartialExpenseHints {
            amount: self.amounts.extract(text),
            date: self.dates.extract(text),
            description: self
                .merchant
                .extract(text)
                .map(|m| m.map(|name| format!("Purchase from {name}"))),
        };

        if let Some(h) = &hints.amount {
            debug!("Amount {} on line {} ({:.2})", h.value, h.line, h.confidence);
        }
        if let Some(h) = &hints.date {
            debug!("Date {} on line {} ({:.2})", h.value, h.line, h.confidence);
        }
        if let Some(h) = &hints.description {
            debug!("Merchant \"{}\" on line {} ({:.2})", h.source, h.line, h.confidence);
        }

        hints
    }
}

impl Default for ReceiptTextParser {
    fn default() -> Self {
        Self::new()
    }
}
