//! Error types for the spendlog-core library.

use serde::Serialize;
use thiserror::Error;

use crate::import::mapping::FieldKey;
use crate::models::expense::ImportOutcome;

/// Main error type for the spendlog library.
#[derive(Error, Debug)]
pub enum SpendlogError {
    /// The source file could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The column mapping cannot be used without manual review.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The receipt text-extraction service failed.
    #[error("OCR service error: {0}")]
    Ocr(#[from] OcrServiceError),

    /// A strict import finished with failed records.
    #[error("import failed: {} of {} records failed", .0.failed_count, .0.total())]
    ImportFailed(Box<ImportOutcome>),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while decoding a tabular file. Fatal to the whole import.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Header row is absent or the file has no data rows.
    #[error("malformed file: {0}")]
    Malformed(String),

    /// File kind could not be determined or is not supported.
    #[error("unsupported file kind: {0}")]
    UnsupportedKind(String),

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet decoding failed.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
}

impl ParseError {
    /// Short tag for display and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnsupportedKind(_) => "unsupported",
            Self::Csv(_) => "csv",
            Self::Spreadsheet(_) => "spreadsheet",
        }
    }
}

/// Mapping problems that require the caller to present a manual mapping step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// At least one required field has no source column.
    #[error("missing required fields: {}", join_fields(.0))]
    MissingRequiredFields(Vec<FieldKey>),

    /// A required field was matched, but not confidently enough.
    #[error("column \"{header}\" was mapped to {field} with low confidence ({confidence})")]
    LowConfidence {
        header: String,
        field: FieldKey,
        confidence: u8,
    },

    /// A manual assignment referenced a header that is not in the file.
    #[error("unknown column: {0}")]
    UnknownHeader(String),

    /// A field name could not be parsed.
    #[error("unknown field: {0}")]
    UnknownField(String),
}

fn join_fields(fields: &[FieldKey]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-row rejection. Collected, never halts an import.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("Row {row}: Invalid amount \"{value}\"")]
    InvalidAmount { row: usize, value: String },

    #[error("Row {row}: Description is required")]
    MissingDescription { row: usize },

    #[error("Row {row}: Invalid date \"{value}\"")]
    InvalidDate { row: usize, value: String },

    #[error("Row {row}: Date is required")]
    MissingDate { row: usize },
}

impl RejectionReason {
    /// 1-based source row index.
    pub fn row(&self) -> usize {
        match self {
            Self::InvalidAmount { row, .. }
            | Self::MissingDescription { row }
            | Self::InvalidDate { row, .. }
            | Self::MissingDate { row } => *row,
        }
    }
}

/// Errors from the remote text-extraction service.
#[derive(Error, Debug)]
pub enum OcrServiceError {
    /// No API credential was configured.
    #[error("OCR API key is missing")]
    MissingApiKey,

    /// Network or transport failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("HTTP error status: {0}")]
    Status(u16),

    /// The service reported a processing error.
    #[error("OCR processing failed: {0}")]
    Processing(String),

    /// The service returned no parsed results.
    #[error("no text could be extracted from the image")]
    NoResults,

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl OcrServiceError {
    /// Short tag for display and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::Http(_) => "network",
            Self::Timeout => "timeout",
            Self::Status(_) => "http_status",
            Self::Processing(_) => "processing",
            Self::NoResults => "no_results",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Opaque failure reported by the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PersistenceError {
    message: String,
    rate_limited: bool,
}

impl PersistenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rate_limited: false,
        }
    }

    /// A failure that signals the backend is throttling requests.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rate_limited: true,
        }
    }

    /// Build from an HTTP status; 429 marks the error as rate limited.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rate_limited: status == 429,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for the spendlog library.
pub type Result<T> = std::result::Result<T, SpendlogError>;
