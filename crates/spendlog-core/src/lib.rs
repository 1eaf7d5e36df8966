//! Core library for expense import and receipt scanning.
//!
//! This crate provides:
//! - CSV and spreadsheet decoding into header-keyed rows
//! - Automatic column-to-field mapping with confidence scores
//! - Row validation into typed expense records
//! - Rate-limit aware bulk persistence
//! - Receipt OCR client and heuristic receipt text parsing

pub mod error;
pub mod import;
pub mod models;
pub mod receipt;

pub use error::{
    MappingError, OcrServiceError, ParseError, PersistenceError, RejectionReason, Result,
    SpendlogError,
};
pub use import::{
    BulkImportCoordinator, ColumnMapper, ColumnMapping, DateParsingMode, FieldKey, FileKind,
    ImportState, ParsedTable, RawRow, RowValidator, TabularParser, ValidationReport,
};
pub use models::config::{ImportConfig, OcrConfig, SpendlogConfig};
pub use models::expense::{Category, ExpenseRecord, ImportOutcome, RowError};
pub use receipt::{
    PartialExpenseHints, ReceiptOcrClient, ReceiptScanner, ReceiptTextParser, TextExtraction,
};
