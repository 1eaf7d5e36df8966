//! Receipt scanning: remote text extraction and heuristic expense hints.

pub mod client;
mod parser;
pub mod patterns;
pub mod rules;

pub use client::{ReceiptOcrClient, ReceiptScanner, TextExtraction};
pub use parser::{PartialExpenseHints, ReceiptTextParser};
pub use rules::{FieldExtractor, HintMatch};
