//! Configuration structures for the import and receipt pipelines.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::import::validator::DateParsingMode;

/// Main configuration for spendlog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpendlogConfig {
    /// Receipt text-extraction service configuration.
    pub ocr: OcrConfig,

    /// Tabular import configuration.
    pub import: ImportConfig,
}

/// Remote OCR service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Endpoint receiving the multipart parse request.
    pub endpoint: String,

    /// API credential. Requests are refused when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Recognition language code.
    pub language: String,

    /// Service-side OCR engine number.
    pub engine: u8,

    /// Let the service upscale low-resolution images.
    pub scale: bool,

    /// Tabular layout hint, better for receipts.
    pub is_table: bool,

    /// Hard request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.ocr.space/parse/image".to_string(),
            api_key: None,
            language: "eng".to_string(),
            engine: 2,
            scale: true,
            is_table: true,
            timeout_secs: 30,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Set the API credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Tabular import configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Missing-date policy for CSV/spreadsheet rows.
    pub date_mode: DateParsingMode,

    /// Records persisted concurrently per batch.
    pub batch_size: usize,

    /// Pause between successive batches.
    pub batch_delay_ms: u64,

    /// Pause after a rate-limited batch, before individual retries.
    pub throttle_delay_ms: u64,

    /// Pause between individual retries.
    pub retry_delay_ms: u64,

    /// Fail the whole import when any record fails.
    pub strict: bool,

    /// Minimum confidence for required columns to be accepted without review.
    pub min_confidence: u8,

    /// Number of textual reasons shown in an import summary.
    pub max_reported_errors: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            date_mode: DateParsingMode::Lenient,
            batch_size: 10,
            batch_delay_ms: 1000,
            throttle_delay_ms: 3000,
            retry_delay_ms: 500,
            strict: false,
            min_confidence: 80,
            max_reported_errors: 5,
        }
    }
}

impl SpendlogConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: SpendlogConfig =
            serde_json::from_str(r#"{"import": {"batch_size": 25, "date_mode": "strict"}}"#)
                .unwrap();
        assert_eq!(config.import.batch_size, 25);
        assert_eq!(config.import.date_mode, DateParsingMode::Strict);
        assert_eq!(config.import.batch_delay_ms, 1000);
        assert_eq!(config.ocr.timeout(), Duration::from_secs(30));
        assert!(config.ocr.api_key.is_none());
    }

    #[test]
    fn test_api_key_not_written_when_absent() {
        let json = serde_json::to_value(SpendlogConfig::default()).unwrap();
        assert!(json["ocr"].get("api_key").is_none());
        assert_eq!(json["ocr"]["engine"], 2);
    }
}
