//! Remote text extraction for receipt images.

use std::future::Future;

use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::OcrServiceError;
use crate::models::config::OcrConfig;

use super::parser::{PartialExpenseHints, ReceiptTextParser};

/// Anything that can turn a base64-encoded image into raw text.
pub trait TextExtraction {
    fn extract_text(
        &self,
        image_base64: &str,
    ) -> impl Future<Output = Result<String, OcrServiceError>> + Send;
}

/// Client for an OCR.space-compatible parse endpoint.
///
/// Performs exactly one request per call and does not interpret the returned text.
pub struct ReceiptOcrClient {
    http: reqwest::Client,
    config: OcrConfig,
    api_key: String,
}

impl ReceiptOcrClient {
    /// Create a client. Fails when no API key is configured.
    pub fn new(config: OcrConfig) -> Result<Self, OcrServiceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OcrServiceError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("spendlog/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn form(&self, image_base64: &str) -> Form {
        Form::new()
            .text("apikey", self.api_key.clone())
            .text("language", self.config.language.clone())
            .text("isOverlayRequired", "false")
            .text("OCREngine", self.config.engine.to_string())
            .text("scale", self.config.scale.to_string())
            .text("isTable", self.config.is_table.to_string())
            .text("base64Image", format!("data:image/jpeg;base64,{image_base64}"))
    }
}

impl TextExtraction for ReceiptOcrClient {
    async fn extract_text(&self, image_base64: &str) -> Result<String, OcrServiceError> {
        info!("Sending {} bytes of image data to {}", image_base64.len(), self.config.endpoint);

        let response = self
            .http
            .post(&self.config.endpoint)
            .multipart(self.form(image_base64))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrServiceError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(transport_error)?;
        let parsed: OcrSpaceResponse = serde_json::from_str(&body)
            .map_err(|e| OcrServiceError::InvalidResponse(e.to_string()))?;

        let text = interpret(parsed)?;
        debug!("Extracted {} lines of text", text.lines().count());
        Ok(text)
    }
}

fn transport_error(e: reqwest::Error) -> OcrServiceError {
    if e.is_timeout() {
        OcrServiceError::Timeout
    } else {
        OcrServiceError::Http(e)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    fn first(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s.as_str()),
            Self::Many(v) => v.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

/// Subset of the OCR.space response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
}

fn interpret(response: OcrSpaceResponse) -> Result<String, OcrServiceError> {
    if response.is_errored_on_processing {
        let message = response
            .error_message
            .as_ref()
            .and_then(ErrorMessage::first)
            .filter(|m| !m.is_empty())
            .unwrap_or("OCR processing failed");
        return Err(OcrServiceError::Processing(message.to_string()));
    }

    response
        .parsed_results
        .and_then(|results| results.into_iter().next())
        .map(|first| first.parsed_text)
        .ok_or(OcrServiceError::NoResults)
}

/// Text extraction followed by hint parsing.
pub struct ReceiptScanner<E> {
    extractor: E,
    parser: ReceiptTextParser,
}

impl<E: TextExtraction> ReceiptScanner<E> {
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            parser: ReceiptTextParser::new(),
        }
    }

    pub async fn scan(&self, image_base64: &str) -> Result<PartialExpenseHints, OcrServiceError> {
        let text = self.extractor.extract_text(image_base64).await?;
        Ok(self.parser.parse(&text))
    }

    /// Like [`scan`](Self::scan), but a failed extraction yields empty hints
    /// so the expense can still be entered by hand.
    pub async fn scan_or_empty(&self, image_base64: &str) -> PartialExpenseHints {
        match self.scan(image_base64).await {
            Ok(hints) => hints,
            Err(e) => {
                warn!("Could not scan receipt ({}): {}", e.kind(), e);
                PartialExpenseHints::default()
            }
        }
    }
}
