//! Extraction request and outcome types.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, FailureKind, TallyError, ValidationFailure};
use crate::models::receipt::ReceiptRecord;

/// Where the receipt image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageInput {
    /// Base64 payload, optionally already wrapped in a `data:` URI.
    Base64(String),
    /// Absolute URL the endpoint can fetch.
    Url(String),
}

impl ImageInput {
    /// Classify a free-form source: `http(s)://` is a URL, anything else base64.
    pub fn from_source(source: &str) -> Self {
        let lowered = source.trim_start().to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            ImageInput::Url(source.trim().to_string())
        } else {
            ImageInput::Base64(source.to_string())
        }
    }

    /// True when no image data is present.
    pub fn is_empty(&self) -> bool {
        match self {
            ImageInput::Base64(data) => data.is_empty(),
            ImageInput::Url(url) => url.trim().is_empty(),
        }
    }
}

/// Optional hints that sharpen extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionHints {
    /// Currency to assume when none is printed.
    pub currency: Option<String>,
    /// Language the receipt is most likely written in.
    pub language: Option<String>,
    /// Merchant the receipt most likely comes from.
    pub store: Option<String>,
}

/// A request to extract one receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub image: ImageInput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_hint: Option<String>,
}

impl ExtractionRequest {
    /// Create a request without hints.
    pub fn new(image: ImageInput) -> Self {
        Self {
            image,
            expected_currency: None,
            expected_language: None,
            store_hint: None,
        }
    }

    /// Attach hints; blank values are dropped.
    pub fn with_hints(mut self, hints: &ExtractionHints) -> Self {
        let clean = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        self.expected_currency = clean(&hints.currency);
        self.expected_language = clean(&hints.language);
        self.store_hint = clean(&hints.store);
        self
    }
}

/// Uniform result of an extraction attempt.
///
/// Every failure path yields `success == false` with `error` populated; raw
/// text is kept whenever any was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ReceiptRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl ExtractionOutcome {
    /// A successful extraction.
    pub fn succeeded(record: ReceiptRecord, raw_text: String) -> Self {
        Self {
            success: true,
            data: Some(record),
            error: None,
            error_kind: None,
            raw_text: Some(raw_text),
        }
    }

    /// A failed call to the vision endpoint.
    pub fn failed(err: &ExtractError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            raw_text: err.raw_text().map(str::to_string),
        }
    }

    /// A request rejected before any network call.
    pub fn rejected(failure: &ValidationFailure) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(failure.to_string()),
            error_kind: Some(FailureKind::Validation),
            raw_text: None,
        }
    }

    /// Convert into the extracted record, or an error carrying the failure message.
    pub fn into_result(self) -> Result<ReceiptRecord, TallyError> {
        match (self.success, self.data) {
            (true, Some(record)) => Ok(record),
            _ => {
                let message = self
                    .error
                    .unwrap_or_else(|| "extraction returned no data".to_string());
                Err(match self.error_kind {
                    Some(FailureKind::Validation) => {
                        TallyError::Validation(ValidationFailure::new("image_data", message))
                    }
                    Some(FailureKind::Cancelled) => TallyError::Extraction(ExtractError::Cancelled),
                    Some(FailureKind::Timeout) => TallyError::Extraction(ExtractError::Timeout(message)),
                    _ => TallyError::Extraction(ExtractError::Api { status: None, message }),
                })
            }
        }
    }
}
