//! Error types for the tally-core library.

use thiserror::Error;

/// Main error type for the tally library.
#[derive(Error, Debug)]
pub enum TallyError {
    /// An image precondition was not met.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationFailure),

    /// The extraction call failed.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A failed image precondition, always tied to the field that caused it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationFailure {
    /// Name of the offending input (`image_data`, `image_size`, `image_format`).
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while talking to the vision endpoint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// The request could not be built or serialized.
    #[error("failed to build request: {0}")]
    Request(String),

    /// Network or connection failure.
    #[error("failed to call vision endpoint: {0}")]
    Transport(String),

    /// The endpoint did not answer in time, or the caller's deadline passed.
    #[error("vision endpoint timed out: {0}")]
    Timeout(String),

    /// The caller cancelled the request.
    #[error("request cancelled by caller")]
    Cancelled,

    /// The endpoint reported a structured error or refusal.
    #[error("vision API error: {message}")]
    Api { status: Option<u16>, message: String },

    /// Non-success status without a structured error body.
    #[error("vision API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response contained no choices.
    #[error("no choices returned from API")]
    EmptyChoices,

    /// The response envelope was not valid JSON.
    #[error("failed to parse response: {message}")]
    ResponseParse { message: String, raw_text: String },

    /// The receipt payload inside the response did not decode.
    #[error("failed to parse receipt data: {message}")]
    ReceiptParse { message: String, raw_text: String },
}

impl ExtractError {
    /// Failure class for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::Request(_) | ExtractError::Transport(_) => FailureKind::Transport,
            ExtractError::Timeout(_) => FailureKind::Timeout,
            ExtractError::Cancelled => FailureKind::Cancelled,
            ExtractError::Api { .. } | ExtractError::Status { .. } | ExtractError::EmptyChoices => {
                FailureKind::Api
            }
            ExtractError::ResponseParse { .. } | ExtractError::ReceiptParse { .. } => {
                FailureKind::Parse
            }
        }
    }

    /// Raw text received before the failure, kept for diagnostics.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            ExtractError::ResponseParse { raw_text, .. }
            | ExtractError::ReceiptParse { raw_text, .. } => Some(raw_text),
            _ => None,
        }
    }
}

/// Coarse failure classes reported on an extraction outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Transport,
    Timeout,
    Cancelled,
    Api,
    Parse,
}

/// Completeness problems found on a structurally valid receipt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordIssue {
    #[error("store name is required")]
    MissingStoreName,

    #[error("total amount must be positive (got {0:.2})")]
    NonPositiveTotal(f64),

    #[error("currency is required")]
    MissingCurrency,

    #[error("receipt date is required")]
    MissingDate,

    /// Reported subtotal and adjustments do not add up to the total.
    #[error("total calculation mismatch: expected {expected:.2} from subtotal, tax, tip and discount, got total {total:.2}")]
    TotalMismatch { expected: f64, total: f64 },
}

/// Result type for the tally library.
pub type Result<T> = std::result::Result<T, TallyError>;
