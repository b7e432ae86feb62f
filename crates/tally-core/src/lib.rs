//! Core library for receipt extraction and normalization.
//!
//! This crate provides:
//! - Image validation and MIME detection from magic bytes
//! - Extraction prompt rendering and the chat-completions client
//! - Receipt data models with lenient decoding
//! - Normalization into spreadsheet-ready rows

pub mod error;
pub mod extraction;
pub mod image;
pub mod models;
pub mod normalize;

pub use error::{ExtractError, FailureKind, RecordIssue, Result, TallyError, ValidationFailure};
pub use extraction::{CallContext, ChatTransport, ExtractionClient, HttpTransport, ReceiptService};
pub use image::ImageFormat;
pub use models::{
    ConfigPatch, ExpenseCategory, ExtractionHints, ExtractionOutcome, ExtractionRequest,
    ImageInput, ReceiptLineItem, ReceiptRecord, ServiceConfig,
};
pub use normalize::{Cell, ReceiptEntry, SHEET_HEADER, SheetRow, SheetSink, format_for_spreadsheet};

/// Re-export the cancellation token accepted by [`CallContext`].
pub use tokio_util::sync::CancellationToken;
