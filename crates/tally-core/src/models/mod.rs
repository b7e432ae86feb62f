//! Data models for receipts, extraction outcomes, and configuration.

pub mod config;
pub mod outcome;
pub mod receipt;

pub use config::{ConfigPatch, ServiceConfig};
pub use outcome::{ExtractionHints, ExtractionOutcome, ExtractionRequest, ImageInput};
pub use receipt::{ExpenseCategory, ReceiptLineItem, ReceiptRecord, UnknownCategory};
