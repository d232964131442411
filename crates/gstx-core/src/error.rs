//! # Error Types — Structured Error Hierarchy
//!
//! Defines the shared error types used throughout the GSTX Stack. All errors
//! use `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! Stage crates define their own error enums for stage-local failures and
//! convert into [`GstxError`] at the pipeline boundary. Row-level defects are
//! NOT errors — they become exception records and the stage continues.

use thiserror::Error;

/// Top-level error type for the GSTX Stack.
#[derive(Error, Debug)]
pub enum GstxError {
    /// Input file could not be read or decoded.
    #[error("ingest error: {0}")]
    Ingest(String),

    /// Required columns missing from an input report.
    #[error("schema error: missing fields {0:?}")]
    Schema(Vec<String>),

    /// Value failed domain validation (GSTIN, month, rate).
    #[error("validation error: {0}")]
    Validation(String),

    /// Master-data lookup failed in a way that cannot be queued for approval.
    #[error("master data error: {0}")]
    MasterData(String),

    /// A voucher export could not be produced.
    #[error("export error: {0}")]
    Export(String),

    /// Persistence layer failure.
    #[error("store error: {0}")]
    Store(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GstxError {
    /// Shorthand for a validation failure with a formatted message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
