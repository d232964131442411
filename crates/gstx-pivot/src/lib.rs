//! # gstx-pivot — Pivot & Batch Split
//!
//! Groups taxed rows by a channel-specific dimension set — default
//! `(gstin, month, gst_rate, ledger, fg)` — sums the measures, applies
//! channel business rules, then partitions the pivot by GST rate into one
//! batch file per distinct rate.
//!
//! ## Conservation
//!
//! The split must conserve what the pivot holds: record counts, taxable
//! totals, and tax totals all reconcile within one paisa. A failed check is
//! a defect in this crate, not in the data — it aborts the stage.

pub mod batch;
pub mod pivot;
pub mod rules;

pub use batch::{split_batches, validate_split, BatchInfo, BatchValidation};
pub use pivot::{pivot_rows, PivotRow, PivotStats};
pub use rules::{channel_pivot_config, PivotConfig};

use thiserror::Error;

/// Errors raised by the pivot/batch stage.
#[derive(Error, Debug)]
pub enum PivotError {
    /// Batch file could not be written.
    #[error("io error writing {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The batch split does not reconcile with the pivot.
    #[error("batch split failed conservation: {0}")]
    Conservation(String),
}
