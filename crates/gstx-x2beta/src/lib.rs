//! # gstx-x2beta — Voucher Rendering
//!
//! Translates per-rate batches into X2Beta voucher workbooks the downstream
//! ledger importer consumes. A GSTIN maps to a template registration
//! (template name, company display name, state label); the voucher schema
//! itself is fixed.
//!
//! ## Balancing invariants
//!
//! - Sales voucher: `total = taxable + cgst + sgst + igst`.
//! - Expense voucher group (same voucher number): `Σ total = 0`.
//!
//! Both are checked before a workbook is written; a failed check marks the
//! export `EXP-004` rather than shipping an unbalanced file.

pub mod exporter;
pub mod template;
pub mod voucher;
pub mod writer;

pub use exporter::{export_batches, ExportOutcome, TallyExportInfo};
pub use template::{TemplateEntry, TemplateRegistry};
pub use voucher::{sales_voucher_rows, VoucherRow, VoucherType};
pub use writer::{render_workbook, WorkbookStats};

use thiserror::Error;

/// Errors raised by voucher rendering.
#[derive(Error, Debug)]
pub enum X2BetaError {
    /// No template registered for the GSTIN (`EXP-001`).
    #[error("no X2Beta template registered for GSTIN {0}")]
    TemplateMissing(String),

    /// Template registration failed structural validation (`EXP-002`).
    #[error("template validation failed for {gstin}: {reason}")]
    TemplateInvalid {
        /// GSTIN whose registration is defective.
        gstin: String,
        /// What failed.
        reason: String,
    },

    /// Voucher rows failed the balancing invariant (`EXP-004`).
    #[error("voucher balancing failed: {0}")]
    Unbalanced(String),

    /// Workbook write failed (`EXP-003`).
    #[error("workbook error: {0}")]
    Workbook(String),

    /// Filesystem failure around the export directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
