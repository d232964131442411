//! # gstx-audit — Audit Trail & MIS Reports
//!
//! Two consumers of everything the pipeline produces:
//!
//! - **Audit logger** — an append-only, happens-before-ordered event trail.
//!   Entries buffer in memory (batch size 100) and flush in order; scoped
//!   operation guards emit a START on entry and a COMPLETE or
//!   CRITICAL_ERROR on exit on every path, with wall-clock timings
//!   aggregated per operation.
//! - **MIS generator** — the derived business view per
//!   `(run, channel, gstin, month)`: sales, expense, GST, and profitability
//!   metrics plus a data-quality score, exportable as CSV or a styled
//!   Excel summary.

pub mod logger;
pub mod mis;

pub use logger::{
    AuditAction, AuditActor, AuditEntry, AuditLogger, AuditSession, EntityType, OperationGuard,
    AUDIT_BUFFER_SIZE,
};
pub use mis::{
    comparative_growth, export_mis_csv, export_mis_excel, ExpenseMetrics, GstMetrics, MisReport,
    ProfitabilityMetrics, SalesMetrics,
};

use thiserror::Error;

/// Errors raised by report export.
#[derive(Error, Debug)]
pub enum AuditError {
    /// CSV export failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel export failed.
    #[error("workbook error: {0}")]
    Workbook(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
