//! # gstx-ingest — Report Ingestion & Normalization
//!
//! First stage of the pipeline: read one marketplace report (CSV or
//! spreadsheet) and emit rows in the canonical schema.
//!
//! ## Pipeline position
//!
//! ```text
//! raw report file
//!   → decode (encoding fallback chain)
//!   → header normalization (lowercase + underscores)
//!   → channel column mapping (first present source wins)
//!   → report-specific row filter
//!   → run metadata injection + numeric coercion
//!   → normalized CSV + SHA-256 content hash
//! ```
//!
//! Each channel has its own quirks — MTR sums three per-component rate
//! columns, STR drops in-state rows and maps ASINs to SKUs, Pepperfry
//! merges a returns file with negated quantities — but they all leave
//! through the same [`NormalizedRow`](gstx_core::NormalizedRow) door.

pub mod encoding;
pub mod mappings;
pub mod normalize;
pub mod table;
pub mod validate;

pub use normalize::{normalize_report, IngestOutput, IngestRequest};
pub use table::SourceTable;
pub use validate::{SchemaValidator, ValidationReport};

use thiserror::Error;

/// Errors raised by the ingestion stage.
///
/// Row-level oddities are not errors — they default and continue. These are
/// the failures that make the whole report unusable.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The file could not be read.
    #[error("io error reading {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// No decoder in the fallback chain produced text.
    #[error("could not decode {0} with any supported encoding")]
    Undecodable(String),

    /// The spreadsheet could not be opened or has no sheets.
    #[error("spreadsheet error in {path}: {message}")]
    Spreadsheet {
        /// Offending path.
        path: String,
        /// Reader diagnostic.
        message: String,
    },

    /// The report is missing every candidate for a required column.
    #[error("required column {target} missing from report (tried {candidates:?})")]
    MissingColumn {
        /// Canonical target name.
        target: String,
        /// Source candidates that were tried.
        candidates: Vec<String>,
    },

    /// The report contained no data rows after filtering.
    #[error("report {0} contained no usable rows")]
    Empty(String),
}
