//! # gstx-store — Persistence Surface
//!
//! The real backend is an external key-value + blob service; this crate is
//! its in-process shape: the logical table set the pipeline reads and
//! writes, with single-writer semantics on the process-wide resources
//! (master tables, invoice registry) and run-scoped ownership everywhere
//! else — deleting a run cascades to every record keyed by it.
//!
//! Stage crates never touch the store. Stages return data; the pipeline
//! controller persists it here.

pub mod blob;
pub mod memory;
pub mod records;

pub use blob::{BlobStore, BlobStoreConfig};
pub use memory::MemoryStore;
pub use records::{
    BatchRegistryRecord, InvoiceRegistryRecord, ReportRecord, RunRecord, TaxComputationRecord,
};

use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique-index violation.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// Referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Blob operation failed after retry.
    #[error("blob store error: {0}")]
    Blob(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
