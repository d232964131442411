//! # gstx-exceptions — Error Taxonomy & Approval Workflow
//!
//! Defects discovered mid-run are data, not panics. This crate owns:
//!
//! - The **closed error-code taxonomy** (`MAP-`, `LED-`, `GST-`, `INV-`,
//!   `SCH-`, `EXP-`, `DAT-`, `SYS-`), each code carrying severity,
//!   auto-resolve, and requires-approval flags.
//! - The **detection passes** that scan stage outputs and emit exception
//!   records in batches.
//! - The **approval workflow**: master-data misses become approval
//!   requests, auto-approval rules dispose of the safe ones immediately,
//!   and human decisions mutate the master tables.
//!
//! Only `critical` severity halts a run; everything else records and
//! continues.

pub mod approval;
pub mod codes;
pub mod detect;

pub use approval::{
    ApprovalDecision, ApprovalEngine, ApprovalRequest, ApprovalRules, ApprovalStatus, RequestType,
};
pub use codes::{error_definition, ErrorDefinition, EXCEPTION_BATCH_SIZE};
pub use detect::{
    detect_data_quality_exceptions, detect_gst_exceptions, detect_invoice_exceptions,
    detect_mapping_exceptions, detect_schema_exceptions, ExceptionCollector, ExceptionRecord,
};
