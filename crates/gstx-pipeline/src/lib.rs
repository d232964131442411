//! # gstx-pipeline — Staged Run Controller
//!
//! One run threads through the stages in dependency order:
//!
//! ```text
//! ingest → validate → masters → tax → numbering → pivot → batch
//!        → voucher export → expenses → exceptions → MIS/audit
//! ```
//!
//! The controller never unwinds. Every stage returns data plus a result
//! summary; defects become exception records; the run's terminal status is
//! the only thing the driver needs. Run finish is persisted on every exit
//! path — early failures and approval waits included.
//!
//! Stages are sequential within a run; row-level work inside the tax stage
//! fans out over a worker pool whose size never changes the output
//! (aggregation is associative and numbering happens post-grouping in a
//! deterministic partition order).

pub mod controller;
pub mod options;
pub mod workers;

pub use controller::{Pipeline, RunOutcome};
pub use options::{PipelineRequest, StageToggles};
