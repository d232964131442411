//! # gstx-core — Foundational Types for the GSTX Stack
//!
//! This crate is the bedrock of the GSTX Stack. It defines the type-system
//! primitives every pipeline stage shares. Every other crate in the workspace
//! depends on `gstx-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** [`Gstin`], [`RunId`],
//!    [`Month`] — all newtypes with validated constructors. No bare strings
//!    for identifiers.
//!
//! 2. **Fixed-precision money.** ALL monetary arithmetic flows through
//!    [`Money`] (`i64` paise, half-away-from-zero rounding at 2 decimal
//!    places). No raw `f64` survives past the ingestion boundary.
//!
//! 3. **Closed GST rate set.** [`GstRate`] has exactly five variants
//!    (0%, 5%, 12%, 18%, 28%). A rate outside the set is a construction
//!    error, not a runtime surprise three stages later.
//!
//! 4. **Exhaustive channel taxonomy.** One [`Channel`] enum; adding a
//!    marketplace forces every consumer to handle it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `gstx-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize` where they cross a persistence boundary.

pub mod channel;
pub mod domain;
pub mod error;
pub mod identity;
pub mod money;
pub mod notify;
pub mod rates;
pub mod states;
pub mod status;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use channel::Channel;
pub use domain::{NormalizedRow, Severity, TransactionKind};
pub use error::GstxError;
pub use identity::{Gstin, RunId};
pub use money::Money;
pub use notify::{NotificationSink, TracingSink};
pub use rates::GstRate;
pub use status::RunStatus;
pub use temporal::Month;
