//! # Persisted Record Shapes
//!
//! Flat row types for tables whose in-pipeline representation is richer
//! than what persists. Everything else (pivot rows, export metadata,
//! seller invoices, exceptions, audit entries) persists in its stage shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gstx_core::{Channel, GstRate, Money, Month, RunId, RunStatus};

/// One pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub id: RunId,
    /// Channel processed.
    pub channel: Channel,
    /// Company GSTIN.
    pub gstin: String,
    /// Processing month.
    pub month: Month,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finish time; set on every terminal transition.
    pub finished_at: Option<DateTime<Utc>>,
}

/// One ingested report artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Owning run.
    pub run_id: RunId,
    /// Report kind (`"amazon_mtr_normalized"`, …).
    pub report_type: String,
    /// Storage path of the artifact.
    pub file_path: String,
    /// SHA-256 content hash.
    pub hash: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// One row-level tax computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxComputationRecord {
    /// Owning run.
    pub run_id: RunId,
    /// Channel.
    pub channel: Channel,
    /// Company GSTIN.
    pub gstin: String,
    /// Destination state.
    pub state_code: String,
    /// Row SKU.
    pub sku: String,
    /// Taxable value after adjustments.
    pub taxable_value: Money,
    /// Shipping in the tax base.
    pub shipping_value: Money,
    /// Central GST.
    pub cgst: Money,
    /// State GST.
    pub sgst: Money,
    /// Integrated GST.
    pub igst: Money,
    /// Rate applied.
    pub gst_rate: GstRate,
}

/// One invoice registry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRegistryRecord {
    /// Run that allocated the number.
    pub run_id: RunId,
    /// Channel.
    pub channel: Channel,
    /// Company GSTIN.
    pub gstin: String,
    /// State the number was issued under.
    pub state_code: String,
    /// The invoice number (globally unique).
    pub invoice_no: String,
    /// Month scope.
    pub month: Month,
}

/// One batch registry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRegistryRecord {
    /// Owning run.
    pub run_id: RunId,
    /// Channel.
    pub channel: Channel,
    /// Company GSTIN.
    pub gstin: String,
    /// Month scope.
    pub month: Month,
    /// Batch GST rate.
    pub gst_rate: GstRate,
    /// Batch file path.
    pub file_path: String,
    /// Pivot groups in the batch.
    pub record_count: usize,
    /// Summed taxable value.
    pub total_taxable: Money,
    /// Summed tax.
    pub total_tax: Money,
}
