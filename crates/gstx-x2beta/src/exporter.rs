//! # Batch Export
//!
//! Drives the batch → voucher → workbook chain for every per-rate batch of
//! a run. A missing template fails the whole stage (`EXP-001`); a defective
//! batch fails only its own export and the rest continue.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gstx_core::{Channel, GstRate, Money, Month};
use gstx_pivot::BatchInfo;

use crate::template::TemplateRegistry;
use crate::voucher::sales_voucher_rows;
use crate::writer::render_workbook;
use crate::X2BetaError;

/// Metadata for one exported workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyExportInfo {
    /// GST rate of the exported batch.
    pub gst_rate: GstRate,
    /// Template name used.
    pub template_name: String,
    /// Path of the written workbook.
    pub file_path: PathBuf,
    /// Size of the written file in bytes.
    pub file_size: u64,
    /// Voucher rows written.
    pub record_count: usize,
    /// Summed taxable amount.
    pub total_taxable: Money,
    /// Summed tax amount.
    pub total_tax: Money,
    /// Export status string recorded with the registry row.
    pub export_status: String,
}

/// Result of the export stage across all batches.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    /// Per-batch export records (successful ones carry file metadata).
    pub exports: Vec<TallyExportInfo>,
    /// Batches that failed, with their errors.
    pub failures: Vec<(GstRate, X2BetaError)>,
}

impl ExportOutcome {
    /// Whether every batch exported.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Export every batch of a run to X2Beta workbooks under `export_dir`.
///
/// File naming: `{channel}_{gstin}_{month}_{N}pct_x2beta.xlsx`.
pub fn export_batches(
    batches: &[BatchInfo],
    registry: &TemplateRegistry,
    channel: Channel,
    gstin: &str,
    month: &Month,
    export_dir: &Path,
) -> Result<ExportOutcome, X2BetaError> {
    // Template availability is a stage-level precondition.
    let template = registry.require(gstin)?.clone();

    let mut outcome = ExportOutcome::default();
    for batch in batches {
        let file_name = format!(
            "{}_{}_{}_{}pct_x2beta.xlsx",
            channel.as_str(),
            gstin,
            month.as_str(),
            batch.gst_rate.percent_label()
        );
        let path = export_dir.join(file_name);

        let result = sales_voucher_rows(&batch.rows, month)
            .and_then(|rows| render_workbook(&rows, &template, gstin, &path));

        match result {
            Ok(stats) => outcome.exports.push(TallyExportInfo {
                gst_rate: batch.gst_rate,
                template_name: template.template_name.clone(),
                file_path: path,
                file_size: stats.file_size,
                record_count: stats.record_count,
                total_taxable: stats.total_taxable,
                total_tax: stats.total_tax,
                export_status: "success".into(),
            }),
            Err(err) => {
                tracing::error!(
                    rate = batch.gst_rate.percent_label(),
                    %err,
                    "batch export failed"
                );
                outcome.failures.push((batch.gst_rate, err));
            }
        }
    }
    Ok(outcome)
}
