//! # Batch Splitter
//!
//! Partitions a pivot by GST rate and writes one CSV per distinct rate,
//! named `{channel}_{gstin}_{month}_{N}pct_batch.csv`. Every split is
//! followed by a conservation check against the source pivot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gstx_core::{Channel, GstRate, Money, Month};

use crate::pivot::PivotRow;
use crate::PivotError;

/// One written batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInfo {
    /// GST rate of the batch.
    pub gst_rate: GstRate,
    /// Path of the written CSV.
    pub file_path: PathBuf,
    /// Pivot groups in the batch.
    pub record_count: usize,
    /// Summed taxable value.
    pub total_taxable: Money,
    /// Summed tax.
    pub total_tax: Money,
    /// Pivot groups carried, for voucher rendering without a re-read.
    pub rows: Vec<PivotRow>,
}

/// Result of the conservation check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchValidation {
    /// Whether every check passed.
    pub passed: bool,
    /// Human-readable check failures.
    pub failures: Vec<String>,
    /// Pivot group count.
    pub pivot_records: usize,
    /// Sum of batch record counts.
    pub batch_records: usize,
}

/// Split a pivot into per-rate batch files under `out_dir`.
pub fn split_batches(
    pivot: &[PivotRow],
    channel: Channel,
    gstin: &str,
    month: &Month,
    out_dir: &Path,
) -> Result<(Vec<BatchInfo>, BatchValidation), PivotError> {
    std::fs::create_dir_all(out_dir).map_err(|source| PivotError::Io {
        path: out_dir.display().to_string(),
        source,
    })?;

    let mut by_rate: BTreeMap<i64, Vec<PivotRow>> = BTreeMap::new();
    for row in pivot {
        by_rate.entry(row.gst_rate.bps()).or_default().push(row.clone());
    }

    let mut batches = Vec::with_capacity(by_rate.len());
    for (bps, rows) in by_rate {
        let rate = rows[0].gst_rate;
        debug_assert_eq!(rate.bps(), bps);
        let file_name = format!(
            "{}_{}_{}_{}pct_batch.csv",
            channel.as_str(),
            gstin,
            month.as_str(),
            rate.percent_label()
        );
        let file_path = out_dir.join(file_name);
        write_batch_csv(&file_path, &rows)?;

        let total_taxable: Money = rows.iter().map(|r| r.total_taxable).sum();
        let total_tax: Money = rows.iter().map(|r| r.total_tax()).sum();
        tracing::info!(
            rate = rate.percent_label(),
            records = rows.len(),
            path = %file_path.display(),
            "batch file written"
        );
        batches.push(BatchInfo {
            gst_rate: rate,
            file_path,
            record_count: rows.len(),
            total_taxable,
            total_tax,
            rows,
        });
    }

    let validation = validate_split(pivot, &batches);
    if !validation.passed {
        return Err(PivotError::Conservation(validation.failures.join("; ")));
    }
    Ok((batches, validation))
}

/// Conservation check: batch totals reconcile with the pivot within one
/// paisa per measure.
pub fn validate_split(pivot: &[PivotRow], batches: &[BatchInfo]) -> BatchValidation {
    let mut v = BatchValidation {
        pivot_records: pivot.len(),
        batch_records: batches.iter().map(|b| b.record_count).sum(),
        ..Default::default()
    };

    if v.batch_records != v.pivot_records {
        v.failures.push(format!(
            "record counts diverge: pivot {} vs batches {}",
            v.pivot_records, v.batch_records
        ));
    }

    let pivot_taxable: Money = pivot.iter().map(|r| r.total_taxable).sum();
    let batch_taxable: Money = batches.iter().map(|b| b.total_taxable).sum();
    if !pivot_taxable.within(batch_taxable, 1) {
        v.failures.push(format!(
            "taxable totals diverge: pivot {pivot_taxable} vs batches {batch_taxable}"
        ));
    }

    let pivot_tax: Money = pivot.iter().map(|r| r.total_tax()).sum();
    let batch_tax: Money = batches.iter().map(|b| b.total_tax).sum();
    if !pivot_tax.within(batch_tax, 1) {
        v.failures.push(format!(
            "tax totals diverge: pivot {pivot_tax} vs batches {batch_tax}"
        ));
    }

    v.passed = v.failures.is_empty();
    v
}

fn write_batch_csv(path: &Path, rows: &[PivotRow]) -> Result<(), PivotError> {
    let mut writer = csv::Writer::from_path(path).map_err(PivotError::Csv)?;
    writer.write_record([
        "gstin",
        "month",
        "gst_rate",
        "ledger_name",
        "fg",
        "state_code",
        "invoice_no",
        "total_quantity",
        "total_taxable",
        "total_cgst",
        "total_sgst",
        "total_igst",
        "total_tax",
        "total_amount",
    ])?;
    for row in rows {
        writer.write_record([
            row.gstin.as_str(),
            row.month.as_str(),
            row.gst_rate.as_str(),
            row.ledger_name.as_str(),
            row.fg.as_str(),
            row.state_code.as_deref().unwrap_or(""),
            row.invoice_no.as_deref().unwrap_or(""),
            &row.total_quantity.to_string(),
            &row.total_taxable.to_string(),
            &row.total_cgst.to_string(),
            &row.total_sgst.to_string(),
            &row.total_igst.to_string(),
            &row.total_tax().to_string(),
            &row.total_amount().to_string(),
        ])?;
    }
    writer.flush().map_err(|source| PivotError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pivot_row(rate: GstRate, taxable_paise: i64, igst_paise: i64) -> PivotRow {
        PivotRow {
            gstin: "06ABGCS4796R1ZA".into(),
            month: Month::new("2025-08").unwrap(),
            gst_rate: rate,
            ledger_name: "Amazon Sales - HR".into(),
            fg: "Widget".into(),
            state_code: None,
            total_quantity: 1,
            total_taxable: Money::from_paise(taxable_paise),
            total_cgst: Money::ZERO,
            total_sgst: Money::ZERO,
            total_igst: Money::from_paise(igst_paise),
            source_rows: 1,
            invoice_no: None,
        }
    }

    #[test]
    fn one_file_per_rate_with_expected_names() {
        let dir = tempfile::tempdir().unwrap();
        let pivot = vec![
            pivot_row(GstRate::Eighteen, 100_000, 18_000),
            pivot_row(GstRate::Zero, 40_000, 0),
            pivot_row(GstRate::Eighteen, 50_000, 9_000),
        ];
        let month = Month::new("2025-08").unwrap();
        let (batches, validation) = split_batches(
            &pivot,
            Channel::AmazonMtr,
            "06ABGCS4796R1ZA",
            &month,
            dir.path(),
        )
        .unwrap();

        assert!(validation.passed);
        assert_eq!(batches.len(), 2);
        let names: Vec<String> = batches
            .iter()
            .map(|b| b.file_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"amazon_mtr_06ABGCS4796R1ZA_2025-08_0pct_batch.csv".to_string()));
        assert!(names.contains(&"amazon_mtr_06ABGCS4796R1ZA_2025-08_18pct_batch.csv".to_string()));
        for b in &batches {
            assert!(b.file_path.exists());
        }
        let eighteen = batches.iter().find(|b| b.gst_rate == GstRate::Eighteen).unwrap();
        assert_eq!(eighteen.record_count, 2);
        assert_eq!(eighteen.total_taxable, Money::from_paise(150_000));
        assert_eq!(eighteen.total_tax, Money::from_paise(27_000));
    }

    #[test]
    fn conservation_detects_divergence() {
        let pivot = vec![pivot_row(GstRate::Eighteen, 100_000, 18_000)];
        let batches = vec![BatchInfo {
            gst_rate: GstRate::Eighteen,
            file_path: PathBuf::from("x.csv"),
            record_count: 1,
            total_taxable: Money::from_paise(99_000),
            total_tax: Money::from_paise(18_000),
            rows: vec![],
        }];
        let v = validate_split(&pivot, &batches);
        assert!(!v.passed);
        assert_eq!(v.failures.len(), 1);
    }
}
