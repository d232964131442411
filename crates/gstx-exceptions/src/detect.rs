//! # Detection Passes
//!
//! Each pass scans one stage's output and emits exception records. Passes
//! never mutate the data and never abort — the collector decides, after the
//! fact, whether anything critical surfaced.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use gstx_core::temporal::parse_flexible_date;
use gstx_core::{states, Channel, Severity};
use gstx_masters::MappedRow;
use gstx_tax::numbering::validate_invoice_number;
use gstx_tax::TaxedRow;

use crate::codes::{error_definition, EXCEPTION_BATCH_SIZE};

/// One exception row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionRecord {
    /// Kind of record the exception is about (`"sales_row"`, `"invoice"`, …).
    pub record_type: String,
    /// Identifier of the offending record, when one exists.
    pub record_id: Option<String>,
    /// Error code from the catalog.
    pub error_code: String,
    /// Message (catalog description unless overridden).
    pub error_message: String,
    /// Structured details.
    pub error_details: serde_json::Value,
    /// Severity from the catalog.
    pub severity: Severity,
}

impl ExceptionRecord {
    /// Build a record from a catalog code. Unknown codes map to `SYS-002`
    /// with a warning — the taxonomy is closed and this is a programmer
    /// error, not a data error.
    pub fn from_code(
        code: &str,
        record_type: &str,
        record_id: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        match error_definition(code) {
            Some(def) => Self {
                record_type: record_type.to_string(),
                record_id,
                error_code: def.code.to_string(),
                error_message: def.description.to_string(),
                error_details: details,
                severity: def.severity,
            },
            None => {
                tracing::warn!(code, "unknown error code; recording as SYS-002");
                Self {
                    record_type: record_type.to_string(),
                    record_id,
                    error_code: "SYS-002".to_string(),
                    error_message: format!("unknown error code {code}"),
                    error_details: details,
                    severity: Severity::Error,
                }
            }
        }
    }
}

/// Accumulates exception records across passes and drains them in batches.
#[derive(Debug, Default)]
pub struct ExceptionCollector {
    records: Vec<ExceptionRecord>,
}

impl ExceptionCollector {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records from a pass.
    pub fn extend(&mut self, records: Vec<ExceptionRecord>) {
        self.records.extend(records);
    }

    /// Whether any critical exception surfaced.
    pub fn has_critical(&self) -> bool {
        self.records.iter().any(|r| r.severity == Severity::Critical)
    }

    /// Total records collected.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts per severity.
    pub fn severity_counts(&self) -> std::collections::BTreeMap<Severity, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Drain all records as persistence-sized batches.
    pub fn drain_batches(&mut self) -> Vec<Vec<ExceptionRecord>> {
        let mut batches = Vec::new();
        let records = std::mem::take(&mut self.records);
        let mut batch = Vec::with_capacity(EXCEPTION_BATCH_SIZE);
        for record in records {
            batch.push(record);
            if batch.len() == EXCEPTION_BATCH_SIZE {
                batches.push(std::mem::take(&mut batch));
            }
        }
        if !batch.is_empty() {
            batches.push(batch);
        }
        batches
    }
}

/// Mapping pass: unmapped items/ledgers and invalid states.
pub fn detect_mapping_exceptions(rows: &[MappedRow]) -> Vec<ExceptionRecord> {
    let mut out = Vec::new();
    for row in rows {
        let id = Some(row.row.order_id.clone());
        if !row.item_resolved {
            let code = if row.row.sku.is_empty() && !row.row.asin.is_empty() {
                "MAP-002"
            } else {
                "MAP-001"
            };
            out.push(ExceptionRecord::from_code(
                code,
                "sales_row",
                id.clone(),
                json!({ "sku": row.row.sku, "asin": row.row.asin }),
            ));
        }
        if !row.ledger_resolved {
            out.push(ExceptionRecord::from_code(
                "LED-001",
                "sales_row",
                id.clone(),
                json!({ "channel": row.row.channel.family(), "state_code": row.row.state_code }),
            ));
        }
        let abbrev = states::state_abbrev(&row.row.state_code);
        if !states::is_known_abbrev(&abbrev) {
            out.push(ExceptionRecord::from_code(
                "LED-002",
                "sales_row",
                id,
                json!({ "state_code": row.row.state_code }),
            ));
        }
    }
    out
}

/// GST pass: off-slab rates, missing rates on taxable rows, component
/// mismatches, interstate-determination failures.
pub fn detect_gst_exceptions(rows: &[TaxedRow]) -> Vec<ExceptionRecord> {
    let mut out = Vec::new();
    for row in rows {
        let id = Some(row.mapped.row.order_id.clone());
        match row.rate {
            None => {
                let bps = row.mapped.row.gst_rate_bps;
                let state_ok =
                    states::state_abbrev(&row.mapped.row.state_code) != states::UNKNOWN_STATE;
                if !state_ok {
                    out.push(ExceptionRecord::from_code(
                        "GST-004",
                        "tax_computation",
                        id,
                        json!({ "state_code": row.mapped.row.state_code }),
                    ));
                } else {
                    out.push(ExceptionRecord::from_code(
                        "GST-001",
                        "tax_computation",
                        id,
                        json!({ "gst_rate_bps": bps }),
                    ));
                }
            }
            // Normalization fills an absent rate column with 0, so a
            // zero-rate row carrying a taxable amount is the "missing rate"
            // case after ingestion.
            Some(gstx_core::GstRate::Zero) if row.taxable_value.is_positive() => {
                out.push(ExceptionRecord::from_code(
                    "GST-003",
                    "tax_computation",
                    id,
                    json!({ "taxable_value": row.taxable_value.to_string() }),
                ));
            }
            Some(rate) => {
                let base = row.taxable_value + row.shipping_value;
                let expected = base.times_bps(rate.bps());
                let mixed = row.igst.is_positive()
                    && (row.cgst.is_positive() || row.sgst.is_positive());
                if mixed || !row.total_tax().within(expected, 1) {
                    out.push(ExceptionRecord::from_code(
                        "GST-002",
                        "tax_computation",
                        id,
                        json!({
                            "expected": expected.to_string(),
                            "computed": row.total_tax().to_string(),
                        }),
                    ));
                }
            }
        }
    }
    out
}

/// Invoice pass: duplicates, format mismatches, invalid or future dates.
/// Every occurrence of a duplicated number is flagged, not just the later
/// ones — the whole group needs review.
pub fn detect_invoice_exceptions(rows: &[TaxedRow], channel: Channel) -> Vec<ExceptionRecord> {
    let mut out = Vec::new();
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for row in rows {
        if !row.invoice_no.is_empty() {
            *counts.entry(row.invoice_no.as_str()).or_insert(0) += 1;
        }
    }
    let tomorrow = (Utc::now() + Duration::days(1)).date_naive();

    for row in rows {
        let id = Some(row.mapped.row.order_id.clone());
        if !row.invoice_no.is_empty() {
            if counts.get(row.invoice_no.as_str()).copied().unwrap_or(0) > 1 {
                out.push(ExceptionRecord::from_code(
                    "INV-001",
                    "invoice",
                    Some(row.invoice_no.clone()),
                    json!({ "invoice_no": row.invoice_no, "order_id": row.mapped.row.order_id }),
                ));
            }
            if !validate_invoice_number(&row.invoice_no, channel) {
                out.push(ExceptionRecord::from_code(
                    "INV-002",
                    "invoice",
                    Some(row.invoice_no.clone()),
                    json!({ "invoice_no": row.invoice_no, "channel": channel.as_str() }),
                ));
            }
        }

        let raw_date = row.mapped.row.invoice_date.trim();
        if !raw_date.is_empty() {
            match parse_flexible_date(raw_date) {
                Some(date) if date > tomorrow => {
                    out.push(ExceptionRecord::from_code(
                        "INV-003",
                        "invoice",
                        id,
                        json!({ "invoice_date": raw_date, "reason": "future date" }),
                    ));
                }
                Some(_) => {}
                None => {
                    out.push(ExceptionRecord::from_code(
                        "INV-003",
                        "invoice",
                        id,
                        json!({ "invoice_date": raw_date, "reason": "unparseable" }),
                    ));
                }
            }
        }
    }
    out
}

/// Data-quality pass: negative amounts, zero quantities, missing values.
pub fn detect_data_quality_exceptions(rows: &[MappedRow]) -> Vec<ExceptionRecord> {
    let mut out = Vec::new();
    for row in rows {
        let id = Some(row.row.order_id.clone());
        if row.row.taxable_value.is_negative() && !row.row.is_return {
            out.push(ExceptionRecord::from_code(
                "DAT-001",
                "sales_row",
                id.clone(),
                json!({ "taxable_value": row.row.taxable_value.to_string() }),
            ));
        }
        if row.row.quantity <= 0 && !row.row.is_return {
            out.push(ExceptionRecord::from_code(
                "DAT-002",
                "sales_row",
                id.clone(),
                json!({ "quantity": row.row.quantity }),
            ));
        }
        if row.row.invoice_date.trim().is_empty() || row.row.state_code.trim().is_empty() {
            out.push(ExceptionRecord::from_code(
                "DAT-003",
                "sales_row",
                id,
                json!({
                    "invoice_date": row.row.invoice_date,
                    "state_code": row.row.state_code,
                }),
            ));
        }
    }
    out
}

/// Schema pass: one `SCH-001` per missing required column.
pub fn detect_schema_exceptions(missing: &[String]) -> Vec<ExceptionRecord> {
    missing
        .iter()
        .map(|column| {
            ExceptionRecord::from_code(
                "SCH-001",
                "report",
                Some(column.clone()),
                json!({ "column": column }),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::{GstRate, Money, Month, NormalizedRow, TransactionKind};

    fn mapped(sku: &str, item_hit: bool, ledger_hit: bool) -> MappedRow {
        MappedRow {
            row: NormalizedRow {
                invoice_date: "2025-08-01".into(),
                kind: TransactionKind::Shipment,
                order_id: "O1".into(),
                sku: sku.into(),
                asin: "B0A".into(),
                quantity: 1,
                taxable_value: Money::from_paise(100_000),
                gst_rate_bps: 1800,
                state_code: "HARYANA".into(),
                seller_state: None,
                final_date: None,
                channel: Channel::AmazonMtr,
                gstin: "06ABGCS4796R1ZA".into(),
                month: Month::new("2025-08").unwrap(),
                is_return: false,
                total_qty: None,
                returned_qty: None,
            },
            fg: String::new(),
            ledger_name: String::new(),
            item_resolved: item_hit,
            ledger_resolved: ledger_hit,
        }
    }

    fn taxed(invoice_no: &str) -> TaxedRow {
        TaxedRow {
            mapped: mapped("SKU1", true, true),
            rate: Some(GstRate::Eighteen),
            taxable_value: Money::from_paise(100_000),
            shipping_value: Money::ZERO,
            cgst: Money::from_paise(9_000),
            sgst: Money::from_paise(9_000),
            igst: Money::ZERO,
            net_qty: 1,
            returned_qty: 0,
            invoice_no: invoice_no.into(),
        }
    }

    #[test]
    fn mapping_pass_emits_map_and_led() {
        let rows = vec![mapped("SKU1", false, false)];
        let out = detect_mapping_exceptions(&rows);
        let codes: Vec<&str> = out.iter().map(|r| r.error_code.as_str()).collect();
        assert_eq!(codes, vec!["MAP-001", "LED-001"]);
    }

    #[test]
    fn asin_only_miss_is_map_002() {
        let rows = vec![mapped("", false, true)];
        let out = detect_mapping_exceptions(&rows);
        assert_eq!(out[0].error_code, "MAP-002");
    }

    #[test]
    fn gst_pass_flags_off_slab_rate() {
        let mut row = taxed("");
        row.rate = None;
        row.mapped.row.gst_rate_bps = 1500;
        let out = detect_gst_exceptions(&[row]);
        assert_eq!(out[0].error_code, "GST-001");
    }

    #[test]
    fn gst_pass_flags_mismatch() {
        let mut row = taxed("");
        row.cgst = Money::from_paise(1_000);
        let out = detect_gst_exceptions(&[row]);
        assert_eq!(out[0].error_code, "GST-002");
    }

    #[test]
    fn gst_pass_flags_zero_rate_on_taxable_row() {
        let mut row = taxed("");
        row.rate = Some(GstRate::Zero);
        row.mapped.row.gst_rate_bps = 0;
        row.cgst = Money::ZERO;
        row.sgst = Money::ZERO;
        let out = detect_gst_exceptions(&[row]);
        assert_eq!(out[0].error_code, "GST-003");
    }

    #[test]
    fn invoice_pass_flags_duplicates_and_format() {
        let rows = vec![
            taxed("AMZ-HR-08-0001"),
            taxed("AMZ-HR-08-0001"),
            taxed("AMZHR202508001"),
        ];
        let out = detect_invoice_exceptions(&rows, Channel::AmazonMtr);
        let codes: Vec<&str> = out.iter().map(|r| r.error_code.as_str()).collect();
        assert!(codes.contains(&"INV-001"));
        assert!(codes.contains(&"INV-002"));
    }

    #[test]
    fn invoice_pass_flags_future_dates() {
        let mut row = taxed("AMZ-HR-08-0001");
        row.mapped.row.invoice_date = "2099-01-01".into();
        let out = detect_invoice_exceptions(&[row], Channel::AmazonMtr);
        assert!(out.iter().any(|r| r.error_code == "INV-003"));
    }

    #[test]
    fn collector_batches_at_one_hundred() {
        let mut collector = ExceptionCollector::new();
        let records: Vec<ExceptionRecord> = (0..250)
            .map(|i| {
                ExceptionRecord::from_code("DAT-001", "sales_row", Some(i.to_string()), json!({}))
            })
            .collect();
        collector.extend(records);
        assert!(!collector.has_critical());
        let batches = collector.drain_batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[2].len(), 50);
        assert!(collector.is_empty());
    }

    #[test]
    fn critical_detection() {
        let mut collector = ExceptionCollector::new();
        collector.extend(detect_schema_exceptions(&["gst_rate".to_string()]));
        assert!(collector.has_critical());
    }
}
