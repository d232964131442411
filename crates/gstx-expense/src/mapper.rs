//! # Expense Mapper
//!
//! Resolves parsed invoice lines to expense ledgers, splits GST for input
//! credit, and assigns `EXP{SS}{YY}{MM}{seq}` voucher numbers. The
//! sum-of-GST invariant (`cgst + sgst + igst == total − taxable ± 0.01`)
//! gates each record; violations are marked instead of silently exported.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gstx_core::{Channel, GstRate, Gstin, Money};

use crate::parse::ParsedInvoice;
use crate::rules::{
    compute_expense_gst, expense_rule_for, input_ledger_label, normalize_expense_type,
};

/// One seller invoice line as persisted to the expense table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerInvoiceRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Channel family of the marketplace.
    pub channel: String,
    /// Vendor GSTIN, when the invoice carried one.
    pub gstin: Option<String>,
    /// Source invoice number.
    pub invoice_no: String,
    /// Invoice date.
    pub invoice_date: NaiveDate,
    /// Standardized expense type.
    pub expense_type: String,
    /// Taxable value.
    pub taxable_value: Money,
    /// GST rate applied.
    pub gst_rate: GstRate,
    /// Central GST input amount.
    pub cgst: Money,
    /// State GST input amount.
    pub sgst: Money,
    /// Integrated GST input amount.
    pub igst: Money,
    /// Line total.
    pub total_value: Money,
    /// Resolved expense ledger.
    pub ledger_name: String,
    /// `processed` or `gst_mismatch`.
    pub processing_status: String,
}

/// A mapped expense ready for voucher expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedExpense {
    /// The persisted record.
    pub record: SellerInvoiceRecord,
    /// Input CGST ledger label, when CGST applies.
    pub cgst_ledger: Option<String>,
    /// Input SGST ledger label, when SGST applies.
    pub sgst_ledger: Option<String>,
    /// Input IGST ledger label, when IGST applies.
    pub igst_ledger: Option<String>,
    /// Purchase voucher number (`EXP{SS}{YY}{MM}{seq}`).
    pub voucher_no: String,
}

/// Summary of one mapping pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MappingStats {
    /// Invoices consumed.
    pub invoices: usize,
    /// Line items mapped.
    pub lines: usize,
    /// Lines failing the sum-of-GST invariant.
    pub gst_mismatches: usize,
}

/// Map parsed invoices for a run.
///
/// Voucher sequence numbers are assigned in input order starting at 1,
/// scoped by the company state and invoice month.
pub fn map_invoices(
    invoices: &[ParsedInvoice],
    channel: Channel,
    company_gstin: &Gstin,
) -> (Vec<MappedExpense>, MappingStats) {
    let mut stats = MappingStats {
        invoices: invoices.len(),
        ..Default::default()
    };
    let mut mapped = Vec::new();
    let mut seq: u32 = 0;

    for invoice in invoices {
        for line in &invoice.line_items {
            seq += 1;
            stats.lines += 1;

            let expense_type = normalize_expense_type(&line.expense_type);
            let (ledger_name, rate) = match expense_rule_for(channel.family(), &expense_type) {
                Some(rule) => (rule.ledger_name.to_string(), rule.gst_rate),
                None => {
                    // No catalog entry at all for the channel; synthesize
                    // the conventional fallback ledger.
                    (
                        format!("{} Other Charges", channel.title()),
                        line.gst_rate,
                    )
                }
            };

            let split = compute_expense_gst(
                line.taxable_value,
                rate,
                company_gstin.as_str(),
                invoice.gstin.as_deref(),
            );

            let expected_tax = line.total_value - line.taxable_value;
            let status = if split.total().within(expected_tax, 1) {
                "processed"
            } else {
                stats.gst_mismatches += 1;
                tracing::warn!(
                    invoice_no = %invoice.invoice_no,
                    expense_type = %expense_type,
                    computed = %split.total(),
                    expected = %expected_tax,
                    "expense GST mismatch"
                );
                "gst_mismatch"
            };

            let record = SellerInvoiceRecord {
                id: Uuid::new_v4(),
                channel: channel.family().to_string(),
                gstin: invoice.gstin.clone(),
                invoice_no: invoice.invoice_no.clone(),
                invoice_date: invoice.invoice_date,
                expense_type,
                taxable_value: line.taxable_value,
                gst_rate: rate,
                cgst: split.cgst,
                sgst: split.sgst,
                igst: split.igst,
                total_value: line.total_value,
                ledger_name,
                processing_status: status.to_string(),
            };

            mapped.push(MappedExpense {
                voucher_no: voucher_number(company_gstin, invoice.invoice_date, seq),
                cgst_ledger: split
                    .cgst
                    .is_positive()
                    .then(|| input_ledger_label("CGST", rate, true)),
                sgst_ledger: split
                    .sgst
                    .is_positive()
                    .then(|| input_ledger_label("SGST", rate, true)),
                igst_ledger: split
                    .igst
                    .is_positive()
                    .then(|| input_ledger_label("IGST", rate, false)),
                record,
            });
        }
    }

    tracing::info!(
        invoices = stats.invoices,
        lines = stats.lines,
        mismatches = stats.gst_mismatches,
        "expense mapping complete"
    );
    (mapped, stats)
}

/// `EXP{SS}{YY}{MM}{seq:04}` where `SS` is the company GSTIN state pair.
pub fn voucher_number(company_gstin: &Gstin, invoice_date: NaiveDate, seq: u32) -> String {
    format!(
        "EXP{}{}{:04}",
        company_gstin.state_digits(),
        invoice_date.format("%y%m"),
        seq
    )
}

/// Validate a mapped expense set before export: voucher numbers present,
/// amounts non-negative, totals not less than taxables.
pub fn validate_mapping(expenses: &[MappedExpense]) -> Vec<String> {
    let mut errors = Vec::new();
    for expense in expenses {
        let r = &expense.record;
        if expense.voucher_no.is_empty() {
            errors.push(format!("{}: missing voucher number", r.invoice_no));
        }
        if r.taxable_value.is_negative() {
            errors.push(format!("{}: negative taxable value", r.invoice_no));
        }
        if r.total_value < r.taxable_value {
            errors.push(format!(
                "{}: total {} below taxable {}",
                r.invoice_no, r.total_value, r.taxable_value
            ));
        }
    }
    errors
}

/// Split-by-type totals used in mapping summaries and the MIS.
pub fn expense_type_totals(
    expenses: &[MappedExpense],
) -> std::collections::BTreeMap<String, (usize, Money)> {
    let mut totals = std::collections::BTreeMap::new();
    for expense in expenses {
        let entry = totals
            .entry(expense.record.expense_type.clone())
            .or_insert((0usize, Money::ZERO));
        entry.0 += 1;
        entry.1 += expense.record.total_value;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ParsedLineItem;

    fn invoice(gstin: Option<&str>) -> ParsedInvoice {
        ParsedInvoice {
            invoice_no: "AMZ-FEE-001".into(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            gstin: gstin.map(str::to_string),
            line_items: vec![ParsedLineItem {
                expense_type: "Commission".into(),
                taxable_value: Money::from_paise(100_000),
                gst_rate: GstRate::Eighteen,
                tax_amount: Money::from_paise(18_000),
                total_value: Money::from_paise(118_000),
            }],
        }
    }

    fn company() -> Gstin {
        Gstin::new("06ABGCS4796R1ZA").unwrap()
    }

    #[test]
    fn maps_to_catalog_ledger_with_igst() {
        let (mapped, stats) =
            map_invoices(&[invoice(None)], Channel::AmazonMtr, &company());
        assert_eq!(stats.lines, 1);
        assert_eq!(stats.gst_mismatches, 0);
        let m = &mapped[0];
        assert_eq!(m.record.ledger_name, "Amazon Commission");
        assert_eq!(m.record.igst, Money::from_paise(18_000));
        assert_eq!(m.igst_ledger.as_deref(), Some("Input IGST @ 18%"));
        assert!(m.cgst_ledger.is_none());
        assert_eq!(m.record.processing_status, "processed");
    }

    #[test]
    fn voucher_number_encodes_state_and_month() {
        let n = voucher_number(
            &company(),
            NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            7,
        );
        assert_eq!(n, "EXP0625080007");
    }

    #[test]
    fn gst_mismatch_is_flagged_not_dropped() {
        let mut inv = invoice(None);
        inv.line_items[0].total_value = Money::from_paise(150_000);
        let (mapped, stats) = map_invoices(&[inv], Channel::AmazonMtr, &company());
        assert_eq!(stats.gst_mismatches, 1);
        assert_eq!(mapped[0].record.processing_status, "gst_mismatch");
    }

    #[test]
    fn intrastate_vendor_gets_split_ledgers() {
        let (mapped, _) = map_invoices(
            &[invoice(Some("06AAAAA0000A1Z5"))],
            Channel::AmazonMtr,
            &company(),
        );
        let m = &mapped[0];
        assert_eq!(m.cgst_ledger.as_deref(), Some("Input CGST @ 9%"));
        assert_eq!(m.sgst_ledger.as_deref(), Some("Input SGST @ 9%"));
        assert!(m.igst_ledger.is_none());
    }

    #[test]
    fn validation_catches_inverted_totals() {
        let mut inv = invoice(None);
        inv.line_items[0].total_value = Money::from_paise(50_000);
        let (mapped, _) = map_invoices(&[inv], Channel::AmazonMtr, &company());
        let errors = validate_mapping(&mapped);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("below taxable"));
    }
}
