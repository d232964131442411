//! # Expense Voucher Export
//!
//! Expands each mapped expense into a balanced purchase voucher group:
//! a debit to the expense ledger for the taxable value, a debit per nonzero
//! input-GST component, and a credit to `{Channel} Payable` for the full
//! invoice total. The group's total amounts sum to zero by construction,
//! and the balance is still checked before anything is written.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use gstx_core::{Channel, Money, Month};
use gstx_x2beta::voucher::{expense_group_balances, VoucherRow, VoucherType};
use gstx_x2beta::writer::render_workbook;
use gstx_x2beta::{TemplateRegistry, X2BetaError};

use crate::mapper::MappedExpense;
use crate::ExpenseError;

/// Metadata for one expense export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseExportInfo {
    /// Path of the written workbook.
    pub file_path: PathBuf,
    /// Template name used.
    pub template_name: String,
    /// Voucher lines written.
    pub record_count: usize,
    /// Summed taxable amounts.
    pub total_taxable: Money,
    /// Summed input tax.
    pub total_tax: Money,
    /// Size of the written file in bytes.
    pub file_size: u64,
    /// Distinct expense types covered.
    pub expense_types: Vec<String>,
    /// Export status recorded with the registry row.
    pub export_status: String,
}

/// Expand one expense into its 3–5 voucher lines.
pub fn expense_voucher_lines(expense: &MappedExpense) -> Vec<VoucherRow> {
    let r = &expense.record;
    let date = r.invoice_date.format("%d-%m-%Y").to_string();
    let base = |party: &str, item: String, narration: String, total: Money| VoucherRow {
        date: date.clone(),
        voucher_no: expense.voucher_no.clone(),
        voucher_type: VoucherType::Purchase,
        party_ledger: party.to_string(),
        item_name: item,
        quantity: 1,
        rate: total,
        taxable_amount: Money::ZERO,
        cgst_ledger: String::new(),
        cgst_amount: Money::ZERO,
        sgst_ledger: String::new(),
        sgst_amount: Money::ZERO,
        igst_ledger: String::new(),
        igst_amount: Money::ZERO,
        total_amount: total,
        narration,
    };

    let mut lines = Vec::with_capacity(5);

    // Expense debit.
    let mut head = base(
        &r.ledger_name,
        format!("{} - {}", r.expense_type, r.invoice_no),
        format!(
            "{} expense from {} - Invoice: {}",
            r.expense_type, r.channel, r.invoice_no
        ),
        r.taxable_value,
    );
    head.taxable_amount = r.taxable_value;
    lines.push(head);

    // Input GST debits.
    if r.cgst.is_positive() {
        let ledger = expense.cgst_ledger.clone().unwrap_or_default();
        let mut line = base(
            &ledger,
            format!("Input CGST - {}", r.invoice_no),
            format!("Input CGST on {}", r.expense_type),
            r.cgst,
        );
        line.cgst_ledger = ledger;
        line.cgst_amount = r.cgst;
        lines.push(line);
    }
    if r.sgst.is_positive() {
        let ledger = expense.sgst_ledger.clone().unwrap_or_default();
        let mut line = base(
            &ledger,
            format!("Input SGST - {}", r.invoice_no),
            format!("Input SGST on {}", r.expense_type),
            r.sgst,
        );
        line.sgst_ledger = ledger;
        line.sgst_amount = r.sgst;
        lines.push(line);
    }
    if r.igst.is_positive() {
        let ledger = expense.igst_ledger.clone().unwrap_or_default();
        let mut line = base(
            &ledger,
            format!("Input IGST - {}", r.invoice_no),
            format!("Input IGST on {}", r.expense_type),
            r.igst,
        );
        line.igst_ledger = ledger;
        line.igst_amount = r.igst;
        lines.push(line);
    }

    // Payable credit for the full invoice amount.
    let channel_title = title_from_family(&r.channel);
    lines.push(base(
        &format!("{channel_title} Payable"),
        format!("Payable - {}", r.invoice_no),
        format!("Amount payable to {channel_title} - Invoice: {}", r.invoice_no),
        -r.total_value,
    ));

    lines
}

/// Export mapped expenses to an X2Beta workbook.
///
/// File naming: `{channel}_expenses_{gstin}_{month}_x2beta_{YYYYMMDD_HHMMSS}.xlsx`.
pub fn export_expenses(
    expenses: &[MappedExpense],
    registry: &TemplateRegistry,
    channel: Channel,
    gstin: &str,
    month: &Month,
    export_dir: &Path,
) -> Result<ExpenseExportInfo, ExpenseError> {
    let template = registry.require_expense(gstin)?;

    let mut rows = Vec::new();
    let mut total_taxable = Money::ZERO;
    let mut total_tax = Money::ZERO;
    let mut expense_types: Vec<String> = Vec::new();

    for expense in expenses {
        let group = expense_voucher_lines(expense);
        if !expense_group_balances(&group) {
            return Err(X2BetaError::Unbalanced(format!(
                "expense voucher {} does not sum to zero",
                expense.voucher_no
            ))
            .into());
        }
        total_taxable += expense.record.taxable_value;
        total_tax += expense.record.cgst + expense.record.sgst + expense.record.igst;
        if !expense_types.contains(&expense.record.expense_type) {
            expense_types.push(expense.record.expense_type.clone());
        }
        rows.extend(group);
    }

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let file_name = format!(
        "{}_expenses_{}_{}_x2beta_{}.xlsx",
        channel.family(),
        gstin,
        month.as_str(),
        stamp
    );
    let path = export_dir.join(file_name);
    let stats = render_workbook(&rows, &template, gstin, &path)?;

    Ok(ExpenseExportInfo {
        file_path: path,
        template_name: template.template_name,
        record_count: stats.record_count,
        total_taxable,
        total_tax,
        file_size: stats.file_size,
        expense_types,
        export_status: "success".into(),
    })
}

/// Merge sales voucher rows with expense voucher rows into one combined
/// workbook (`…_combined_…`), preserving each side's ordering.
pub fn export_combined(
    sales_rows: &[VoucherRow],
    expenses: &[MappedExpense],
    registry: &TemplateRegistry,
    channel: Channel,
    gstin: &str,
    month: &Month,
    export_dir: &Path,
) -> Result<ExpenseExportInfo, ExpenseError> {
    let template = registry.require(gstin)?.clone();

    let mut rows: Vec<VoucherRow> = sales_rows.to_vec();
    for expense in expenses {
        rows.extend(expense_voucher_lines(expense));
    }

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let file_name = format!(
        "{}_combined_{}_{}_x2beta_{}.xlsx",
        channel.family(),
        gstin,
        month.as_str(),
        stamp
    );
    let path = export_dir.join(file_name);
    let stats = render_workbook(&rows, &template, gstin, &path)?;

    Ok(ExpenseExportInfo {
        file_path: path,
        template_name: template.template_name,
        record_count: stats.record_count,
        total_taxable: stats.total_taxable,
        total_tax: stats.total_tax,
        file_size: stats.file_size,
        expense_types: Vec::new(),
        export_status: "success".into(),
    })
}

fn title_from_family(family: &str) -> String {
    let mut chars = family.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::SellerInvoiceRecord;
    use chrono::NaiveDate;
    use gstx_core::GstRate;
    use uuid::Uuid;

    fn expense(cgst: i64, sgst: i64, igst: i64) -> MappedExpense {
        let taxable = 100_000;
        MappedExpense {
            record: SellerInvoiceRecord {
                id: Uuid::new_v4(),
                channel: "amazon".into(),
                gstin: None,
                invoice_no: "AMZ-FEE-001".into(),
                invoice_date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
                expense_type: "Commission".into(),
                taxable_value: Money::from_paise(taxable),
                gst_rate: GstRate::Eighteen,
                cgst: Money::from_paise(cgst),
                sgst: Money::from_paise(sgst),
                igst: Money::from_paise(igst),
                total_value: Money::from_paise(taxable + cgst + sgst + igst),
                ledger_name: "Amazon Commission".into(),
                processing_status: "processed".into(),
            },
            cgst_ledger: (cgst > 0).then(|| "Input CGST @ 9%".into()),
            sgst_ledger: (sgst > 0).then(|| "Input SGST @ 9%".into()),
            igst_ledger: (igst > 0).then(|| "Input IGST @ 18%".into()),
            voucher_no: "EXP0625080001".into(),
        }
    }

    #[test]
    fn igst_expense_expands_to_three_balanced_lines() {
        let lines = expense_voucher_lines(&expense(0, 0, 18_000));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].total_amount, Money::from_paise(100_000));
        assert_eq!(lines[1].total_amount, Money::from_paise(18_000));
        assert_eq!(lines[2].total_amount, Money::from_paise(-118_000));
        assert_eq!(lines[2].party_ledger, "Amazon Payable");
        assert!(expense_group_balances(&lines));
    }

    #[test]
    fn intrastate_expense_expands_to_four_lines() {
        let lines = expense_voucher_lines(&expense(9_000, 9_000, 0));
        assert_eq!(lines.len(), 4);
        assert!(expense_group_balances(&lines));
    }

    #[test]
    fn export_writes_named_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let month = Month::new("2025-08").unwrap();
        let info = export_expenses(
            &[expense(0, 0, 18_000)],
            &TemplateRegistry::with_defaults(),
            Channel::AmazonMtr,
            "06ABGCS4796R1ZA",
            &month,
            dir.path(),
        )
        .unwrap();
        let name = info.file_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("amazon_expenses_06ABGCS4796R1ZA_2025-08_x2beta_"));
        assert!(name.ends_with(".xlsx"));
        assert!(info.file_path.exists());
        assert_eq!(info.record_count, 3);
        assert_eq!(info.total_tax, Money::from_paise(18_000));
        assert_eq!(info.expense_types, vec!["Commission".to_string()]);
    }
}
