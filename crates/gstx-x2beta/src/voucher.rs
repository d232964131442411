//! # Voucher Mapping
//!
//! Maps pivot groups to X2Beta voucher rows. One sales voucher per pivot
//! group; expense vouchers (built in the expense crate) reuse the same row
//! shape with `VoucherType::Purchase`.

use serde::{Deserialize, Serialize};

use gstx_core::{GstRate, Money, Month};
use gstx_pivot::PivotRow;

use crate::X2BetaError;

/// Voucher classification for the ledger importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoucherType {
    /// Sales voucher.
    Sales,
    /// Purchase (expense) voucher.
    Purchase,
}

impl VoucherType {
    /// Label written to the workbook.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::Purchase => "Purchase",
        }
    }
}

impl std::fmt::Display for VoucherType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an X2Beta voucher file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherRow {
    /// Voucher date, `DD-MM-YYYY`.
    pub date: String,
    /// Voucher number.
    pub voucher_no: String,
    /// Voucher type.
    pub voucher_type: VoucherType,
    /// Party ledger account.
    pub party_ledger: String,
    /// Item name.
    pub item_name: String,
    /// Quantity.
    pub quantity: i64,
    /// Per-unit rate.
    pub rate: Money,
    /// Taxable amount.
    pub taxable_amount: Money,
    /// CGST ledger label, empty when not applicable.
    pub cgst_ledger: String,
    /// CGST amount.
    pub cgst_amount: Money,
    /// SGST ledger label, empty when not applicable.
    pub sgst_ledger: String,
    /// SGST amount.
    pub sgst_amount: Money,
    /// IGST ledger label, empty when not applicable.
    pub igst_ledger: String,
    /// IGST amount.
    pub igst_amount: Money,
    /// Total amount.
    pub total_amount: Money,
    /// Narration.
    pub narration: String,
}

/// Fixed header order of the voucher schema.
pub const VOUCHER_HEADERS: &[&str] = &[
    "Date",
    "Voucher No.",
    "Voucher Type",
    "Party Ledger",
    "Item Name",
    "Quantity",
    "Rate",
    "Taxable Amount",
    "Output CGST Ledger",
    "CGST Amount",
    "Output SGST Ledger",
    "SGST Amount",
    "Output IGST Ledger",
    "IGST Amount",
    "Total Amount",
    "Narration",
];

/// Build the output GST ledger label for a component
/// (`"Output CGST @ 9%"` carries the half rate; IGST carries the full).
pub fn output_ledger_label(component: &str, rate: GstRate, halved: bool) -> String {
    let percent = if halved {
        rate.half_bps() / 100
    } else {
        rate.bps() / 100
    };
    format!("Output {component} @ {percent}%")
}

/// Map one pivot group to its sales voucher row.
///
/// `seq` feeds the synthesized `SL{YYYYMM}{seq:04}` voucher number used
/// when the group carries no invoice number of its own.
pub fn sales_voucher_row(group: &PivotRow, month: &Month, seq: usize) -> VoucherRow {
    let voucher_no = group
        .invoice_no
        .clone()
        .unwrap_or_else(|| format!("SL{}{:04}", month.compact(), seq));

    let intrastate = group.total_cgst.is_positive();
    let interstate = group.total_igst.is_positive();
    let rate = group.gst_rate;

    let (cgst_ledger, sgst_ledger, igst_ledger) = if intrastate {
        (
            output_ledger_label("CGST", rate, false),
            output_ledger_label("SGST", rate, false),
            String::new(),
        )
    } else if interstate {
        (String::new(), String::new(), output_ledger_label("IGST", rate, false))
    } else {
        (String::new(), String::new(), String::new())
    };

    VoucherRow {
        date: month.first_day().format("%d-%m-%Y").to_string(),
        voucher_no,
        voucher_type: VoucherType::Sales,
        party_ledger: group.ledger_name.clone(),
        item_name: group.fg.clone(),
        quantity: group.total_quantity,
        rate: group
            .total_taxable
            .times_ratio(1, group.total_quantity.max(1)),
        taxable_amount: group.total_taxable,
        cgst_ledger,
        cgst_amount: group.total_cgst,
        sgst_ledger,
        sgst_amount: group.total_sgst,
        igst_ledger,
        igst_amount: group.total_igst,
        total_amount: group.total_amount(),
        narration: format!("Sales - {} - {}", group.fg, month.as_str()),
    }
}

/// Map a whole batch to voucher rows, validating each row's balance.
pub fn sales_voucher_rows(
    groups: &[PivotRow],
    month: &Month,
) -> Result<Vec<VoucherRow>, X2BetaError> {
    let rows: Vec<VoucherRow> = groups
        .iter()
        .enumerate()
        .map(|(i, group)| sales_voucher_row(group, month, i + 1))
        .collect();

    for row in &rows {
        if !sales_row_balances(row) {
            return Err(X2BetaError::Unbalanced(format!(
                "voucher {} total {} does not equal taxable {} + taxes",
                row.voucher_no, row.total_amount, row.taxable_amount
            )));
        }
    }
    Ok(rows)
}

/// Sales balancing invariant: total = taxable + cgst + sgst + igst ± 0.01.
pub fn sales_row_balances(row: &VoucherRow) -> bool {
    let expected = row.taxable_amount + row.cgst_amount + row.sgst_amount + row.igst_amount;
    row.total_amount.within(expected, 1)
}

/// Expense balancing invariant: the algebraic sum of `total_amount` across
/// a voucher group is zero ± 0.01.
pub fn expense_group_balances(rows: &[VoucherRow]) -> bool {
    let sum: Money = rows.iter().map(|r| r.total_amount).sum();
    sum.within(Money::ZERO, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(cgst: i64, sgst: i64, igst: i64) -> PivotRow {
        PivotRow {
            gstin: "06ABGCS4796R1ZA".into(),
            month: Month::new("2025-08").unwrap(),
            gst_rate: GstRate::Eighteen,
            ledger_name: "Amazon Sales - HR".into(),
            fg: "Widget".into(),
            state_code: None,
            total_quantity: 2,
            total_taxable: Money::from_paise(100_000),
            total_cgst: Money::from_paise(cgst),
            total_sgst: Money::from_paise(sgst),
            total_igst: Money::from_paise(igst),
            source_rows: 1,
            invoice_no: None,
        }
    }

    #[test]
    fn intrastate_voucher_labels_and_total() {
        let month = Month::new("2025-08").unwrap();
        let row = sales_voucher_row(&group(9_000, 9_000, 0), &month, 1);
        assert_eq!(row.cgst_ledger, "Output CGST @ 18%");
        assert_eq!(row.sgst_ledger, "Output SGST @ 18%");
        assert_eq!(row.igst_ledger, "");
        assert_eq!(row.total_amount, Money::from_paise(118_000));
        assert_eq!(row.date, "01-08-2025");
        assert_eq!(row.voucher_no, "SL2025080001");
        assert_eq!(row.narration, "Sales - Widget - 2025-08");
        assert_eq!(row.rate, Money::from_paise(50_000));
        assert!(sales_row_balances(&row));
    }

    #[test]
    fn interstate_voucher_uses_igst_ledger() {
        let month = Month::new("2025-08").unwrap();
        let row = sales_voucher_row(&group(0, 0, 18_000), &month, 1);
        assert_eq!(row.cgst_ledger, "");
        assert_eq!(row.igst_ledger, "Output IGST @ 18%");
        assert_eq!(row.total_amount, Money::from_paise(118_000));
    }

    #[test]
    fn zero_gst_leaves_ledgers_blank() {
        let month = Month::new("2025-08").unwrap();
        let row = sales_voucher_row(&group(0, 0, 0), &month, 3);
        assert_eq!(row.cgst_ledger, "");
        assert_eq!(row.igst_ledger, "");
        assert_eq!(row.total_amount, Money::from_paise(100_000));
        assert_eq!(row.voucher_no, "SL2025080003");
    }

    #[test]
    fn group_invoice_number_wins_over_synthesized() {
        let month = Month::new("2025-08").unwrap();
        let mut g = group(9_000, 9_000, 0);
        g.invoice_no = Some("AMZ-HR-08-0001".into());
        let row = sales_voucher_row(&g, &month, 1);
        assert_eq!(row.voucher_no, "AMZ-HR-08-0001");
    }

    #[test]
    fn expense_balance_checks_sum() {
        let month = Month::new("2025-08").unwrap();
        let mut a = sales_voucher_row(&group(0, 0, 0), &month, 1);
        a.total_amount = Money::from_paise(118_000);
        let mut b = a.clone();
        b.total_amount = Money::from_paise(-118_000);
        assert!(expense_group_balances(&[a.clone(), b]));
        assert!(!expense_group_balances(&[a]));
    }
}
