//! # Workbook Writer
//!
//! Renders voucher rows into the fixed-schema X2Beta workbook: a three-row
//! company header zone, the column header row, then data from row 5.
//! Number cells use `#,##0.00`; the date column is centered; column widths
//! auto-size to the longest value, capped at 50.

use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use serde::{Deserialize, Serialize};

use gstx_core::Money;

use crate::template::TemplateEntry;
use crate::voucher::{VoucherRow, VOUCHER_HEADERS};
use crate::X2BetaError;

/// First data row (1-indexed) below the header zone.
pub const DATA_START_ROW: u32 = 5;

/// Maximum auto-sized column width.
const MAX_COLUMN_WIDTH: usize = 50;

/// Statistics for one written workbook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkbookStats {
    /// Voucher rows written.
    pub record_count: usize,
    /// Summed taxable amount.
    pub total_taxable: Money,
    /// Summed tax amount.
    pub total_tax: Money,
    /// Size of the written file in bytes.
    pub file_size: u64,
}

/// Render voucher rows to `path` under the template's header zone.
pub fn render_workbook(
    rows: &[VoucherRow],
    template: &TemplateEntry,
    gstin: &str,
    path: &Path,
) -> Result<WorkbookStats, X2BetaError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name("Sales Vouchers")
        .map_err(|e| X2BetaError::Workbook(e.to_string()))?;

    let bold = Format::new().set_bold();
    let header = Format::new().set_bold().set_align(FormatAlign::Center);
    let number = Format::new()
        .set_num_format("#,##0.00")
        .set_align(FormatAlign::Right);
    let date = Format::new().set_align(FormatAlign::Center);

    let write = |e: rust_xlsxwriter::XlsxError| X2BetaError::Workbook(e.to_string());

    // Header zone: company identity, then the fixed schema header row.
    sheet
        .write_string_with_format(0, 0, &format!("Company: {}", template.company_name), &bold)
        .map_err(write)?;
    sheet
        .write_string_with_format(1, 0, &format!("GSTIN: {gstin}"), &bold)
        .map_err(write)?;
    sheet
        .write_string(2, 0, "X2Beta Sales Import Template")
        .map_err(write)?;
    for (col, title) in VOUCHER_HEADERS.iter().enumerate() {
        sheet
            .write_string_with_format(3, col as u16, *title, &header)
            .map_err(write)?;
    }

    // Track per-column content width for auto-sizing.
    let mut widths: Vec<usize> = VOUCHER_HEADERS.iter().map(|h| h.len()).collect();
    let mut observe = |col: usize, len: usize| {
        if len > widths[col] {
            widths[col] = len;
        }
    };

    let mut stats = WorkbookStats {
        record_count: rows.len(),
        ..Default::default()
    };

    for (i, row) in rows.iter().enumerate() {
        let r = DATA_START_ROW - 1 + i as u32;
        stats.total_taxable += row.taxable_amount;
        stats.total_tax += row.cgst_amount + row.sgst_amount + row.igst_amount;

        let strings: [(u16, &str); 7] = [
            (1, &row.voucher_no),
            (2, row.voucher_type.as_str()),
            (3, &row.party_ledger),
            (4, &row.item_name),
            (8, &row.cgst_ledger),
            (10, &row.sgst_ledger),
            (12, &row.igst_ledger),
        ];
        sheet
            .write_string_with_format(r, 0, &row.date, &date)
            .map_err(write)?;
        observe(0, row.date.len());
        for (col, value) in strings {
            sheet.write_string(r, col, value).map_err(write)?;
            observe(col as usize, value.len());
        }

        sheet
            .write_number_with_format(r, 5, row.quantity as f64, &number)
            .map_err(write)?;
        let numbers: [(u16, Money); 6] = [
            (6, row.rate),
            (7, row.taxable_amount),
            (9, row.cgst_amount),
            (11, row.sgst_amount),
            (13, row.igst_amount),
            (14, row.total_amount),
        ];
        for (col, value) in numbers {
            sheet
                .write_number_with_format(r, col, value.to_f64(), &number)
                .map_err(write)?;
            observe(col as usize, value.to_string().len());
        }
        sheet.write_string(r, 15, &row.narration).map_err(write)?;
        observe(15, row.narration.len());
    }

    for (col, width) in widths.iter().enumerate() {
        let capped = (*width + 2).min(MAX_COLUMN_WIDTH);
        sheet
            .set_column_width(col as u16, capped as f64)
            .map_err(write)?;
    }

    workbook
        .save(path)
        .map_err(|e| X2BetaError::Workbook(e.to_string()))?;

    stats.file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    tracing::info!(
        path = %path.display(),
        records = stats.record_count,
        taxable = %stats.total_taxable,
        tax = %stats.total_tax,
        "voucher workbook written"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voucher::VoucherType;

    fn sample_row() -> VoucherRow {
        VoucherRow {
            date: "01-08-2025".into(),
            voucher_no: "AMZ-HR-08-0001".into(),
            voucher_type: VoucherType::Sales,
            party_ledger: "Amazon Sales - HR".into(),
            item_name: "Widget".into(),
            quantity: 1,
            rate: Money::from_paise(100_000),
            taxable_amount: Money::from_paise(100_000),
            cgst_ledger: "Output CGST @ 18%".into(),
            cgst_amount: Money::from_paise(9_000),
            sgst_ledger: "Output SGST @ 18%".into(),
            sgst_amount: Money::from_paise(9_000),
            igst_ledger: String::new(),
            igst_amount: Money::ZERO,
            total_amount: Money::from_paise(118_000),
            narration: "Sales - Widget - 2025-08".into(),
        }
    }

    #[test]
    fn writes_workbook_with_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let template = TemplateEntry {
            template_name: "X2Beta Sales Template - 06ABGCS4796R1ZA.xlsx".into(),
            company_name: "Zaggle Haryana Private Limited".into(),
            state_name: "HARYANA".into(),
        };
        let stats =
            render_workbook(&[sample_row()], &template, "06ABGCS4796R1ZA", &path).unwrap();
        assert!(path.exists());
        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.total_taxable, Money::from_paise(100_000));
        assert_eq!(stats.total_tax, Money::from_paise(18_000));
        assert!(stats.file_size > 0);
    }
}
