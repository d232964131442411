//! # MIS Report Generation
//!
//! The management view derived per `(run, channel, gstin, month)`: sales
//! performance, expense breakdown, GST position, profitability, and a data
//! quality score. Reports export as a flat CSV row, a styled Excel summary
//! sheet, or a database record (the store's concern).

use std::path::Path;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};

use gstx_core::{Channel, Money, Month, RunId};
use gstx_expense::MappedExpense;
use gstx_pivot::{PivotRow, PivotStats};

use crate::AuditError;

/// Sales performance metrics from the pivot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SalesMetrics {
    /// Gross sales (taxable totals).
    pub total_sales: Money,
    /// Taxable total of return-flagged rows.
    pub total_returns: Money,
    /// Sales net of returns.
    pub net_sales: Money,
    /// Source transactions aggregated.
    pub total_transactions: usize,
    /// Distinct Final Goods sold.
    pub total_skus: usize,
    /// Units sold.
    pub total_quantity: i64,
    /// Net sales per transaction.
    pub average_order_value: Money,
}

/// Expense breakdown from mapped seller invoices.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExpenseMetrics {
    /// All expenses.
    pub total_expenses: Money,
    /// Commission bucket.
    pub commission: Money,
    /// Shipping bucket.
    pub shipping: Money,
    /// Fulfillment bucket.
    pub fulfillment: Money,
    /// Advertising bucket.
    pub advertising: Money,
    /// Storage bucket.
    pub storage: Money,
    /// Everything else.
    pub other: Money,
}

/// GST position: output vs input.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GstMetrics {
    /// GST collected on sales.
    pub net_gst_output: Money,
    /// GST paid on expenses (input credit).
    pub net_gst_input: Money,
    /// Net payable (`output − input`).
    pub gst_liability: Money,
    /// Output CGST component.
    pub cgst: Money,
    /// Output SGST component.
    pub sgst: Money,
    /// Output IGST component.
    pub igst: Money,
}

/// Profitability metrics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProfitabilityMetrics {
    /// Net sales minus total expenses.
    pub gross_profit: Money,
    /// Gross profit over net sales, percent (0 when net sales are 0).
    pub profit_margin_percent: f64,
    /// Net sales per transaction.
    pub revenue_per_transaction: Money,
    /// Expenses per transaction.
    pub cost_per_transaction: Money,
    /// Returns over gross sales, percent.
    pub return_rate_percent: f64,
}

/// The complete MIS report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MisReport {
    /// Run the report covers.
    pub run_id: RunId,
    /// Channel.
    pub channel: Channel,
    /// Company GSTIN.
    pub gstin: String,
    /// Month.
    pub month: Month,
    /// Sales metrics.
    pub sales: SalesMetrics,
    /// Expense metrics.
    pub expenses: ExpenseMetrics,
    /// GST metrics.
    pub gst: GstMetrics,
    /// Profitability metrics.
    pub profitability: ProfitabilityMetrics,
    /// Data quality score in `[0, 100]`.
    pub data_quality_score: f64,
    /// Exceptions recorded during the run.
    pub exception_count: usize,
    /// Approval requests raised during the run.
    pub approval_count: usize,
    /// Generation time.
    pub created_at: DateTime<Utc>,
}

impl MisReport {
    /// Build the report from the run's stage outputs.
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        run_id: RunId,
        channel: Channel,
        gstin: impl Into<String>,
        month: Month,
        pivot: &[PivotRow],
        pivot_stats: &PivotStats,
        expenses: &[MappedExpense],
        exception_count: usize,
        approval_count: usize,
    ) -> Self {
        let sales = sales_metrics(pivot, pivot_stats);
        let expense_metrics = expense_metrics(expenses);
        let gst = gst_metrics(pivot, expenses);
        let profitability = profitability_metrics(&sales, &expense_metrics);
        let total_records = pivot_stats.input_rows + expenses.len();
        let data_quality_score =
            data_quality_score(total_records, exception_count, approval_count);

        Self {
            run_id,
            channel,
            gstin: gstin.into(),
            month,
            sales,
            expenses: expense_metrics,
            gst,
            profitability,
            data_quality_score,
            exception_count,
            approval_count,
            created_at: Utc::now(),
        }
    }
}

fn sales_metrics(pivot: &[PivotRow], stats: &PivotStats) -> SalesMetrics {
    let total_sales: Money = pivot.iter().map(|r| r.total_taxable).sum();
    let total_returns = stats.return_taxable;
    let net_sales = total_sales - total_returns;
    let total_transactions: usize = pivot.iter().map(|r| r.source_rows).sum();
    let total_skus = stats.unique_fgs;
    let total_quantity: i64 = pivot.iter().map(|r| r.total_quantity).sum();
    SalesMetrics {
        total_sales,
        total_returns,
        net_sales,
        total_transactions,
        total_skus,
        total_quantity,
        average_order_value: net_sales.times_ratio(1, total_transactions.max(1) as i64),
    }
}

fn expense_metrics(expenses: &[MappedExpense]) -> ExpenseMetrics {
    let mut m = ExpenseMetrics::default();
    for expense in expenses {
        let total = expense.record.total_value;
        m.total_expenses += total;
        match expense.record.expense_type.as_str() {
            "Commission" => m.commission += total,
            "Shipping Fee" | "Collection Fee" => m.shipping += total,
            "Fulfillment Fee" => m.fulfillment += total,
            "Advertising Fee" => m.advertising += total,
            "Storage Fee" => m.storage += total,
            _ => m.other += total,
        }
    }
    m
}

fn gst_metrics(pivot: &[PivotRow], expenses: &[MappedExpense]) -> GstMetrics {
    let cgst: Money = pivot.iter().map(|r| r.total_cgst).sum();
    let sgst: Money = pivot.iter().map(|r| r.total_sgst).sum();
    let igst: Money = pivot.iter().map(|r| r.total_igst).sum();
    let net_gst_output = cgst + sgst + igst;
    let net_gst_input: Money = expenses
        .iter()
        .map(|e| e.record.cgst + e.record.sgst + e.record.igst)
        .sum();
    GstMetrics {
        net_gst_output,
        net_gst_input,
        gst_liability: net_gst_output - net_gst_input,
        cgst,
        sgst,
        igst,
    }
}

fn profitability_metrics(sales: &SalesMetrics, expenses: &ExpenseMetrics) -> ProfitabilityMetrics {
    let gross_profit = sales.net_sales - expenses.total_expenses;
    let profit_margin_percent = if sales.net_sales.is_positive() {
        gross_profit.paise() as f64 * 100.0 / sales.net_sales.paise() as f64
    } else {
        0.0
    };
    let txns = sales.total_transactions.max(1) as i64;
    let return_rate_percent = if sales.total_sales.is_positive() {
        sales.total_returns.paise() as f64 * 100.0 / sales.total_sales.paise() as f64
    } else {
        0.0
    };
    ProfitabilityMetrics {
        gross_profit,
        profit_margin_percent,
        revenue_per_transaction: sales.net_sales.times_ratio(1, txns),
        cost_per_transaction: expenses.total_expenses.times_ratio(1, txns),
        return_rate_percent,
    }
}

/// `max(0, 100 − 100 · issues / records)`, 100 for an empty run.
pub fn data_quality_score(
    total_records: usize,
    exception_count: usize,
    approval_count: usize,
) -> f64 {
    if total_records == 0 {
        return 100.0;
    }
    let issues = (exception_count + approval_count) as f64;
    (100.0 - issues * 100.0 / total_records as f64).max(0.0)
}

/// Month-over-month growth rate with the old-zero convention:
/// `old == 0` → 100 when `new > 0`, else 0.
pub fn comparative_growth(old: Money, new: Money) -> f64 {
    if old.is_zero() {
        return if new.is_positive() { 100.0 } else { 0.0 };
    }
    (new.paise() - old.paise()) as f64 * 100.0 / old.paise() as f64
}

/// Export the report as a flat single-row CSV.
pub fn export_mis_csv(report: &MisReport, path: &Path) -> Result<(), AuditError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "run_id",
        "channel",
        "gstin",
        "month",
        "total_sales",
        "total_returns",
        "net_sales",
        "total_transactions",
        "total_skus",
        "total_quantity",
        "average_order_value",
        "total_expenses",
        "commission_expenses",
        "shipping_expenses",
        "fulfillment_expenses",
        "advertising_expenses",
        "storage_expenses",
        "other_expenses",
        "net_gst_output",
        "net_gst_input",
        "gst_liability",
        "gross_profit",
        "profit_margin",
        "return_rate",
        "data_quality_score",
        "exception_count",
        "approval_count",
    ])?;
    writer.write_record([
        report.run_id.to_string(),
        report.channel.as_str().to_string(),
        report.gstin.clone(),
        report.month.as_str().to_string(),
        report.sales.total_sales.to_string(),
        report.sales.total_returns.to_string(),
        report.sales.net_sales.to_string(),
        report.sales.total_transactions.to_string(),
        report.sales.total_skus.to_string(),
        report.sales.total_quantity.to_string(),
        report.sales.average_order_value.to_string(),
        report.expenses.total_expenses.to_string(),
        report.expenses.commission.to_string(),
        report.expenses.shipping.to_string(),
        report.expenses.fulfillment.to_string(),
        report.expenses.advertising.to_string(),
        report.expenses.storage.to_string(),
        report.expenses.other.to_string(),
        report.gst.net_gst_output.to_string(),
        report.gst.net_gst_input.to_string(),
        report.gst.gst_liability.to_string(),
        report.profitability.gross_profit.to_string(),
        format!("{:.2}", report.profitability.profit_margin_percent),
        format!("{:.2}", report.profitability.return_rate_percent),
        format!("{:.2}", report.data_quality_score),
        report.exception_count.to_string(),
        report.approval_count.to_string(),
    ])?;
    writer.flush()?;
    Ok(())
}

/// Export the report as a single-sheet Excel summary with section headers.
pub fn export_mis_excel(report: &MisReport, path: &Path) -> Result<(), AuditError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name("MIS Summary")
        .map_err(|e| AuditError::Workbook(e.to_string()))?;

    let section = Format::new().set_bold().set_background_color(0xD9E1F2);
    let bold = Format::new().set_bold();
    let write = |e: rust_xlsxwriter::XlsxError| AuditError::Workbook(e.to_string());

    let mut row: u32 = 0;
    let header = |sheet: &mut rust_xlsxwriter::Worksheet,
                  row: &mut u32,
                  title: &str|
     -> Result<(), AuditError> {
        sheet
            .write_string_with_format(*row, 0, title, &section)
            .map_err(write)?;
        *row += 1;
        Ok(())
    };
    let pair = |sheet: &mut rust_xlsxwriter::Worksheet,
                row: &mut u32,
                label: &str,
                value: String|
     -> Result<(), AuditError> {
        sheet.write_string(*row, 0, label).map_err(write)?;
        sheet.write_string(*row, 1, &value).map_err(write)?;
        *row += 1;
        Ok(())
    };

    sheet
        .write_string_with_format(row, 0, "MIS Report", &bold)
        .map_err(write)?;
    row += 1;
    pair(sheet, &mut row, "Run", report.run_id.to_string())?;
    pair(sheet, &mut row, "Channel", report.channel.as_str().into())?;
    pair(sheet, &mut row, "GSTIN", report.gstin.clone())?;
    pair(sheet, &mut row, "Month", report.month.as_str().into())?;
    row += 1;

    header(sheet, &mut row, "Sales")?;
    pair(sheet, &mut row, "Total Sales", report.sales.total_sales.to_string())?;
    pair(sheet, &mut row, "Total Returns", report.sales.total_returns.to_string())?;
    pair(sheet, &mut row, "Net Sales", report.sales.net_sales.to_string())?;
    pair(sheet, &mut row, "Transactions", report.sales.total_transactions.to_string())?;
    pair(sheet, &mut row, "Quantity", report.sales.total_quantity.to_string())?;
    pair(
        sheet,
        &mut row,
        "Average Order Value",
        report.sales.average_order_value.to_string(),
    )?;
    row += 1;

    header(sheet, &mut row, "Expenses")?;
    pair(sheet, &mut row, "Total Expenses", report.expenses.total_expenses.to_string())?;
    pair(sheet, &mut row, "Commission", report.expenses.commission.to_string())?;
    pair(sheet, &mut row, "Shipping", report.expenses.shipping.to_string())?;
    pair(sheet, &mut row, "Fulfillment", report.expenses.fulfillment.to_string())?;
    pair(sheet, &mut row, "Advertising", report.expenses.advertising.to_string())?;
    pair(sheet, &mut row, "Storage", report.expenses.storage.to_string())?;
    pair(sheet, &mut row, "Other", report.expenses.other.to_string())?;
    row += 1;

    header(sheet, &mut row, "GST")?;
    pair(sheet, &mut row, "Output GST", report.gst.net_gst_output.to_string())?;
    pair(sheet, &mut row, "Input GST", report.gst.net_gst_input.to_string())?;
    pair(sheet, &mut row, "GST Liability", report.gst.gst_liability.to_string())?;
    row += 1;

    header(sheet, &mut row, "Profitability & Quality")?;
    pair(sheet, &mut row, "Gross Profit", report.profitability.gross_profit.to_string())?;
    pair(
        sheet,
        &mut row,
        "Profit Margin %",
        format!("{:.2}", report.profitability.profit_margin_percent),
    )?;
    pair(
        sheet,
        &mut row,
        "Return Rate %",
        format!("{:.2}", report.profitability.return_rate_percent),
    )?;
    pair(
        sheet,
        &mut row,
        "Data Quality Score",
        format!("{:.2}", report.data_quality_score),
    )?;
    pair(sheet, &mut row, "Exceptions", report.exception_count.to_string())?;
    pair(sheet, &mut row, "Approvals", report.approval_count.to_string())?;

    sheet.set_column_width(0, 24).map_err(write)?;
    sheet.set_column_width(1, 20).map_err(write)?;

    workbook
        .save(path)
        .map_err(|e| AuditError::Workbook(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::GstRate;

    fn pivot_row(taxable: i64, cgst: i64, sgst: i64, igst: i64, rows: usize) -> PivotRow {
        PivotRow {
            gstin: "06ABGCS4796R1ZA".into(),
            month: Month::new("2025-08").unwrap(),
            gst_rate: GstRate::Eighteen,
            ledger_name: "Amazon Sales - HR".into(),
            fg: "Widget".into(),
            state_code: None,
            total_quantity: rows as i64,
            total_taxable: Money::from_paise(taxable),
            total_cgst: Money::from_paise(cgst),
            total_sgst: Money::from_paise(sgst),
            total_igst: Money::from_paise(igst),
            source_rows: rows,
            invoice_no: None,
        }
    }

    fn report() -> MisReport {
        let pivot = vec![pivot_row(1_000_000, 90_000, 90_000, 0, 10)];
        let stats = PivotStats {
            input_rows: 10,
            unique_fgs: 1,
            ..Default::default()
        };
        MisReport::generate(
            RunId::new(),
            Channel::AmazonMtr,
            "06ABGCS4796R1ZA",
            Month::new("2025-08").unwrap(),
            &pivot,
            &stats,
            &[],
            2,
            1,
        )
    }

    #[test]
    fn sales_and_gst_metrics() {
        let r = report();
        assert_eq!(r.sales.total_sales, Money::from_paise(1_000_000));
        assert_eq!(r.sales.total_transactions, 10);
        assert_eq!(r.sales.average_order_value, Money::from_paise(100_000));
        assert_eq!(r.gst.net_gst_output, Money::from_paise(180_000));
        assert_eq!(r.gst.gst_liability, Money::from_paise(180_000));
    }

    #[test]
    fn quality_score_clamps_at_zero() {
        assert_eq!(data_quality_score(10, 2, 1), 70.0);
        assert_eq!(data_quality_score(2, 5, 0), 0.0);
        assert_eq!(data_quality_score(0, 0, 0), 100.0);
    }

    #[test]
    fn profitability_with_zero_denominators() {
        let sales = SalesMetrics::default();
        let expenses = ExpenseMetrics::default();
        let p = profitability_metrics(&sales, &expenses);
        assert_eq!(p.profit_margin_percent, 0.0);
        assert_eq!(p.return_rate_percent, 0.0);
    }

    #[test]
    fn growth_rate_conventions() {
        assert_eq!(
            comparative_growth(Money::ZERO, Money::from_paise(100)),
            100.0
        );
        assert_eq!(comparative_growth(Money::ZERO, Money::ZERO), 0.0);
        assert_eq!(
            comparative_growth(Money::from_paise(200), Money::from_paise(300)),
            50.0
        );
        assert_eq!(
            comparative_growth(Money::from_paise(200), Money::from_paise(100)),
            -50.0
        );
    }

    #[test]
    fn csv_export_writes_one_data_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mis.csv");
        export_mis_csv(&report(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("amazon_mtr"));
    }

    #[test]
    fn excel_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mis.xlsx");
        export_mis_excel(&report(), &path).unwrap();
        assert!(path.exists());
    }
}
