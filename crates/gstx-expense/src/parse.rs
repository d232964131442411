//! # Seller Invoice Parsing
//!
//! Extraction from already-extracted invoice text (the PDF text layer is an
//! external collaborator) and from spreadsheet invoices. Field extraction
//! is a regex family per field; line items come from a fixed catalog of fee
//! patterns with a generic tabular fallback.

use std::path::Path;
use std::sync::OnceLock;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use gstx_core::temporal::parse_flexible_date;
use gstx_core::{GstRate, Money};

use crate::rules::normalize_expense_type;
use crate::ExpenseError;

/// One extracted fee line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedLineItem {
    /// Standardized expense type.
    pub expense_type: String,
    /// Taxable value.
    pub taxable_value: Money,
    /// GST rate; fee invoices default to 18%.
    pub gst_rate: GstRate,
    /// Tax amount (`total − taxable`).
    pub tax_amount: Money,
    /// Invoice total for the line.
    pub total_value: Money,
}

/// A parsed seller invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedInvoice {
    /// Invoice number.
    pub invoice_no: String,
    /// Invoice date.
    pub invoice_date: NaiveDate,
    /// Party (vendor) GSTIN, when printed.
    pub gstin: Option<String>,
    /// Extracted fee lines.
    pub line_items: Vec<ParsedLineItem>,
}

impl ParsedInvoice {
    /// Sum of taxable values.
    pub fn total_taxable(&self) -> Money {
        self.line_items.iter().map(|l| l.taxable_value).sum()
    }

    /// Sum of line totals.
    pub fn total_amount(&self) -> Money {
        self.line_items.iter().map(|l| l.total_value).sum()
    }
}

/// Named fee patterns: each captures `(taxable, total)`.
const FEE_TYPES: &[&str] = &[
    "Closing Fee",
    "Shipping Fee",
    "Commission",
    "Fulfillment Fee",
    "Storage Fee",
    "Advertising Fee",
    "Refund Processing Fee",
    "Return Processing Fee",
    "Payment Gateway Fee",
];

fn invoice_no_regexes() -> &'static Vec<Regex> {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        [
            r"(?i)Invoice\s+(?:No\.?|Number)\s*:?\s*([A-Z0-9][A-Z0-9\-]+)",
            r"(?i)Bill\s+(?:No\.?|Number)\s*:?\s*([A-Z0-9][A-Z0-9\-]+)",
            r"(?i)Invoice\s+([A-Z0-9][A-Z0-9\-]{3,})",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn date_regexes() -> &'static Vec<Regex> {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        [
            r"(?i)Invoice\s+Date\s*:?\s*(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})",
            r"(?i)Bill\s+Date\s*:?\s*(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})",
            r"(?i)Date\s*:?\s*(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})",
            r"(?i)Date\s*:?\s*(\d{4}-\d{2}-\d{2})",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn gstin_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r"(?i)GSTIN\s*:?\s*([0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][0-9A-Z][Z][0-9A-Z])")
            .expect("gstin pattern")
    })
}

fn bare_gstin_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r"\b([0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][0-9A-Z][Z][0-9A-Z])\b")
            .expect("bare gstin pattern")
    })
}

/// Parse a seller fee invoice from extracted text.
pub fn parse_invoice_text(text: &str, source: &str) -> Result<ParsedInvoice, ExpenseError> {
    let invoice_no = invoice_no_regexes()
        .iter()
        .find_map(|re| re.captures(text))
        .map(|c| c[1].trim().to_string())
        .ok_or_else(|| ExpenseError::Invalid(format!("invoice number not found in {source}")))?;

    let invoice_date = date_regexes()
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| parse_flexible_date(&c[1]))
        .ok_or_else(|| ExpenseError::Invalid(format!("invoice date not found in {source}")))?;

    let gstin = gstin_regex()
        .captures(text)
        .map(|c| c[1].to_uppercase());

    let mut line_items = extract_named_fee_lines(text);
    if line_items.is_empty() {
        line_items = extract_generic_lines(text);
    }
    if line_items.is_empty() {
        return Err(ExpenseError::Invalid(format!(
            "no line items found in {source}"
        )));
    }

    Ok(ParsedInvoice {
        invoice_no,
        invoice_date,
        gstin,
        line_items,
    })
}

fn extract_named_fee_lines(text: &str) -> Vec<ParsedLineItem> {
    let mut items = Vec::new();
    for fee in FEE_TYPES {
        let pattern = format!(
            r"(?i){}\s*[^0-9\n]*([0-9][0-9,]*\.?\d*)\s+[^0-9\n]*([0-9][0-9,]*\.?\d*)",
            fee.replace(' ', r"\s+")
        );
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        for captures in re.captures_iter(text) {
            let Some(taxable) = parse_amount(&captures[1]) else {
                continue;
            };
            let Some(total) = parse_amount(&captures[2]) else {
                continue;
            };
            items.push(line_item(fee, taxable, total));
        }
    }
    items
}

/// Fallback: `description  taxable  total` lines with trailing numbers.
fn extract_generic_lines(text: &str) -> Vec<ParsedLineItem> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    let re = CELL.get_or_init(|| {
        Regex::new(r"^(.+?)\s+([0-9][0-9,]*\.?\d*)\s+([0-9][0-9,]*\.?\d*)\s*$")
            .expect("generic line pattern")
    });

    let mut items = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || is_header_line(line) {
            continue;
        }
        let Some(captures) = re.captures(line) else {
            continue;
        };
        let Some(expense_type) = classify_description(&captures[1]) else {
            continue;
        };
        let (Some(taxable), Some(total)) =
            (parse_amount(&captures[2]), parse_amount(&captures[3]))
        else {
            continue;
        };
        items.push(line_item(&expense_type, taxable, total));
    }
    items
}

fn line_item(expense_type: &str, taxable: Money, total: Money) -> ParsedLineItem {
    ParsedLineItem {
        expense_type: expense_type.to_string(),
        taxable_value: taxable,
        gst_rate: GstRate::Eighteen,
        tax_amount: total - taxable,
        total_value: total,
    }
}

fn is_header_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["description", "amount", "total", "gst", "particulars"]
        .iter()
        .any(|h| lower.starts_with(h))
}

/// Classify a free-form fee description, `None` when it names no known fee.
fn classify_description(description: &str) -> Option<String> {
    let lower = description.to_lowercase();
    const KEYWORDS: &[(&str, &str)] = &[
        ("closing", "Closing Fee"),
        ("shipping", "Shipping Fee"),
        ("freight", "Shipping Fee"),
        ("commission", "Commission"),
        ("referral", "Commission"),
        ("fulfillment", "Fulfillment Fee"),
        ("fulfilment", "Fulfillment Fee"),
        ("storage", "Storage Fee"),
        ("warehouse", "Storage Fee"),
        ("advertis", "Advertising Fee"),
        ("promotion", "Advertising Fee"),
        ("refund", "Refund Processing Fee"),
        ("return", "Return Processing Fee"),
        ("gateway", "Payment Gateway Fee"),
        ("payment", "Payment Gateway Fee"),
        ("subscription", "Subscription Fee"),
    ];
    KEYWORDS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, fee)| fee.to_string())
}

fn parse_amount(raw: &str) -> Option<Money> {
    Money::parse(&raw.replace(',', ""))
}

/// Parse a spreadsheet seller invoice: header cells carry the invoice
/// number/date/GSTIN, a tabular zone carries description + amounts.
pub fn parse_spreadsheet_invoice(path: &Path) -> Result<ParsedInvoice, ExpenseError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ExpenseError::Spreadsheet {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ExpenseError::Spreadsheet {
            path: path.display().to_string(),
            message: "workbook has no sheets".into(),
        })?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ExpenseError::Spreadsheet {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    // Flatten the sheet to text lines and reuse the text parser: the cell
    // matrix is just a pre-tokenized page.
    let text: String = range
        .rows()
        .map(|cells| {
            cells
                .iter()
                .map(cell_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut parsed = parse_invoice_text(&text, &path.display().to_string())?;
    // Spreadsheets often carry the GSTIN without the label.
    if parsed.gstin.is_none() {
        parsed.gstin = bare_gstin_regex()
            .captures(&text)
            .map(|c| c[1].to_uppercase());
    }
    for item in &mut parsed.line_items {
        item.expense_type = normalize_expense_type(&item.expense_type);
    }
    Ok(parsed)
}

fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{f:.2}")
            }
        }
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Amazon Seller Services
Invoice No: AMZ-FEE-2025-001
Invoice Date: 05-08-2025
GSTIN: 29AABCA1234B1Z5

Particulars
Closing Fee      100.00    118.00
Commission      1000.00   1180.00
";

    #[test]
    fn extracts_fields_and_named_fees() {
        let parsed = parse_invoice_text(SAMPLE, "sample").unwrap();
        assert_eq!(parsed.invoice_no, "AMZ-FEE-2025-001");
        assert_eq!(
            parsed.invoice_date,
            NaiveDate::from_ymd_opt(2025, 8, 5).unwrap()
        );
        assert_eq!(parsed.gstin.as_deref(), Some("29AABCA1234B1Z5"));
        assert_eq!(parsed.line_items.len(), 2);

        let commission = parsed
            .line_items
            .iter()
            .find(|l| l.expense_type == "Commission")
            .unwrap();
        assert_eq!(commission.taxable_value, Money::from_paise(100_000));
        assert_eq!(commission.total_value, Money::from_paise(118_000));
        assert_eq!(commission.tax_amount, Money::from_paise(18_000));
    }

    #[test]
    fn generic_fallback_classifies_descriptions() {
        let text = "\
Invoice No: FK-77
Date: 01/08/2025

Referral charges for August  500.00  590.00
Unrelated line without numbers
";
        let parsed = parse_invoice_text(text, "fk").unwrap();
        assert_eq!(parsed.line_items.len(), 1);
        assert_eq!(parsed.line_items[0].expense_type, "Commission");
    }

    #[test]
    fn missing_invoice_number_is_invalid() {
        let err = parse_invoice_text("Date: 01/08/2025\nClosing Fee 1 2", "x").unwrap_err();
        assert!(matches!(err, ExpenseError::Invalid(_)));
    }
}
