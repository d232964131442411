//! # gstx-expense — Seller Invoice & Expense Processing
//!
//! The purchase-side mirror of the sales pipeline:
//!
//! 1. **Parse** — extract invoice number, date, party GSTIN, and fee line
//!    items from seller invoice text or spreadsheets.
//! 2. **Map** — resolve `(channel, expense type)` to an expense ledger via
//!    the built-in rule catalog, split GST for input credit, and assign
//!    `EXP{SS}{YY}{MM}{seq}` voucher numbers.
//! 3. **Export** — expand each expense into a balanced 3–5 line purchase
//!    voucher group (expense debit, input-GST debits, payable credit) and
//!    render to X2Beta, optionally merged with the run's sales workbook.

pub mod exporter;
pub mod mapper;
pub mod parse;
pub mod rules;

pub use exporter::{export_combined, export_expenses, expense_voucher_lines, ExpenseExportInfo};
pub use mapper::{map_invoices, MappedExpense, SellerInvoiceRecord};
pub use parse::{parse_invoice_text, parse_spreadsheet_invoice, ParsedInvoice, ParsedLineItem};
pub use rules::{expense_rule_for, normalize_expense_type, ExpenseRule, GstSplitAmounts};

use thiserror::Error;

/// Errors raised by the expense sub-pipeline.
#[derive(Error, Debug)]
pub enum ExpenseError {
    /// The invoice yielded no usable fields.
    #[error("could not extract invoice data from {0}")]
    Unparseable(String),

    /// Parsed data failed validation.
    #[error("invoice validation failed: {0}")]
    Invalid(String),

    /// Spreadsheet reading failed.
    #[error("spreadsheet error in {path}: {message}")]
    Spreadsheet {
        /// Offending path.
        path: String,
        /// Reader diagnostic.
        message: String,
    },

    /// Voucher rendering failed.
    #[error(transparent)]
    Export(#[from] gstx_x2beta::X2BetaError),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
