//! # Canonical Sales Row
//!
//! Every channel report normalizes into [`NormalizedRow`] before any
//! downstream stage runs. Later stages only ever ADD derived columns
//! (tax amounts, ledger names, invoice numbers) — they never rewrite the
//! canonical fields.
//!
//! The GST rate is carried as raw basis points here, not as
//! [`crate::GstRate`]: an off-slab rate on an input row must survive
//! normalization so the exception pass can flag it as `GST-001` with the
//! original value intact.

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::money::Money;
use crate::temporal::Month;

/// The transaction type of a sales row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Outbound shipment.
    Shipment,
    /// Marketplace-initiated refund.
    Refund,
    /// Customer return (Pepperfry returns file).
    Return,
}

impl TransactionKind {
    /// Return the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shipment => "shipment",
            Self::Refund => "refund",
            Self::Return => "return",
        }
    }

    /// Parse a report value, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shipment" => Some(Self::Shipment),
            "refund" => Some(Self::Refund),
            "return" => Some(Self::Return),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sales row in the canonical schema shared by all channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Invoice date as it appeared in the report. Parsed on demand —
    /// upstream formats vary and date defects are an exception concern,
    /// not an ingestion failure.
    pub invoice_date: String,
    /// Transaction type.
    pub kind: TransactionKind,
    /// Marketplace order identifier.
    pub order_id: String,
    /// Seller SKU (may be empty for STR rows until the ASIN map applies).
    pub sku: String,
    /// Amazon ASIN (empty for non-Amazon channels).
    pub asin: String,
    /// Quantity. Negative for return rows.
    pub quantity: i64,
    /// Taxable value in paise.
    pub taxable_value: Money,
    /// GST rate in raw basis points (may be off-slab; validated later).
    pub gst_rate_bps: i64,
    /// Destination state (name or abbreviation as reported).
    pub state_code: String,
    /// Originating seller state, when the report carries one.
    pub seller_state: Option<String>,
    /// ISO date derived from `invoice_date` (Flipkart reports).
    pub final_date: Option<String>,
    /// Channel that produced the row.
    pub channel: Channel,
    /// Company GSTIN the run is scoped to.
    pub gstin: String,
    /// Processing month.
    pub month: Month,
    /// Whether the row is a return (Pepperfry returns merge).
    pub is_return: bool,
    /// Total ordered quantity before returns, when the report carries one.
    pub total_qty: Option<i64>,
    /// Returned quantity, when the report carries one.
    pub returned_qty: Option<i64>,
}

impl NormalizedRow {
    /// Render the rate as the fractional string written to normalized CSVs
    /// (`"0.18"` for 1800 bps).
    pub fn gst_rate_string(&self) -> String {
        format_rate_fraction(self.gst_rate_bps)
    }
}

/// Format basis points as a fractional rate string (`1800` → `"0.18"`).
pub fn format_rate_fraction(bps: i64) -> String {
    let value = bps as f64 / 10_000.0;
    // Trim to at most 4 fractional digits, dropping trailing zeros past 2.
    let s = format!("{value:.4}");
    let trimmed = s.trim_end_matches('0');
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.len() < s.len() && trimmed.rfind('.').map_or(0, |d| trimmed.len() - d - 1) < 2 {
        format!("{value:.2}")
    } else {
        trimmed.to_string()
    }
}

/// Defect severity shared by exceptions, audit entries, and notifications.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; no action needed.
    Info,
    /// Data oddity worth surfacing; processing continues.
    Warning,
    /// Defect that taints the affected record.
    Error,
    /// Defect that halts the run.
    Critical,
}

impl Severity {
    /// Return the string representation of this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Return all severity levels.
    pub fn all() -> &'static [Severity] {
        &[Self::Info, Self::Warning, Self::Error, Self::Critical]
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_fraction_formatting() {
        assert_eq!(format_rate_fraction(1800), "0.18");
        assert_eq!(format_rate_fraction(500), "0.05");
        assert_eq!(format_rate_fraction(0), "0.00");
        assert_eq!(format_rate_fraction(1250), "0.125");
    }

    #[test]
    fn kind_parse() {
        assert_eq!(TransactionKind::parse("Shipment"), Some(TransactionKind::Shipment));
        assert_eq!(TransactionKind::parse("REFUND"), Some(TransactionKind::Refund));
        assert_eq!(TransactionKind::parse("cancel"), None);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
