//! # Expense Rules
//!
//! The built-in catalog mapping `(channel family, expense type)` to an
//! expense ledger, HSN code, and input-GST treatment, plus the GST split
//! used for purchase-side amounts.
//!
//! Marketplace fee invoices routinely omit the vendor GSTIN; when absent
//! the split assumes interstate (IGST), which is how these fees are billed
//! in practice.

use serde::{Deserialize, Serialize};

use gstx_core::{GstRate, Money};

/// One expense mapping rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseRule {
    /// Channel family (`"amazon"`, `"flipkart"`, `"pepperfry"`).
    pub channel: &'static str,
    /// Standardized expense type.
    pub expense_type: &'static str,
    /// Expense ledger account.
    pub ledger_name: &'static str,
    /// Default GST rate for the fee.
    pub gst_rate: GstRate,
    /// Whether the fee qualifies for input GST credit.
    pub is_input_gst: bool,
    /// HSN/SAC code.
    pub hsn_code: &'static str,
    /// Rule description.
    pub description: &'static str,
}

/// The built-in rule catalog.
pub const EXPENSE_RULES: &[ExpenseRule] = &[
    // Amazon
    ExpenseRule { channel: "amazon", expense_type: "Closing Fee", ledger_name: "Amazon Closing Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998314", description: "Marketplace closing fee" },
    ExpenseRule { channel: "amazon", expense_type: "Shipping Fee", ledger_name: "Amazon Shipping Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "996511", description: "Shipping and logistics fee" },
    ExpenseRule { channel: "amazon", expense_type: "Commission", ledger_name: "Amazon Commission", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998314", description: "Marketplace commission" },
    ExpenseRule { channel: "amazon", expense_type: "Fulfillment Fee", ledger_name: "Amazon Fulfillment Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "996511", description: "FBA fulfillment fee" },
    ExpenseRule { channel: "amazon", expense_type: "Storage Fee", ledger_name: "Amazon Storage Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "996419", description: "Warehouse storage fee" },
    ExpenseRule { channel: "amazon", expense_type: "Advertising Fee", ledger_name: "Amazon Advertising Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Sponsored products advertising" },
    ExpenseRule { channel: "amazon", expense_type: "Refund Processing Fee", ledger_name: "Amazon Refund Processing Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998314", description: "Refund processing charges" },
    ExpenseRule { channel: "amazon", expense_type: "Return Processing Fee", ledger_name: "Amazon Return Processing Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998314", description: "Return processing charges" },
    ExpenseRule { channel: "amazon", expense_type: "Payment Gateway Fee", ledger_name: "Amazon Payment Gateway Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Payment processing fee" },
    ExpenseRule { channel: "amazon", expense_type: "Subscription Fee", ledger_name: "Amazon Subscription Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Seller subscription fee" },
    ExpenseRule { channel: "amazon", expense_type: "Other Fee", ledger_name: "Amazon Other Charges", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Other marketplace charges" },
    // Flipkart
    ExpenseRule { channel: "flipkart", expense_type: "Commission", ledger_name: "Flipkart Commission", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998314", description: "Marketplace commission" },
    ExpenseRule { channel: "flipkart", expense_type: "Collection Fee", ledger_name: "Flipkart Collection Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "996511", description: "Cash collection fee" },
    ExpenseRule { channel: "flipkart", expense_type: "Fixed Fee", ledger_name: "Flipkart Fixed Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998314", description: "Fixed marketplace fee" },
    ExpenseRule { channel: "flipkart", expense_type: "Shipping Fee", ledger_name: "Flipkart Shipping Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "996511", description: "Shipping and logistics" },
    ExpenseRule { channel: "flipkart", expense_type: "Payment Gateway Fee", ledger_name: "Flipkart Payment Gateway Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Payment processing fee" },
    ExpenseRule { channel: "flipkart", expense_type: "Storage Fee", ledger_name: "Flipkart Storage Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "996419", description: "Warehouse storage fee" },
    ExpenseRule { channel: "flipkart", expense_type: "Advertising Fee", ledger_name: "Flipkart Advertising Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Sponsored listings" },
    ExpenseRule { channel: "flipkart", expense_type: "Other Fee", ledger_name: "Flipkart Other Charges", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Other marketplace charges" },
    // Pepperfry
    ExpenseRule { channel: "pepperfry", expense_type: "Commission", ledger_name: "Pepperfry Commission", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998314", description: "Marketplace commission" },
    ExpenseRule { channel: "pepperfry", expense_type: "Shipping Fee", ledger_name: "Pepperfry Shipping Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "996511", description: "Shipping charges" },
    ExpenseRule { channel: "pepperfry", expense_type: "Payment Gateway Fee", ledger_name: "Pepperfry Payment Gateway Fee", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Payment processing" },
    ExpenseRule { channel: "pepperfry", expense_type: "Other Fee", ledger_name: "Pepperfry Other Charges", gst_rate: GstRate::Eighteen, is_input_gst: true, hsn_code: "998399", description: "Other charges" },
];

/// Find the rule for a channel and expense type: exact match first, then
/// substring match either way, then the channel's `Other Fee` fallback.
pub fn expense_rule_for(channel_family: &str, expense_type: &str) -> Option<&'static ExpenseRule> {
    let family = channel_family.to_lowercase();
    let wanted = expense_type.to_lowercase();

    let channel_rules = || EXPENSE_RULES.iter().filter(|r| r.channel == family);

    if let Some(rule) = channel_rules().find(|r| r.expense_type.to_lowercase() == wanted) {
        return Some(rule);
    }
    if let Some(rule) = channel_rules().find(|r| {
        let known = r.expense_type.to_lowercase();
        wanted.contains(&known) || known.contains(&wanted)
    }) {
        return Some(rule);
    }
    channel_rules().find(|r| r.expense_type == "Other Fee")
}

/// Spelling variations reduced to standard expense types.
const TYPE_NORMALIZATIONS: &[(&str, &str)] = &[
    ("closing fee", "Closing Fee"),
    ("closure fee", "Closing Fee"),
    ("shipping fee", "Shipping Fee"),
    ("delivery fee", "Shipping Fee"),
    ("freight", "Shipping Fee"),
    ("commission", "Commission"),
    ("referral fee", "Commission"),
    ("fulfillment fee", "Fulfillment Fee"),
    ("fba fee", "Fulfillment Fee"),
    ("storage fee", "Storage Fee"),
    ("warehouse fee", "Storage Fee"),
    ("advertising fee", "Advertising Fee"),
    ("ads fee", "Advertising Fee"),
    ("promotion fee", "Advertising Fee"),
    ("payment gateway fee", "Payment Gateway Fee"),
    ("payment processing fee", "Payment Gateway Fee"),
    ("refund processing fee", "Refund Processing Fee"),
    ("return processing fee", "Return Processing Fee"),
];

/// Normalize a free-form expense description to a standard type. Unmatched
/// input title-cases word by word.
pub fn normalize_expense_type(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    for (variation, standard) in TYPE_NORMALIZATIONS {
        if lower.contains(variation) {
            return standard.to_string();
        }
    }
    raw.trim()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().to_string() + chars.as_str().to_lowercase().as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// GST amounts split for a purchase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GstSplitAmounts {
    /// Central GST.
    pub cgst: Money,
    /// State GST.
    pub sgst: Money,
    /// Integrated GST.
    pub igst: Money,
}

impl GstSplitAmounts {
    /// Total tax across components.
    pub fn total(&self) -> Money {
        self.cgst + self.sgst + self.igst
    }
}

/// Split expense GST by vendor/company registration states.
///
/// A missing vendor GSTIN is interstate: marketplace fee invoices rarely
/// carry one and are billed IGST.
pub fn compute_expense_gst(
    taxable: Money,
    rate: GstRate,
    company_gstin: &str,
    vendor_gstin: Option<&str>,
) -> GstSplitAmounts {
    if rate == GstRate::Zero {
        return GstSplitAmounts::default();
    }
    let company_state = company_gstin.get(..2);
    let vendor_state = vendor_gstin.and_then(|g| g.get(..2));

    match (company_state, vendor_state) {
        (Some(c), Some(v)) if c == v => {
            let half = taxable.times_bps(rate.half_bps());
            GstSplitAmounts {
                cgst: half,
                sgst: half,
                igst: Money::ZERO,
            }
        }
        _ => GstSplitAmounts {
            cgst: Money::ZERO,
            sgst: Money::ZERO,
            igst: taxable.times_bps(rate.bps()),
        },
    }
}

/// Input GST ledger label for a component
/// (`"Input CGST @ 9%"` carries the half rate, IGST the full).
pub fn input_ledger_label(component: &str, rate: GstRate, halved: bool) -> String {
    let percent = if halved {
        rate.half_bps() / 100
    } else {
        rate.bps() / 100
    };
    format!("Input {component} @ {percent}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup_and_fallback() {
        let rule = expense_rule_for("amazon", "Commission").unwrap();
        assert_eq!(rule.ledger_name, "Amazon Commission");

        let rule = expense_rule_for("amazon", "Some Unheard Of Fee").unwrap();
        assert_eq!(rule.ledger_name, "Amazon Other Charges");

        let rule = expense_rule_for("flipkart", "shipping").unwrap();
        assert_eq!(rule.ledger_name, "Flipkart Shipping Fee");
    }

    #[test]
    fn normalization_catalog() {
        assert_eq!(normalize_expense_type("referral fee"), "Commission");
        assert_eq!(normalize_expense_type("FBA Fee charges"), "Fulfillment Fee");
        assert_eq!(normalize_expense_type("weird charge"), "Weird Charge");
    }

    #[test]
    fn absent_vendor_gstin_is_interstate() {
        let split = compute_expense_gst(
            Money::from_paise(100_000),
            GstRate::Eighteen,
            "06ABGCS4796R1ZA",
            None,
        );
        assert_eq!(split.igst, Money::from_paise(18_000));
        assert_eq!(split.cgst, Money::ZERO);
    }

    #[test]
    fn same_state_vendor_is_intrastate() {
        let split = compute_expense_gst(
            Money::from_paise(100_000),
            GstRate::Eighteen,
            "06ABGCS4796R1ZA",
            Some("06AAAAA0000A1Z5"),
        );
        assert_eq!(split.cgst, Money::from_paise(9_000));
        assert_eq!(split.sgst, Money::from_paise(9_000));
        assert_eq!(split.igst, Money::ZERO);
    }

    #[test]
    fn zero_rate_splits_to_zero() {
        let split = compute_expense_gst(
            Money::from_paise(100_000),
            GstRate::Zero,
            "06ABGCS4796R1ZA",
            None,
        );
        assert_eq!(split.total(), Money::ZERO);
    }

    #[test]
    fn input_labels() {
        assert_eq!(
            input_ledger_label("CGST", GstRate::Eighteen, true),
            "Input CGST @ 9%"
        );
        assert_eq!(
            input_ledger_label("IGST", GstRate::Eighteen, false),
            "Input IGST @ 18%"
        );
    }
}
