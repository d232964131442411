//! # Channel Column Mappings
//!
//! Ordered candidate lists per canonical target. For each target the FIRST
//! source header present in the report wins; absent targets default to 0
//! for numeric columns and empty string otherwise.

use gstx_core::Channel;

/// Candidate source headers for one canonical target.
#[derive(Debug, Clone, Copy)]
pub struct ColumnCandidates {
    /// Canonical target column.
    pub target: &'static str,
    /// Source headers in priority order (already normalized form).
    pub sources: &'static [&'static str],
}

/// Targets whose defaults are numeric zero rather than empty string.
pub const NUMERIC_TARGETS: &[&str] = &["quantity", "taxable_value", "gst_rate"];

const AMAZON_MTR: &[ColumnCandidates] = &[
    ColumnCandidates {
        target: "invoice_date",
        sources: &["invoice_date", "final_invoice_date"],
    },
    ColumnCandidates {
        target: "order_id",
        sources: &["order_id"],
    },
    ColumnCandidates {
        target: "sku",
        sources: &["sku"],
    },
    ColumnCandidates {
        target: "asin",
        sources: &["asin"],
    },
    ColumnCandidates {
        target: "quantity",
        sources: &["quantity"],
    },
    ColumnCandidates {
        target: "taxable_value",
        sources: &["principal_amount", "tax_exclusive_gross", "invoice_amount"],
    },
    // MTR reports split the rate into components; ingestion sums whichever
    // of these are present.
    ColumnCandidates {
        target: "gst_rate",
        sources: &["igst_rate", "cgst_rate", "sgst_rate"],
    },
    ColumnCandidates {
        target: "state_code",
        sources: &["ship_to_state", "bill_from_state"],
    },
];

const AMAZON_STR: &[ColumnCandidates] = &[
    ColumnCandidates {
        target: "invoice_date",
        sources: &["invoice_date", "posting_date", "shipment_date", "date"],
    },
    ColumnCandidates {
        target: "order_id",
        sources: &["order_id", "amazon_order_id", "order"],
    },
    ColumnCandidates {
        target: "asin",
        sources: &["asin", "asin1"],
    },
    ColumnCandidates {
        target: "quantity",
        sources: &["quantity", "qty"],
    },
    ColumnCandidates {
        target: "taxable_value",
        sources: &["principal_amount", "tax_exclusive_gross", "taxable_value", "item_price"],
    },
    ColumnCandidates {
        target: "gst_rate",
        sources: &["igst_rate", "gst_rate", "tax_rate"],
    },
    ColumnCandidates {
        target: "state_code",
        sources: &["ship_to_state", "ship_to_state_code", "destination_state", "state_code"],
    },
    ColumnCandidates {
        target: "seller_state",
        sources: &["ship_from_state", "seller_state_code", "from_state_code", "origin_state_code"],
    },
];

const FLIPKART: &[ColumnCandidates] = &[
    ColumnCandidates {
        target: "invoice_date",
        sources: &["invoice_date", "order_date", "date"],
    },
    ColumnCandidates {
        target: "order_id",
        sources: &["order_id", "order"],
    },
    ColumnCandidates {
        target: "sku",
        sources: &["sku", "fsn"],
    },
    ColumnCandidates {
        target: "quantity",
        sources: &["quantity", "qty"],
    },
    ColumnCandidates {
        target: "taxable_value",
        sources: &["taxable_value", "net_amount", "item_price"],
    },
    ColumnCandidates {
        target: "gst_rate",
        sources: &["gst_rate", "tax_rate"],
    },
    ColumnCandidates {
        target: "state_code",
        sources: &["ship_to_state_code", "state_code", "state"],
    },
    ColumnCandidates {
        target: "seller_state",
        sources: &["seller_state", "seller_state_code"],
    },
];

const PEPPERFRY: &[ColumnCandidates] = &[
    ColumnCandidates {
        target: "invoice_date",
        sources: &["invoice_date", "date"],
    },
    ColumnCandidates {
        target: "order_id",
        sources: &["order_id", "order"],
    },
    ColumnCandidates {
        target: "sku",
        sources: &["sku", "item_sku"],
    },
    ColumnCandidates {
        target: "quantity",
        sources: &["quantity", "qty"],
    },
    ColumnCandidates {
        target: "taxable_value",
        sources: &["taxable_value", "net_amount", "item_price"],
    },
    ColumnCandidates {
        target: "gst_rate",
        sources: &["gst_rate", "tax_rate"],
    },
    ColumnCandidates {
        target: "state_code",
        sources: &["state_code", "ship_to_state_code", "state"],
    },
];

/// The mapping table for a channel.
pub fn channel_mapping(channel: Channel) -> &'static [ColumnCandidates] {
    match channel {
        Channel::AmazonMtr => AMAZON_MTR,
        Channel::AmazonStr => AMAZON_STR,
        Channel::Flipkart => FLIPKART,
        Channel::Pepperfry => PEPPERFRY,
    }
}

/// Candidates for one target within a channel mapping.
pub fn candidates_for(channel: Channel, target: &str) -> &'static [&'static str] {
    channel_mapping(channel)
        .iter()
        .find(|c| c.target == target)
        .map(|c| c.sources)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_channel_maps_the_core_targets() {
        for channel in Channel::all() {
            for target in ["invoice_date", "order_id", "quantity", "taxable_value", "gst_rate", "state_code"] {
                assert!(
                    !candidates_for(*channel, target).is_empty(),
                    "{channel} missing {target}"
                );
            }
        }
    }

    #[test]
    fn mtr_taxable_priority() {
        assert_eq!(
            candidates_for(Channel::AmazonMtr, "taxable_value")[0],
            "principal_amount"
        );
    }
}
