//! # Invoice Numbering
//!
//! Generates `PREFIX-ST-MM-SEQ` numbers per channel:
//!
//! | channel | prefix | example |
//! |---|---|---|
//! | amazon_mtr | AMZ | AMZ-HR-08-0001 |
//! | amazon_str | AMZST | AMZST-KA-08-0001 |
//! | flipkart | FLIP | FLIP-DL-08-0001 |
//! | pepperfry | PEPP | PEPP-MH-08-0001 |
//!
//! ## Uniqueness
//!
//! The engine preloads every number already committed for the
//! `(channel, gstin, month)` scope. Allocation partitions rows by state,
//! walks partitions in ascending state order, and assigns `seq = 1..N` in
//! stable input order; a candidate colliding with a used number bumps the
//! sequence until free. Numbers are never reused, so uniqueness holds
//! across interleaved runs as long as callers serialize allocation on the
//! registry (the pipeline holds the registry write lock for the batch).

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use gstx_core::{states, Channel, Month};

use crate::TaxedRow;

/// Invoice numbering pattern for one channel.
#[derive(Debug, Clone, Copy)]
pub struct NumberingPattern {
    /// Channel prefix.
    pub prefix: &'static str,
    /// Whether the pattern carries a state code segment.
    pub state_code: bool,
    /// Whether the pattern carries a month code segment.
    pub month_code: bool,
    /// Segment separator.
    pub separator: &'static str,
}

/// Pattern for a channel.
pub fn pattern_for(channel: Channel) -> NumberingPattern {
    let prefix = match channel {
        Channel::AmazonMtr => "AMZ",
        Channel::AmazonStr => "AMZST",
        Channel::Flipkart => "FLIP",
        Channel::Pepperfry => "PEPP",
    };
    NumberingPattern {
        prefix,
        state_code: true,
        month_code: true,
        separator: "-",
    }
}

/// One allocated invoice number, ready for registry persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAllocation {
    /// Channel of the run.
    pub channel: Channel,
    /// Company GSTIN.
    pub gstin: String,
    /// State abbreviation the number was issued under.
    pub state_code: String,
    /// The invoice number.
    pub invoice_no: String,
    /// Processing month.
    pub month: Month,
}

/// Summary of one numbering pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NumberingResult {
    /// Rows examined.
    pub processed: usize,
    /// Numbers assigned.
    pub generated: usize,
    /// Rows skipped (no resolvable state).
    pub failed: usize,
    /// Distinct states covered.
    pub states_covered: usize,
}

/// Validation counters over an already-numbered row set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NumberingValidation {
    /// Rows examined.
    pub total: usize,
    /// Numbers matching the channel pattern.
    pub valid: usize,
    /// Numbers present but off-pattern.
    pub invalid: usize,
    /// Rows with no number.
    pub missing: usize,
    /// Numbers repeated within the set.
    pub duplicates: usize,
}

/// Components parsed back out of an invoice number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedInvoiceNumber {
    /// Channel prefix.
    pub prefix: String,
    /// State code segment.
    pub state_code: String,
    /// Month code segment.
    pub month_code: String,
    /// Sequence segment, when present.
    pub sequence: Option<u32>,
}

/// The invoice numbering engine for one `(channel, gstin, month)` scope.
#[derive(Debug)]
pub struct NumberingEngine {
    channel: Channel,
    gstin: String,
    month: Month,
    used: BTreeSet<String>,
}

impl NumberingEngine {
    /// Create an engine with an empty used-set.
    pub fn new(channel: Channel, gstin: impl Into<String>, month: Month) -> Self {
        Self {
            channel,
            gstin: gstin.into(),
            month,
            used: BTreeSet::new(),
        }
    }

    /// Preload numbers already committed to the registry.
    pub fn register_existing<I, S>(&mut self, numbers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for n in numbers {
            self.used.insert(n.into());
        }
    }

    /// Numbers known to this engine (preloaded plus allocated).
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Assign invoice numbers to every row with a valid tax split.
    ///
    /// Rows are partitioned by state abbreviation; partitions are walked in
    /// ascending order and rows within a partition keep input order, so the
    /// assignment is deterministic.
    pub fn allocate_batch(
        &mut self,
        rows: &mut [TaxedRow],
    ) -> (NumberingResult, Vec<InvoiceAllocation>) {
        let mut result = NumberingResult {
            processed: rows.len(),
            ..Default::default()
        };

        // state abbrev -> row indices, insertion order preserved per state.
        let mut partitions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, row) in rows.iter().enumerate() {
            let state = states::state_abbrev(&row.mapped.row.state_code);
            if state == states::UNKNOWN_STATE {
                result.failed += 1;
                tracing::warn!(
                    state = %row.mapped.row.state_code,
                    order_id = %row.mapped.row.order_id,
                    "invoice number skipped for unresolvable state"
                );
                continue;
            }
            partitions.entry(state).or_default().push(idx);
        }
        result.states_covered = partitions.len();

        let mut allocations = Vec::new();
        for (state, indices) in &partitions {
            let mut seq: u32 = 1;
            for &idx in indices {
                let number = self.next_free(state, &mut seq);
                rows[idx].invoice_no = number.clone();
                allocations.push(InvoiceAllocation {
                    channel: self.channel,
                    gstin: self.gstin.clone(),
                    state_code: state.clone(),
                    invoice_no: number,
                    month: self.month.clone(),
                });
                result.generated += 1;
                seq += 1;
            }
        }

        (result, allocations)
    }

    /// Format-and-bump: build the candidate for `seq`, advancing past any
    /// collision with a used number. The winning number joins the used-set.
    fn next_free(&mut self, state: &str, seq: &mut u32) -> String {
        loop {
            let candidate = self.format_number(state, *seq);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            *seq += 1;
        }
    }

    /// Render one invoice number for the scope.
    pub fn format_number(&self, state: &str, seq: u32) -> String {
        let pattern = pattern_for(self.channel);
        let mut parts = vec![pattern.prefix.to_string()];
        if pattern.state_code {
            parts.push(state.to_string());
        }
        if pattern.month_code {
            parts.push(self.month.month_code().to_string());
        }
        parts.push(format!("{seq:04}"));
        parts.join(pattern.separator)
    }
}

/// Whether a number matches the channel's pattern.
pub fn validate_invoice_number(invoice_no: &str, channel: Channel) -> bool {
    channel_regex(channel).is_match(invoice_no)
}

/// Decompose a number into its components; `None` if off-pattern.
pub fn parse_invoice_number(invoice_no: &str, channel: Channel) -> Option<ParsedInvoiceNumber> {
    let captures = channel_regex(channel).captures(invoice_no)?;
    Some(ParsedInvoiceNumber {
        prefix: pattern_for(channel).prefix.to_string(),
        state_code: captures.name("state")?.as_str().to_string(),
        month_code: captures.name("month")?.as_str().to_string(),
        sequence: captures
            .name("seq")
            .and_then(|m| m.as_str().parse().ok()),
    })
}

/// Validation counters for a numbered row set.
pub fn validate_numbers(rows: &[TaxedRow], channel: Channel) -> NumberingValidation {
    let mut seen = BTreeSet::new();
    let mut v = NumberingValidation {
        total: rows.len(),
        ..Default::default()
    };
    for row in rows {
        if row.invoice_no.is_empty() {
            v.missing += 1;
        } else if !seen.insert(row.invoice_no.clone()) {
            v.duplicates += 1;
        } else if validate_invoice_number(&row.invoice_no, channel) {
            v.valid += 1;
        } else {
            v.invalid += 1;
        }
    }
    v
}

fn channel_regex(channel: Channel) -> &'static Regex {
    use std::sync::OnceLock;
    static CELLS: [OnceLock<Regex>; 4] = [
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
    ];
    let slot = match channel {
        Channel::AmazonMtr => &CELLS[0],
        Channel::AmazonStr => &CELLS[1],
        Channel::Flipkart => &CELLS[2],
        Channel::Pepperfry => &CELLS[3],
    };
    slot.get_or_init(|| {
        let pattern = pattern_for(channel);
        let sep = regex::escape(pattern.separator);
        let body = format!(
            "^{prefix}{sep}(?P<state>[A-Z]{{2}}){sep}(?P<month>\\d{{2}})(?:{sep}(?P<seq>\\d{{4}}))?$",
            prefix = regex::escape(pattern.prefix),
        );
        // Static per-channel pattern text; construction cannot fail.
        Regex::new(&body).expect("channel invoice pattern")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::{Gstin, Money, Month, NormalizedRow, TransactionKind};
    use gstx_masters::MappedRow;

    fn taxed_row(state: &str) -> TaxedRow {
        let row = NormalizedRow {
            invoice_date: "2025-08-01".into(),
            kind: TransactionKind::Shipment,
            order_id: "O1".into(),
            sku: "SKU1".into(),
            asin: String::new(),
            quantity: 1,
            taxable_value: Money::from_paise(100_000),
            gst_rate_bps: 1800,
            state_code: state.into(),
            seller_state: None,
            final_date: None,
            channel: Channel::AmazonMtr,
            gstin: "06ABGCS4796R1ZA".into(),
            month: Month::new("2025-08").unwrap(),
            is_return: false,
            total_qty: None,
            returned_qty: None,
        };
        TaxedRow {
            mapped: MappedRow {
                row,
                fg: "Widget".into(),
                ledger_name: "Amazon Sales - HR".into(),
                item_resolved: true,
                ledger_resolved: true,
            },
            rate: Some(gstx_core::GstRate::Eighteen),
            taxable_value: Money::from_paise(100_000),
            shipping_value: Money::ZERO,
            cgst: Money::from_paise(9_000),
            sgst: Money::from_paise(9_000),
            igst: Money::ZERO,
            net_qty: 1,
            returned_qty: 0,
            invoice_no: String::new(),
        }
    }

    fn engine() -> NumberingEngine {
        NumberingEngine::new(
            Channel::AmazonMtr,
            Gstin::new("06ABGCS4796R1ZA").unwrap().as_str(),
            Month::new("2025-08").unwrap(),
        )
    }

    #[test]
    fn sequential_per_state_in_state_order() {
        let mut rows = vec![
            taxed_row("KARNATAKA"),
            taxed_row("HARYANA"),
            taxed_row("HARYANA"),
        ];
        let (result, allocations) = engine().allocate_batch(&mut rows);
        assert_eq!(result.generated, 3);
        assert_eq!(result.states_covered, 2);
        assert_eq!(rows[1].invoice_no, "AMZ-HR-08-0001");
        assert_eq!(rows[2].invoice_no, "AMZ-HR-08-0002");
        assert_eq!(rows[0].invoice_no, "AMZ-KA-08-0001");
        // Allocations walk states ascending.
        assert_eq!(allocations[0].state_code, "HR");
        assert_eq!(allocations[2].state_code, "KA");
    }

    #[test]
    fn preloaded_numbers_bump_the_sequence() {
        let mut eng = engine();
        eng.register_existing(["AMZ-HR-08-0001", "AMZ-HR-08-0002"]);
        let mut rows = vec![taxed_row("HARYANA")];
        let (_, allocations) = eng.allocate_batch(&mut rows);
        assert_eq!(allocations[0].invoice_no, "AMZ-HR-08-0003");
    }

    #[test]
    fn unknown_state_rows_are_skipped() {
        let mut rows = vec![taxed_row("ATLANTIS")];
        let (result, allocations) = engine().allocate_batch(&mut rows);
        assert_eq!(result.failed, 1);
        assert!(allocations.is_empty());
        assert!(rows[0].invoice_no.is_empty());
    }

    #[test]
    fn channel_prefixes() {
        assert_eq!(pattern_for(Channel::AmazonStr).prefix, "AMZST");
        assert_eq!(pattern_for(Channel::Flipkart).prefix, "FLIP");
        assert_eq!(pattern_for(Channel::Pepperfry).prefix, "PEPP");
    }

    #[test]
    fn parse_roundtrips_components() {
        let parsed = parse_invoice_number("AMZ-HR-08-0042", Channel::AmazonMtr).unwrap();
        assert_eq!(parsed.state_code, "HR");
        assert_eq!(parsed.month_code, "08");
        assert_eq!(parsed.sequence, Some(42));

        assert!(parse_invoice_number("AMZ-HR-08", Channel::AmazonMtr).is_some());
        assert!(parse_invoice_number("FLIP-HR-08-0001", Channel::AmazonMtr).is_none());
        assert!(!validate_invoice_number("AMZHR080001", Channel::AmazonMtr));
    }

    #[test]
    fn validation_counters() {
        let mut rows = vec![taxed_row("HARYANA"), taxed_row("HARYANA"), taxed_row("HARYANA")];
        rows[0].invoice_no = "AMZ-HR-08-0001".into();
        rows[1].invoice_no = "AMZ-HR-08-0001".into();
        rows[2].invoice_no = String::new();
        let v = validate_numbers(&rows, Channel::AmazonMtr);
        assert_eq!(v.valid, 1);
        assert_eq!(v.duplicates, 1);
        assert_eq!(v.missing, 1);
    }
}
