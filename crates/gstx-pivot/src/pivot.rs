//! # Pivot Aggregation
//!
//! Group-by-sum over taxed rows into accounting summaries. Grouping uses a
//! `BTreeMap` keyed by the dimension tuple, so output order is
//! deterministic: rate, then ledger, then FG (state first for channels
//! that group by state).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gstx_core::{Channel, GstRate, Money, Month};
use gstx_tax::TaxedRow;

use crate::rules::channel_pivot_config;

/// One pivot group: the dimension tuple plus summed measures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotRow {
    /// Company GSTIN.
    pub gstin: String,
    /// Processing month.
    pub month: Month,
    /// GST rate of the group.
    pub gst_rate: GstRate,
    /// Ledger dimension.
    pub ledger_name: String,
    /// Final Goods dimension.
    pub fg: String,
    /// State dimension, for channels that group by state.
    pub state_code: Option<String>,
    /// Summed quantity (net of returns where the channel adjusts).
    pub total_quantity: i64,
    /// Summed taxable value.
    pub total_taxable: Money,
    /// Summed CGST.
    pub total_cgst: Money,
    /// Summed SGST.
    pub total_sgst: Money,
    /// Summed IGST.
    pub total_igst: Money,
    /// Source rows aggregated into this group.
    pub source_rows: usize,
    /// Representative invoice number for voucher generation, when the
    /// group collapsed rows sharing one.
    pub invoice_no: Option<String>,
}

impl PivotRow {
    /// Total tax across components.
    pub fn total_tax(&self) -> Money {
        self.total_cgst + self.total_sgst + self.total_igst
    }

    /// Taxable plus tax.
    pub fn total_amount(&self) -> Money {
        self.total_taxable + self.total_tax()
    }
}

/// Summary statistics for one pivot pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PivotStats {
    /// Taxed rows examined.
    pub input_rows: usize,
    /// Rows excluded (no valid tax split).
    pub skipped_rows: usize,
    /// Groups produced.
    pub groups: usize,
    /// Groups dropped by the zero-taxable rule.
    pub dropped_zero_taxable: usize,
    /// Distinct ledgers in the output.
    pub unique_ledgers: usize,
    /// Distinct FGs in the output.
    pub unique_fgs: usize,
    /// Taxable of rows flagged as returns, for the MIS return metrics.
    pub return_taxable: Money,
    /// Per-rate `(groups, taxable)` breakdown keyed by percent label.
    pub rate_breakdown: BTreeMap<String, (usize, Money)>,
}

/// Pivot a taxed row set for a channel.
pub fn pivot_rows(rows: &[TaxedRow], channel: Channel) -> (Vec<PivotRow>, PivotStats) {
    let config = channel_pivot_config(channel);
    let mut stats = PivotStats {
        input_rows: rows.len(),
        ..Default::default()
    };

    // Dimension tuple -> accumulating group.
    type Key = (String, String, i64, String, String, Option<String>);
    let mut groups: BTreeMap<Key, PivotRow> = BTreeMap::new();

    for row in rows {
        let Some(rate) = row.rate else {
            stats.skipped_rows += 1;
            continue;
        };

        if row.mapped.row.is_return {
            stats.return_taxable += row.taxable_value.abs();
        }

        let state_dim = config
            .include_state
            .then(|| gstx_core::states::state_abbrev(&row.mapped.row.state_code));
        let key: Key = (
            row.mapped.row.gstin.clone(),
            row.mapped.row.month.as_str().to_string(),
            rate.bps(),
            row.mapped.ledger_name.clone(),
            row.mapped.fg.clone(),
            state_dim.clone(),
        );

        let quantity = if config.handle_returns {
            row.net_qty
        } else {
            row.mapped.row.quantity
        };

        let entry = groups.entry(key).or_insert_with(|| PivotRow {
            gstin: row.mapped.row.gstin.clone(),
            month: row.mapped.row.month.clone(),
            gst_rate: rate,
            ledger_name: row.mapped.ledger_name.clone(),
            fg: row.mapped.fg.clone(),
            state_code: state_dim,
            total_quantity: 0,
            total_taxable: Money::ZERO,
            total_cgst: Money::ZERO,
            total_sgst: Money::ZERO,
            total_igst: Money::ZERO,
            source_rows: 0,
            invoice_no: None,
        });
        entry.total_quantity += quantity;
        entry.total_taxable += row.taxable_value;
        entry.total_cgst += row.cgst;
        entry.total_sgst += row.sgst;
        entry.total_igst += row.igst;
        entry.source_rows += 1;
        if entry.invoice_no.is_none() && !row.invoice_no.is_empty() {
            entry.invoice_no = Some(row.invoice_no.clone());
        }
    }

    let mut out: Vec<PivotRow> = Vec::with_capacity(groups.len());
    for (_, mut group) in groups {
        if config.exclude_zero_taxable && group.total_taxable.is_zero() {
            stats.dropped_zero_taxable += 1;
            continue;
        }
        if config.force_igst_only {
            group.total_cgst = Money::ZERO;
            group.total_sgst = Money::ZERO;
        }
        out.push(group);
    }

    // Sort: state (when grouped), rate, ledger, FG.
    out.sort_by(|a, b| {
        (&a.state_code, a.gst_rate.bps(), &a.ledger_name, &a.fg).cmp(&(
            &b.state_code,
            b.gst_rate.bps(),
            &b.ledger_name,
            &b.fg,
        ))
    });

    stats.groups = out.len();
    stats.unique_ledgers = out
        .iter()
        .map(|g| g.ledger_name.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    stats.unique_fgs = out.iter().map(|g| g.fg.as_str()).collect::<BTreeSet<_>>().len();
    for group in &out {
        let entry = stats
            .rate_breakdown
            .entry(group.gst_rate.percent_label().to_string())
            .or_insert((0, Money::ZERO));
        entry.0 += 1;
        entry.1 += group.total_taxable;
    }

    tracing::info!(
        channel = %channel,
        input = stats.input_rows,
        groups = stats.groups,
        dropped = stats.dropped_zero_taxable,
        "pivot complete"
    );
    (out, stats)
}
