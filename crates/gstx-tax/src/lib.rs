//! # gstx-tax — GST Computation & Invoice Numbering
//!
//! Two engines run back to back over mapped rows:
//!
//! 1. **Tax split** — channel-rule-driven division of GST into CGST/SGST
//!    (intrastate) or IGST (interstate). Stateless and deterministic: the
//!    split is a pure function of `(row, company GSTIN, channel rule)`.
//!
//! 2. **Invoice numbering** — per-`(channel, state, month)` sequential
//!    numbers with global uniqueness against the process-wide registry.
//!    Allocation is post-grouping with a deterministic partition order
//!    (state ascending, then input order), so worker count never changes
//!    the output.

pub mod numbering;
pub mod rules;

pub use numbering::{
    InvoiceAllocation, NumberingEngine, NumberingResult, NumberingValidation,
};
pub use rules::{TaxRulesEngine, TaxSplit};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gstx_core::{GstRate, Money};
use gstx_masters::MappedRow;

/// Errors raised by tax computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxError {
    /// The row's GST rate is off the slab set.
    #[error("invalid GST rate: {0} bps is not a recognized slab")]
    InvalidRate(i64),

    /// The destination state could not be resolved.
    #[error("cannot determine interstate status for state {0:?}")]
    UnknownState(String),
}

/// A sales row after tax computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxedRow {
    /// The mapped row.
    pub mapped: MappedRow,
    /// Validated rate slab; `None` when the input rate was off-slab.
    pub rate: Option<GstRate>,
    /// Taxable value after channel adjustments (Pepperfry return scaling).
    pub taxable_value: Money,
    /// Shipping charges included in the tax base.
    pub shipping_value: Money,
    /// Central GST component.
    pub cgst: Money,
    /// State GST component.
    pub sgst: Money,
    /// Integrated GST component.
    pub igst: Money,
    /// Net quantity after returns (Pepperfry), else the row quantity.
    pub net_qty: i64,
    /// Returned quantity (Pepperfry), else 0.
    pub returned_qty: i64,
    /// Invoice number; empty until the numbering stage assigns one.
    pub invoice_no: String,
}

impl TaxedRow {
    /// Total tax across components.
    pub fn total_tax(&self) -> Money {
        self.cgst + self.sgst + self.igst
    }

    /// Taxable base plus total tax.
    pub fn total_amount(&self) -> Money {
        self.taxable_value + self.shipping_value + self.total_tax()
    }
}

/// Summary of one tax computation pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TaxStats {
    /// Rows examined.
    pub processed: usize,
    /// Rows with a valid split.
    pub computed: usize,
    /// Rows skipped on an invalid rate or unresolvable state.
    pub failed: usize,
    /// Sum of taxable bases, paise.
    pub total_taxable_paise: i64,
    /// Sum of tax amounts, paise.
    pub total_tax_paise: i64,
}

/// Compute one row's split into a [`TaxedRow`].
///
/// A row with an off-slab rate keeps zero tax and `rate: None`; the defect
/// surfaces later as a `GST-001` exception rather than aborting the stage.
/// Pure per-row work — safe to fan out over a worker pool.
pub fn tax_single(mapped: MappedRow, engine: &TaxRulesEngine) -> TaxedRow {
    match engine.compute_row(&mapped.row) {
        Ok(split) => TaxedRow {
            rate: Some(split.rate),
            taxable_value: split.taxable_value,
            shipping_value: split.shipping_value,
            cgst: split.cgst,
            sgst: split.sgst,
            igst: split.igst,
            net_qty: split.net_qty,
            returned_qty: split.returned_qty,
            invoice_no: String::new(),
            mapped,
        },
        Err(err) => {
            tracing::warn!(
                order_id = %mapped.row.order_id,
                %err,
                "tax computation skipped for row"
            );
            TaxedRow {
                rate: None,
                taxable_value: mapped.row.taxable_value,
                shipping_value: Money::ZERO,
                cgst: Money::ZERO,
                sgst: Money::ZERO,
                igst: Money::ZERO,
                net_qty: mapped.row.quantity,
                returned_qty: 0,
                invoice_no: String::new(),
                mapped,
            }
        }
    }
}

/// Fold a taxed row set into its stage summary.
pub fn tax_stats(rows: &[TaxedRow]) -> TaxStats {
    let mut stats = TaxStats {
        processed: rows.len(),
        ..Default::default()
    };
    for row in rows {
        if row.rate.is_some() {
            stats.computed += 1;
            stats.total_taxable_paise += row.taxable_value.paise();
            stats.total_tax_paise += row.total_tax().paise();
        } else {
            stats.failed += 1;
        }
    }
    stats
}

/// Compute tax splits for every mapped row, sequentially.
pub fn compute_taxes(rows: Vec<MappedRow>, engine: &TaxRulesEngine) -> (Vec<TaxedRow>, TaxStats) {
    let taxed: Vec<TaxedRow> = rows
        .into_iter()
        .map(|mapped| tax_single(mapped, engine))
        .collect();
    let stats = tax_stats(&taxed);
    (taxed, stats)
}
