//! # gstx-masters — Item & Ledger Master Resolution
//!
//! Two parallel resolvers share one lifecycle:
//!
//! - **Item**: `(sku)` then `(asin)` → Final Goods name + default GST rate.
//! - **Ledger**: `(channel family, state abbreviation)` → ledger name.
//!
//! A hit enriches the row. A miss is NOT an error: it is captured with a
//! suggested value and fans out to the approval queue; the row stays
//! unmapped and blocks tax/invoice stages unless approval policy says
//! otherwise.
//!
//! Master tables are process-wide and outlive runs. Resolvers snapshot them
//! at stage start (per-run caches), so a run sees consistent master data
//! even while approvals land for the next run.

pub mod item;
pub mod ledger;
pub mod loaders;

pub use item::{ItemMasterRecord, ItemMasterTable, ItemMiss, ItemResolver};
pub use ledger::{LedgerMasterRecord, LedgerMasterTable, LedgerMiss, LedgerResolver};

use serde::{Deserialize, Serialize};

use gstx_core::NormalizedRow;

/// A sales row after master resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedRow {
    /// The canonical row.
    pub row: NormalizedRow,
    /// Final Goods name; empty when unmapped.
    pub fg: String,
    /// Ledger name; empty when unmapped.
    pub ledger_name: String,
    /// Whether the item lookup hit.
    pub item_resolved: bool,
    /// Whether the ledger lookup hit.
    pub ledger_resolved: bool,
}

impl MappedRow {
    /// Whether both lookups hit.
    pub fn fully_mapped(&self) -> bool {
        self.item_resolved && self.ledger_resolved
    }
}

/// Coverage statistics for one resolution pass, reported to the audit log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Rows examined.
    pub total_rows: usize,
    /// Rows where both lookups hit.
    pub mapped_rows: usize,
    /// Distinct item misses queued.
    pub item_misses: usize,
    /// Distinct ledger misses queued.
    pub ledger_misses: usize,
}

impl ResolutionStats {
    /// Mapped percentage over total rows; 100 for an empty input.
    pub fn coverage_percent(&self) -> f64 {
        if self.total_rows == 0 {
            return 100.0;
        }
        self.mapped_rows as f64 * 100.0 / self.total_rows as f64
    }
}

/// Resolve a full row set against both masters.
///
/// Returns the mapped rows plus the distinct misses each resolver captured.
pub fn resolve_rows(
    rows: Vec<NormalizedRow>,
    items: &ItemMasterTable,
    ledgers: &LedgerMasterTable,
) -> (Vec<MappedRow>, Vec<ItemMiss>, Vec<LedgerMiss>, ResolutionStats) {
    let mut item_resolver = ItemResolver::new(items);
    let mut ledger_resolver = LedgerResolver::new(ledgers);

    let mut mapped = Vec::with_capacity(rows.len());
    let mut stats = ResolutionStats {
        total_rows: rows.len(),
        ..Default::default()
    };

    for row in rows {
        let (fg, item_hit) = item_resolver.resolve(&row.sku, &row.asin);
        let (ledger_name, ledger_hit) = ledger_resolver.resolve(row.channel, &row.state_code);
        if item_hit && ledger_hit {
            stats.mapped_rows += 1;
        }
        mapped.push(MappedRow {
            row,
            fg,
            ledger_name,
            item_resolved: item_hit,
            ledger_resolved: ledger_hit,
        });
    }

    let item_misses = item_resolver.into_misses();
    let ledger_misses = ledger_resolver.into_misses();
    stats.item_misses = item_misses.len();
    stats.ledger_misses = ledger_misses.len();

    tracing::info!(
        total = stats.total_rows,
        mapped = stats.mapped_rows,
        coverage = format!("{:.1}%", stats.coverage_percent()),
        item_misses = stats.item_misses,
        ledger_misses = stats.ledger_misses,
        "master resolution pass complete"
    );

    (mapped, item_misses, ledger_misses, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::{Channel, Money, Month, TransactionKind};

    fn row(sku: &str, state: &str) -> NormalizedRow {
        NormalizedRow {
            invoice_date: "2025-08-01".into(),
            kind: TransactionKind::Shipment,
            order_id: "O1".into(),
            sku: sku.into(),
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
        }
    }

    #[test]
    fn coverage_counts_fully_mapped_only() {
        let mut items = ItemMasterTable::new();
        items.insert(ItemMasterRecord::new(Some("SKU1"), None, "Widget", 1800));
        let mut ledgers = LedgerMasterTable::new();
        ledgers.insert(LedgerMasterRecord::new(
            "amazon",
            "HR",
            "Amazon Sales - HR",
        ));

        let rows = vec![row("SKU1", "HARYANA"), row("SKU2", "HARYANA")];
        let (mapped, item_misses, ledger_misses, stats) =
            resolve_rows(rows, &items, &ledgers);

        assert_eq!(stats.total_rows, 2);
        assert_eq!(stats.mapped_rows, 1);
        assert_eq!(item_misses.len(), 1);
        assert!(ledger_misses.is_empty());
        assert!(mapped[0].fully_mapped());
        assert!(!mapped[1].fully_mapped());
        assert_eq!(stats.coverage_percent(), 50.0);
    }
}
