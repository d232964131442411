//! # Bulk Master Loaders
//!
//! Finance teams maintain master data in spreadsheets. The loaders accept
//! CSV or Excel files with heuristic header aliasing and insert row by row;
//! duplicates are skipped silently and counted.

use std::path::Path;

use gstx_ingest::{IngestError, SourceTable};

use crate::item::{ItemMasterRecord, ItemMasterTable};
use crate::ledger::{LedgerMasterRecord, LedgerMasterTable};

/// Outcome of a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Rows read from the file.
    pub rows: usize,
    /// Records inserted.
    pub inserted: usize,
    /// Duplicate-key rows skipped.
    pub skipped: usize,
}

/// Load item mappings from a spreadsheet into the table.
pub fn load_item_master(path: &Path, table: &mut ItemMasterTable) -> Result<LoadStats, IngestError> {
    let source = SourceTable::read_path(path)?;
    let sku_col = source.first_present(&["sku", "seller_sku", "item_sku"]);
    let asin_col = source.first_present(&["asin", "asin1"]);
    let code_col = source.first_present(&["item_code", "code"]);
    let fg_col = source.first_present(&["fg", "final_goods", "final_goods_name", "fg_name"]);
    let rate_col = source.first_present(&["gst_rate", "tax_rate", "rate"]);

    let fg_col = fg_col.ok_or_else(|| IngestError::MissingColumn {
        target: "fg".into(),
        candidates: vec!["fg".into(), "final_goods".into(), "final_goods_name".into()],
    })?;

    let mut stats = LoadStats::default();
    for (i, _) in source.rows.iter().enumerate() {
        stats.rows += 1;
        let fg = source.cell(i, fg_col).to_string();
        if fg.is_empty() {
            stats.skipped += 1;
            continue;
        }
        let sku = sku_col.map(|c| source.cell(i, c)).unwrap_or("");
        let asin = asin_col.map(|c| source.cell(i, c)).unwrap_or("");
        let rate_bps = rate_col
            .map(|c| gstx_ingest::normalize::parse_rate_bps(source.cell(i, c)))
            .filter(|&bps| bps > 0)
            .unwrap_or(1800);

        let mut record = ItemMasterRecord::new(
            (!sku.is_empty()).then_some(sku),
            (!asin.is_empty()).then_some(asin),
            fg,
            rate_bps,
        );
        record.item_code = code_col
            .map(|c| source.cell(i, c).to_string())
            .filter(|s| !s.is_empty());

        if table.insert(record) {
            stats.inserted += 1;
        } else {
            stats.skipped += 1;
        }
    }

    tracing::info!(
        path = %path.display(),
        rows = stats.rows,
        inserted = stats.inserted,
        skipped = stats.skipped,
        "item master loaded"
    );
    Ok(stats)
}

/// Load ledger mappings from a spreadsheet into the table.
pub fn load_ledger_master(
    path: &Path,
    table: &mut LedgerMasterTable,
) -> Result<LoadStats, IngestError> {
    let source = SourceTable::read_path(path)?;
    let channel_col = source
        .first_present(&["channel", "marketplace"])
        .ok_or_else(|| IngestError::MissingColumn {
            target: "channel".into(),
            candidates: vec!["channel".into(), "marketplace".into()],
        })?;
    let state_col = source
        .first_present(&["state_code", "state"])
        .ok_or_else(|| IngestError::MissingColumn {
            target: "state_code".into(),
            candidates: vec!["state_code".into(), "state".into()],
        })?;
    let ledger_col = source
        .first_present(&["ledger_name", "ledger", "account"])
        .ok_or_else(|| IngestError::MissingColumn {
            target: "ledger_name".into(),
            candidates: vec!["ledger_name".into(), "ledger".into(), "account".into()],
        })?;

    let mut stats = LoadStats::default();
    for (i, _) in source.rows.iter().enumerate() {
        stats.rows += 1;
        let ledger = source.cell(i, ledger_col).to_string();
        if ledger.is_empty() {
            stats.skipped += 1;
            continue;
        }
        let record = LedgerMasterRecord::new(
            source.cell(i, channel_col),
            gstx_core::states::state_abbrev(source.cell(i, state_col)),
            ledger,
        );
        if table.insert(record) {
            stats.inserted += 1;
        } else {
            stats.skipped += 1;
        }
    }

    tracing::info!(
        path = %path.display(),
        rows = stats.rows,
        inserted = stats.inserted,
        skipped = stats.skipped,
        "ledger master loaded"
    );
    Ok(stats)
}

/// Load an ASIN → SKU map for Amazon STR ingestion.
pub fn load_asin_map(
    path: &Path,
) -> Result<std::collections::HashMap<String, String>, IngestError> {
    let source = SourceTable::read_path(path)?;
    let asin_col = source
        .first_present(&["asin", "asin1"])
        .ok_or_else(|| IngestError::MissingColumn {
            target: "asin".into(),
            candidates: vec!["asin".into(), "asin1".into()],
        })?;
    let sku_col = source
        .first_present(&["sku", "seller_sku"])
        .ok_or_else(|| IngestError::MissingColumn {
            target: "sku".into(),
            candidates: vec!["sku".into(), "seller_sku".into()],
        })?;

    let mut map = std::collections::HashMap::new();
    for (i, _) in source.rows.iter().enumerate() {
        let asin = source.cell(i, asin_col).trim().to_uppercase();
        let sku = source.cell(i, sku_col).trim().to_uppercase();
        if !asin.is_empty() && !sku.is_empty() {
            map.entry(asin).or_insert(sku);
        }
    }
    Ok(map)
}
