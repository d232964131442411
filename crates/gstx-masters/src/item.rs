//! # Item Master
//!
//! Maps marketplace identifiers to Final Goods names. Storage is an arena
//! of records with two independent lookup keys — `(sku)` and `(asin)` —
//! each unique across the table. Lookup priority is SKU first, ASIN second.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One approved item mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMasterRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Seller SKU key (at least one of sku/asin is non-empty).
    pub sku: Option<String>,
    /// ASIN key.
    pub asin: Option<String>,
    /// Internal item code, when known.
    pub item_code: Option<String>,
    /// Final Goods accounting name.
    pub fg: String,
    /// Default GST rate for the item, in basis points.
    pub gst_rate_bps: i64,
    /// Who approved the mapping.
    pub approved_by: Option<String>,
    /// When the mapping was approved.
    pub approved_at: Option<DateTime<Utc>>,
}

impl ItemMasterRecord {
    /// Build an unapproved record with the given keys.
    pub fn new(
        sku: Option<&str>,
        asin: Option<&str>,
        fg: impl Into<String>,
        gst_rate_bps: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sku: sku.map(normalize_key).filter(|s| !s.is_empty()),
            asin: asin.map(normalize_key).filter(|s| !s.is_empty()),
            item_code: None,
            fg: fg.into(),
            gst_rate_bps,
            approved_by: None,
            approved_at: None,
        }
    }

    /// Mark the record approved.
    pub fn approved(mut self, approver: impl Into<String>) -> Self {
        self.approved_by = Some(approver.into());
        self.approved_at = Some(Utc::now());
        self
    }
}

/// Arena + index table of item mappings.
#[derive(Debug, Default)]
pub struct ItemMasterTable {
    records: Vec<ItemMasterRecord>,
    by_sku: HashMap<String, usize>,
    by_asin: HashMap<String, usize>,
}

impl ItemMasterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. A record whose every key already exists is skipped
    /// (bulk loads tolerate duplicates silently); returns whether it landed.
    pub fn insert(&mut self, record: ItemMasterRecord) -> bool {
        if record.sku.is_none() && record.asin.is_none() {
            tracing::warn!(fg = %record.fg, "item record with no lookup key skipped");
            return false;
        }
        let sku_taken = record
            .sku
            .as_ref()
            .is_some_and(|k| self.by_sku.contains_key(k));
        let asin_taken = record
            .asin
            .as_ref()
            .is_some_and(|k| self.by_asin.contains_key(k));
        if sku_taken || asin_taken {
            return false;
        }

        let idx = self.records.len();
        if let Some(sku) = &record.sku {
            self.by_sku.insert(sku.clone(), idx);
        }
        if let Some(asin) = &record.asin {
            self.by_asin.insert(asin.clone(), idx);
        }
        self.records.push(record);
        true
    }

    /// Look up by SKU first, then ASIN.
    pub fn lookup(&self, sku: &str, asin: &str) -> Option<&ItemMasterRecord> {
        let sku = normalize_key(sku);
        if !sku.is_empty() {
            if let Some(&idx) = self.by_sku.get(&sku) {
                return self.records.get(idx);
            }
        }
        let asin = normalize_key(asin);
        if !asin.is_empty() {
            if let Some(&idx) = self.by_asin.get(&asin) {
                return self.records.get(idx);
            }
        }
        None
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in insertion order.
    pub fn records(&self) -> &[ItemMasterRecord] {
        &self.records
    }
}

/// An item lookup miss, queued for approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMiss {
    /// SKU from the row.
    pub sku: String,
    /// ASIN from the row.
    pub asin: String,
    /// Suggested Final Goods name (`{sku}_FG`).
    pub suggested_fg: String,
    /// Suggested default rate in basis points.
    pub suggested_rate_bps: i64,
    /// How many rows hit this miss.
    pub occurrences: usize,
}

/// Per-run item resolver with an in-process cache.
#[derive(Debug)]
pub struct ItemResolver<'a> {
    table: &'a ItemMasterTable,
    cache: HashMap<(String, String), Option<String>>,
    miss_counts: HashMap<(String, String), usize>,
}

impl<'a> ItemResolver<'a> {
    /// Snapshot a resolver over the table.
    pub fn new(table: &'a ItemMasterTable) -> Self {
        Self {
            table,
            cache: HashMap::new(),
            miss_counts: HashMap::new(),
        }
    }

    /// Resolve a row's identifiers. Returns `(fg, hit)`; a miss yields an
    /// empty name and records an approval suggestion once per distinct key.
    pub fn resolve(&mut self, sku: &str, asin: &str) -> (String, bool) {
        let key = (normalize_key(sku), normalize_key(asin));
        if let Some(cached) = self.cache.get(&key) {
            if cached.is_none() {
                *self.miss_counts.entry(key.clone()).or_insert(0) += 1;
            }
            return match cached {
                Some(fg) => (fg.clone(), true),
                None => (String::new(), false),
            };
        }

        match self.table.lookup(sku, asin) {
            Some(record) => {
                self.cache.insert(key, Some(record.fg.clone()));
                (record.fg.clone(), true)
            }
            None => {
                self.cache.insert(key.clone(), None);
                *self.miss_counts.entry(key).or_insert(0) += 1;
                (String::new(), false)
            }
        }
    }

    /// Consume the resolver, returning distinct misses with suggestions.
    pub fn into_misses(self) -> Vec<ItemMiss> {
        let mut misses: Vec<ItemMiss> = self
            .miss_counts
            .into_iter()
            .map(|((sku, asin), occurrences)| {
                let display = if sku.is_empty() { &asin } else { &sku };
                ItemMiss {
                    suggested_fg: format!("{display}_FG"),
                    suggested_rate_bps: 1800,
                    sku: sku.clone(),
                    asin: asin.clone(),
                    occurrences,
                }
            })
            .collect();
        misses.sort_by(|a, b| (&a.sku, &a.asin).cmp(&(&b.sku, &b.asin)));
        misses
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_takes_priority_over_asin() {
        let mut table = ItemMasterTable::new();
        table.insert(ItemMasterRecord::new(Some("SKU1"), None, "By Sku", 1800));
        table.insert(ItemMasterRecord::new(None, Some("B0A"), "By Asin", 1800));

        let hit = table.lookup("SKU1", "B0A").unwrap();
        assert_eq!(hit.fg, "By Sku");
        let hit = table.lookup("", "B0A").unwrap();
        assert_eq!(hit.fg, "By Asin");
    }

    #[test]
    fn duplicate_keys_skip_silently() {
        let mut table = ItemMasterTable::new();
        assert!(table.insert(ItemMasterRecord::new(Some("SKU1"), None, "A", 1800)));
        assert!(!table.insert(ItemMasterRecord::new(Some("SKU1"), None, "B", 1800)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("SKU1", "").unwrap().fg, "A");
    }

    #[test]
    fn keyless_record_rejected() {
        let mut table = ItemMasterTable::new();
        assert!(!table.insert(ItemMasterRecord::new(None, None, "Orphan", 1800)));
    }

    #[test]
    fn miss_suggests_fg_and_dedups() {
        let table = ItemMasterTable::new();
        let mut resolver = ItemResolver::new(&table);
        assert_eq!(resolver.resolve("NEW-SKU", ""), (String::new(), false));
        assert_eq!(resolver.resolve("NEW-SKU", ""), (String::new(), false));
        let misses = resolver.into_misses();
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].suggested_fg, "NEW-SKU_FG");
        assert_eq!(misses[0].suggested_rate_bps, 1800);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut table = ItemMasterTable::new();
        table.insert(ItemMasterRecord::new(Some("sku1"), None, "Widget", 1800));
        assert!(table.lookup("SKU1", "").is_some());
    }
}
