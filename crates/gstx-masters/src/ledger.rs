//! # Ledger Master
//!
//! Maps `(channel family, state abbreviation)` to an accounting ledger
//! name. The key is normalized — lowercase family, uppercase state — and
//! unique.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gstx_core::{states, Channel};

/// One approved ledger mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMasterRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Channel family (`"amazon"`, `"flipkart"`, `"pepperfry"`).
    pub channel: String,
    /// Two-letter state abbreviation.
    pub state_code: String,
    /// Ledger account name.
    pub ledger_name: String,
    /// Who approved the mapping.
    pub approved_by: Option<String>,
    /// When the mapping was approved.
    pub approved_at: Option<DateTime<Utc>>,
}

impl LedgerMasterRecord {
    /// Build an unapproved record.
    pub fn new(
        channel: impl Into<String>,
        state_code: impl Into<String>,
        ledger_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into().to_lowercase(),
            state_code: state_code.into().to_uppercase(),
            ledger_name: ledger_name.into(),
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

/// Map table of ledger mappings keyed by `(channel, state)`.
#[derive(Debug, Default)]
pub struct LedgerMasterTable {
    records: Vec<LedgerMasterRecord>,
    by_key: HashMap<(String, String), usize>,
}

impl LedgerMasterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; duplicates on the key are skipped silently.
    pub fn insert(&mut self, record: LedgerMasterRecord) -> bool {
        let key = (record.channel.clone(), record.state_code.clone());
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.by_key.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    /// Look up a ledger name.
    pub fn lookup(&self, channel: &str, state_code: &str) -> Option<&LedgerMasterRecord> {
        let key = (channel.to_lowercase(), state_code.to_uppercase());
        self.by_key.get(&key).map(|&idx| &self.records[idx])
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
    pub fn records(&self) -> &[LedgerMasterRecord] {
        &self.records
    }
}

/// A ledger lookup miss, queued for approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMiss {
    /// Channel family.
    pub channel: String,
    /// State abbreviation derived from the row.
    pub state_code: String,
    /// Suggested ledger name (`{Channel} Sales - {ST}`).
    pub suggested_ledger: String,
    /// How many rows hit this miss.
    pub occurrences: usize,
}

/// Per-run ledger resolver with an in-process cache.
#[derive(Debug)]
pub struct LedgerResolver<'a> {
    table: &'a LedgerMasterTable,
    cache: HashMap<(String, String), Option<String>>,
    miss_counts: HashMap<(String, String), usize>,
}

impl<'a> LedgerResolver<'a> {
    /// Snapshot a resolver over the table.
    pub fn new(table: &'a LedgerMasterTable) -> Self {
        Self {
            table,
            cache: HashMap::new(),
            miss_counts: HashMap::new(),
        }
    }

    /// Resolve a row's channel/state. State names are reduced to their
    /// abbreviation before lookup, so `"HARYANA"` and `"HR"` share a key.
    pub fn resolve(&mut self, channel: Channel, state: &str) -> (String, bool) {
        let family = channel.family().to_string();
        let abbrev = states::state_abbrev(state);
        let key = (family, abbrev);

        if let Some(cached) = self.cache.get(&key) {
            if cached.is_none() {
                *self.miss_counts.entry(key.clone()).or_insert(0) += 1;
            }
            return match cached {
                Some(name) => (name.clone(), true),
                None => (String::new(), false),
            };
        }

        match self.table.lookup(&key.0, &key.1) {
            Some(record) => {
                let name = record.ledger_name.clone();
                self.cache.insert(key, Some(name.clone()));
                (name, true)
            }
            None => {
                self.cache.insert(key.clone(), None);
                *self.miss_counts.entry(key).or_insert(0) += 1;
                (String::new(), false)
            }
        }
    }

    /// Consume the resolver, returning distinct misses with suggestions.
    pub fn into_misses(self) -> Vec<LedgerMiss> {
        let mut misses: Vec<LedgerMiss> = self
            .miss_counts
            .into_iter()
            .map(|((channel, state_code), occurrences)| {
                let title = title_case(&channel);
                LedgerMiss {
                    suggested_ledger: format!("{title} Sales - {state_code}"),
                    channel,
                    state_code,
                    occurrences,
                }
            })
            .collect();
        misses.sort_by(|a, b| (&a.channel, &a.state_code).cmp(&(&b.channel, &b.state_code)));
        misses
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalization() {
        let mut table = LedgerMasterTable::new();
        table.insert(LedgerMasterRecord::new("Amazon", "hr", "Amazon Sales - HR"));
        assert!(table.lookup("amazon", "HR").is_some());
        assert!(table.lookup("AMAZON", "hr").is_some());
        assert!(table.lookup("flipkart", "HR").is_none());
    }

    #[test]
    fn duplicate_key_skipped() {
        let mut table = LedgerMasterTable::new();
        assert!(table.insert(LedgerMasterRecord::new("amazon", "HR", "First")));
        assert!(!table.insert(LedgerMasterRecord::new("amazon", "HR", "Second")));
        assert_eq!(table.lookup("amazon", "HR").unwrap().ledger_name, "First");
    }

    #[test]
    fn state_names_reduce_to_abbrev() {
        let mut table = LedgerMasterTable::new();
        table.insert(LedgerMasterRecord::new("amazon", "HR", "Amazon Sales - HR"));
        let mut resolver = LedgerResolver::new(&table);
        let (name, hit) = resolver.resolve(Channel::AmazonMtr, "HARYANA");
        assert!(hit);
        assert_eq!(name, "Amazon Sales - HR");
    }

    #[test]
    fn miss_suggests_channel_sales_ledger() {
        let table = LedgerMasterTable::new();
        let mut resolver = LedgerResolver::new(&table);
        resolver.resolve(Channel::Flipkart, "DELHI");
        resolver.resolve(Channel::Flipkart, "DELHI");
        let misses = resolver.into_misses();
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].suggested_ledger, "Flipkart Sales - DL");
        assert_eq!(misses[0].occurrences, 2);
    }

    #[test]
    fn mtr_and_str_share_the_amazon_family() {
        let mut table = LedgerMasterTable::new();
        table.insert(LedgerMasterRecord::new("amazon", "KA", "Amazon Sales - KA"));
        let mut resolver = LedgerResolver::new(&table);
        assert!(resolver.resolve(Channel::AmazonStr, "KARNATAKA").1);
    }
}
