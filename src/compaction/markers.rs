//! Delete markers
//!
//! Per-table sets of soft-deleted ids plus the shared delete counter.

use std::collections::{BTreeSet, HashMap};

/// Tracks soft-deleted record ids for every table
#[derive(Debug)]
pub struct DeleteManager {
    /// table → ids marked since that table's last compaction
    markers: HashMap<String, BTreeSet<u64>>,

    /// Fresh marks across all tables since the last compaction
    counter: usize,

    /// Counter value that triggers compaction
    threshold: usize,
}

impl DeleteManager {
    /// Create a manager that compacts after `threshold` marks
    pub fn new(threshold: usize) -> Self {
        Self {
            markers: HashMap::new(),
            counter: 0,
            threshold,
        }
    }

    /// Mark `id` in `table` as deleted
    ///
    /// Returns false (and leaves the counter alone) if it was already marked.
    pub fn mark(&mut self, table: &str, id: u64) -> bool {
        let ids = self.markers.entry(table.to_string()).or_default();
        if !ids.insert(id) {
            tracing::warn!("Record {} in {} is already marked for deletion", id, table);
            return false;
        }

        self.counter += 1;
        tracing::debug!(
            "Marked {} id {} for deletion ({} pending)",
            table,
            id,
            self.counter
        );
        true
    }

    /// True if `id` in `table` is soft-deleted
    pub fn is_marked(&self, table: &str, id: u64) -> bool {
        self.markers
            .get(table)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Marked ids of `table` (None if the table has never had a delete)
    pub fn marked(&self, table: &str) -> Option<&BTreeSet<u64>> {
        self.markers.get(table)
    }

    /// Number of ids of `table` waiting for compaction
    pub fn pending(&self, table: &str) -> usize {
        self.markers.get(table).map_or(0, BTreeSet::len)
    }

    /// Tables with at least one pending marker, sorted by name
    pub fn pending_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .markers
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(table, _)| table.clone())
            .collect();
        tables.sort();
        tables
    }

    /// True once the shared counter has reached the threshold
    pub fn should_compact(&self) -> bool {
        self.counter >= self.threshold
    }

    /// Clear the markers of `table` after it has been compacted
    ///
    /// Returns how many markers were cleared.
    pub fn clear(&mut self, table: &str) -> usize {
        self.markers
            .get_mut(table)
            .map(|ids| {
                let cleared = ids.len();
                ids.clear();
                cleared
            })
            .unwrap_or(0)
    }

    /// Take `count` marks off the counter (single-table flush)
    pub fn discount(&mut self, count: usize) {
        self.counter = self.counter.saturating_sub(count);
    }

    /// Zero the counter after a full compaction pass
    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    /// Fresh marks since the last compaction
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Configured compaction threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
