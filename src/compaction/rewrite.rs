//! Compaction rewrite
//!
//! Physically removes marked records from a table's shards.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::storage::{record_id, TableFiles};

/// What one table compaction did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Shards that lost at least one record and were rewritten
    pub shards_rewritten: usize,

    /// Records removed across all shards
    pub records_removed: usize,
}

/// Remove every record of `table` whose id is in `marked`
///
/// Shards holding no marked record are left untouched. Each rewritten shard
/// is replaced atomically.
pub fn compact_table(files: &TableFiles, table: &str, marked: &BTreeSet<u64>) -> Result<CompactionStats> {
    let mut stats = CompactionStats::default();
    if marked.is_empty() {
        return Ok(stats);
    }

    for shard in files.shards(table)? {
        let records = files.read_records(table, &shard)?;
        let before = records.len();

        let remaining: Vec<_> = records
            .into_iter()
            .filter(|record| !record_id(record).is_some_and(|id| marked.contains(&id)))
            .collect();

        let removed = before - remaining.len();
        if removed == 0 {
            continue;
        }

        files.write_records(table, &shard, remaining)?;
        stats.shards_rewritten += 1;
        stats.records_removed += removed;
    }

    tracing::info!(
        "Compacted {}: removed {} records from {} shards",
        table,
        stats.records_removed,
        stats.shards_rewritten
    );

    Ok(stats)
}
