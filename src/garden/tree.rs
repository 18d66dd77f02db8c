//! Locator tree
//!
//! One field's index: value → Locators of the records holding that value.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::storage::{parse_record, scan, Locator, TableFiles};

use super::IndexKey;

/// Ordered index for a single field of a single table
///
/// Built wholesale from the shard files and never patched afterwards.
#[derive(Debug, Default, Clone)]
pub struct LocatorTree {
    /// Field this tree indexes
    field: String,

    /// Maps key values to Locators, in file order per key
    entries: BTreeMap<IndexKey, Vec<Locator>>,

    /// Records scanned during the build
    records_scanned: usize,

    /// Records that carried the field (indexable or not)
    records_with_field: usize,
}

impl LocatorTree {
    /// Creates a new empty tree for `field`
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    /// Build the index for `field` over every shard of `table`
    ///
    /// Each scanned extent is parsed as a record. Any extent that fails to
    /// parse aborts the whole build with `MalformedRecord`.
    pub fn build(files: &TableFiles, table: &str, field: &str) -> Result<Self> {
        let mut tree = Self::new(field);

        for shard in files.shards(table)? {
            let bytes = files.read_bytes(&shard)?;
            let locators =
                scan(&bytes, shard.number).map_err(|e| e.into_error(&shard.path, bytes.len()))?;

            for locator in locators {
                let record = parse_record(&bytes, &locator, &shard.path)?;
                tree.records_scanned += 1;

                let Some(value) = record.get(field) else {
                    continue;
                };
                tree.records_with_field += 1;

                if let Some(key) = IndexKey::from_json(value) {
                    tree.insert(key, locator);
                }
            }
        }

        tracing::debug!(
            "Built locator tree for {}.{}: {} keys over {} records",
            table,
            field,
            tree.key_count(),
            tree.records_scanned
        );

        Ok(tree)
    }

    /// Record that the value at `locator` has key `key`
    ///
    /// A duplicate key extends the existing Locator list.
    pub fn insert(&mut self, key: IndexKey, locator: Locator) {
        self.entries.entry(key).or_default().push(locator);
    }

    /// Exact lookup
    ///
    /// Returns None (not an empty slice) when no entry has this key.
    pub fn search(&self, key: &IndexKey) -> Option<&[Locator]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// True when no scanned record carried the field at all
    pub fn field_absent(&self) -> bool {
        self.records_with_field == 0
    }

    /// Field this tree indexes
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the number of distinct keys
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the total number of locators
    pub fn locator_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Records seen by the last build
    pub fn records_scanned(&self) -> usize {
        self.records_scanned
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &[Locator])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }
}
