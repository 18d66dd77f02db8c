//! Garden Module
//!
//! Secondary indexes: one locator tree per (table, field).
//!
//! ## Responsibilities
//! - Build a field's tree lazily on its first query
//! - Hand out trees for exact-match search
//! - Drop or rebuild trees after mutations that move records
//!
//! ## Staleness
//! A tree is a snapshot of the shard files at build time. The engine drops
//! or rebuilds every tree of a table after an insert, update, or compaction
//! of that table, so a search never sees offsets from an older file.

mod key;
mod tree;

use std::collections::HashMap;

use crate::error::Result;
use crate::storage::TableFiles;

pub use key::IndexKey;
pub use tree::LocatorTree;

/// All locator trees, grouped by table then field
#[derive(Debug, Default)]
pub struct Garden {
    tables: HashMap<String, HashMap<String, LocatorTree>>,
}

impl Garden {
    /// Create an empty garden
    pub fn new() -> Self {
        Self::default()
    }

    /// The tree for `table.field`, if built
    pub fn get(&self, table: &str, field: &str) -> Option<&LocatorTree> {
        self.tables.get(table).and_then(|fields| fields.get(field))
    }

    /// The tree for `table.field`, building it first if absent
    ///
    /// A failed build leaves nothing behind.
    pub fn ensure(&mut self, files: &TableFiles, table: &str, field: &str) -> Result<&LocatorTree> {
        let fields = self.tables.entry(table.to_string()).or_default();
        if !fields.contains_key(field) {
            let tree = LocatorTree::build(files, table, field)?;
            fields.insert(field.to_string(), tree);
        }
        Ok(&fields[field])
    }

    /// Rebuild `table.field` from disk, replacing any existing tree
    ///
    /// The old tree is removed before the build starts.
    pub fn rebuild(&mut self, files: &TableFiles, table: &str, field: &str) -> Result<()> {
        self.invalidate(table, field);
        let tree = LocatorTree::build(files, table, field)?;
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(field.to_string(), tree);
        Ok(())
    }

    /// Drop one tree
    pub fn invalidate(&mut self, table: &str, field: &str) {
        if let Some(fields) = self.tables.get_mut(table) {
            fields.remove(field);
        }
    }

    /// Drop every tree of `table`, returning the fields that were indexed
    pub fn invalidate_table(&mut self, table: &str) -> Vec<String> {
        let mut fields: Vec<String> = self
            .tables
            .remove(table)
            .map(|fields| fields.into_keys().collect())
            .unwrap_or_default();
        fields.sort();
        fields
    }

    /// Indexed fields of `table`, sorted
    pub fn fields(&self, table: &str) -> Vec<String> {
        let mut fields: Vec<String> = self
            .tables
            .get(table)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        fields.sort();
        fields
    }

    /// Total number of trees across all tables
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
