//! Engine Module
//!
//! The storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Assign ids and append records to the right shard
//! - Answer equality predicates through the Garden
//! - Hide soft-deleted records and trigger compaction
//! - Serialize every operation behind one engine-wide lock

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::compaction::{compact_table, DeleteManager};
use crate::config::Config;
use crate::error::{GardenError, MissReason, Result};
use crate::garden::Garden;
use crate::protocol::Command;
use crate::query::Condition;
use crate::storage::{parse_record, record_id, scan, Locator, Record, Shard, TableFiles, ID_FIELD};

/// Mutable engine state, only ever touched with the engine lock held
struct EngineState {
    /// Per-table, per-field locator trees
    garden: Garden,

    /// Soft-delete markers and the shared delete counter
    deletes: DeleteManager,
}

/// A live record found by a predicate, with where it lives on disk
struct Match {
    locator: Locator,
    record: Record,
}

/// The main storage engine
///
/// ## Concurrency Model: one exclusion domain
///
/// Every public operation, reads included, holds `state` for its whole
/// duration. A select may build an index, which mutates the Garden, so it
/// is treated like a write. Two operations never run at once, even on
/// unrelated tables. File I/O happens with the lock held.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Shard file resolution and I/O
    files: TableFiles,

    /// Garden + delete markers behind the engine lock
    state: Mutex<EngineState>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// Creates the data directory if needed. Indexes and delete markers
    /// start empty: indexes are rebuilt on demand, markers are in-memory only.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let files = TableFiles::open(&config.data_dir, config.max_shard_size)?;

        tracing::info!(
            "Opened engine at {} (max shard size {} bytes, flush threshold {})",
            config.data_dir.display(),
            config.max_shard_size,
            config.flush_threshold
        );

        Ok(Self {
            state: Mutex::new(EngineState {
                garden: Garden::new(),
                deletes: DeleteManager::new(config.flush_threshold),
            }),
            files,
            config,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.data_dir = path.to_path_buf();
        Self::open(config)
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Option<Value>> {
        match command {
            Command::Insert { table, record } => {
                let id = self.insert(&table, record)?;
                Ok(Some(json!({ ID_FIELD: id })))
            }
            Command::Select { table, condition } => {
                let records = self.select(&table, &condition)?;
                Ok(Some(Value::Array(
                    records.into_iter().map(Value::Object).collect(),
                )))
            }
            Command::Update {
                table,
                condition,
                patch,
            } => {
                self.update(&table, &condition, &patch)?;
                Ok(None)
            }
            Command::Delete { table, condition } => {
                self.delete(&table, &condition)?;
                Ok(None)
            }
            Command::Flush { table } => {
                self.flush(&table)?;
                Ok(None)
            }
            Command::CreateIndex { table, fields } => {
                self.create_index(&table, &fields)?;
                Ok(None)
            }
            Command::Ping => Ok(Some(Value::String("PONG".to_string()))),
        }
    }

    /// Insert a record, returning its assigned id
    ///
    /// Steps:
    /// 1. Acquire the engine lock
    /// 2. Next id = max id over all shards + 1
    /// 3. Append to the shard chosen by the size ceiling
    /// 4. Drop the table's indexes (they no longer see every record)
    pub fn insert(&self, table: &str, mut record: Record) -> Result<u64> {
        let mut state = self.state.lock();

        let shards = self.files.shards(table)?;
        let target = self.files.resolve(table)?;

        let mut max_id = 0;
        let mut target_records = Vec::new();
        for shard in &shards {
            let records = self.files.read_records(table, shard)?;
            if let Some(shard_max) = records.iter().filter_map(record_id).max() {
                max_id = max_id.max(shard_max);
            }
            if shard.number == target.number {
                target_records = records;
            }
        }

        if target.number > 0 && !shards.iter().any(|s| s.number == target.number) {
            tracing::debug!("Table {} rolling over to shard {}", table, target.number);
        }

        let id = max_id + 1;
        record.insert(ID_FIELD.to_string(), Value::from(id));
        target_records.push(record);

        self.files.write_records(table, &target, target_records)?;
        state.garden.invalidate_table(table);

        tracing::debug!("Inserted {} id {} into shard {}", table, id, target.number);
        Ok(id)
    }

    /// Select every live record matching `condition`
    ///
    /// Fails with `NotFound` when nothing survives the soft-delete filter.
    pub fn select(&self, table: &str, condition: &Condition) -> Result<Vec<Record>> {
        let mut state = self.state.lock();

        let matches = self.resolve(&mut state, table, condition)?;
        Ok(matches.into_iter().map(|m| m.record).collect())
    }

    /// Merge `patch` into every live record matching `condition`
    ///
    /// Keys in `patch` overwrite existing keys (no deep merge). Affected
    /// shards are rewritten, then indexes for the patch fields and the
    /// predicate field are rebuilt. Other indexes of the table are dropped.
    pub fn update(&self, table: &str, condition: &Condition, patch: &Record) -> Result<()> {
        let mut state = self.state.lock();

        let matches = self.resolve(&mut state, table, condition)?;

        let mut by_shard: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for m in &matches {
            by_shard
                .entry(m.locator.shard)
                .or_default()
                .insert(m.locator.start);
        }

        // Offsets move as soon as the first shard is rewritten
        state.garden.invalidate_table(table);

        for (number, starts) in by_shard {
            let shard = Shard {
                number,
                path: self.files.shard_path(table, number),
            };
            let bytes = self.files.read_bytes(&shard)?;
            let locators =
                scan(&bytes, number).map_err(|e| e.into_error(&shard.path, bytes.len()))?;
            let mut records = self.files.read_records(table, &shard)?;

            if locators.len() != records.len() {
                return Err(GardenError::MalformedRecord {
                    path: shard.path.clone(),
                    start: 0,
                    end: bytes.len(),
                    reason: format!(
                        "scanner found {} records but the table holds {}",
                        locators.len(),
                        records.len()
                    ),
                });
            }

            for (record, locator) in records.iter_mut().zip(&locators) {
                if starts.contains(&locator.start) {
                    for (key, value) in patch {
                        record.insert(key.clone(), value.clone());
                    }
                }
            }

            self.files.write_records(table, &shard, records)?;
        }

        let mut fields: BTreeSet<String> = patch.keys().cloned().collect();
        fields.insert(condition.field().to_string());

        for field in &fields {
            state.garden.rebuild(&self.files, table, field)?;
        }

        tracing::debug!("Updated {} records in {}", matches.len(), table);
        Ok(())
    }

    /// Soft-delete every live record matching `condition`
    ///
    /// The records stay on disk until compaction. May trigger compaction
    /// of every pending table if the shared counter reaches the threshold.
    pub fn delete(&self, table: &str, condition: &Condition) -> Result<()> {
        let mut state = self.state.lock();

        let matches = self.resolve(&mut state, table, condition)?;

        for m in &matches {
            match record_id(&m.record) {
                Some(id) => {
                    state.deletes.mark(table, id);
                }
                None => tracing::warn!(
                    "Record at byte {} of {} has no id and cannot be marked for deletion",
                    m.locator.start,
                    table
                ),
            }
        }

        self.maybe_compact(&mut state)
    }

    /// Compact one table now, regardless of the delete counter
    pub fn flush(&self, table: &str) -> Result<()> {
        let mut state = self.state.lock();

        self.require_table(table)?;

        let cleared = self.compact_locked(&mut state, table)?;
        state.deletes.discount(cleared);
        Ok(())
    }

    /// Build indexes for `fields` eagerly
    ///
    /// Later selects on these fields skip the lazy build.
    pub fn create_index(&self, table: &str, fields: &[String]) -> Result<()> {
        let mut state = self.state.lock();

        self.require_table(table)?;

        for field in fields {
            state.garden.rebuild(&self.files, table, field)?;
        }

        tracing::info!("Created indexes on {} for {:?}", table, fields);
        Ok(())
    }

    // =========================================================================
    // Internal Operations (called with the engine lock held)
    // =========================================================================

    /// Live records matching `condition`, with their locators
    fn resolve(&self, state: &mut EngineState, table: &str, condition: &Condition) -> Result<Vec<Match>> {
        self.require_table(table)?;

        let not_found = |reason| GardenError::NotFound {
            table: table.to_string(),
            condition: condition.to_string(),
            reason,
        };

        let locators: Vec<Locator> = {
            let tree = state.garden.ensure(&self.files, table, condition.field())?;
            match tree.search(&condition.key()) {
                Some(locators) => locators.to_vec(),
                None if tree.field_absent() => return Err(not_found(MissReason::FieldAbsent)),
                None => return Err(not_found(MissReason::NoMatch)),
            }
        };

        let mut shard_bytes: HashMap<usize, (Shard, Vec<u8>)> = HashMap::new();
        let mut matches = Vec::with_capacity(locators.len());

        for locator in locators {
            if !shard_bytes.contains_key(&locator.shard) {
                let shard = Shard {
                    number: locator.shard,
                    path: self.files.shard_path(table, locator.shard),
                };
                let bytes = self.files.read_bytes(&shard)?;
                shard_bytes.insert(locator.shard, (shard, bytes));
            }
            let (shard, bytes) = &shard_bytes[&locator.shard];

            let record = parse_record(bytes, &locator, &shard.path)?;
            let deleted = record_id(&record).is_some_and(|id| state.deletes.is_marked(table, id));
            if !deleted {
                matches.push(Match { locator, record });
            }
        }

        if matches.is_empty() {
            return Err(not_found(MissReason::AllDeleted));
        }
        Ok(matches)
    }

    /// Compact every pending table once the shared counter hits the threshold
    fn maybe_compact(&self, state: &mut EngineState) -> Result<()> {
        if !state.deletes.should_compact() {
            return Ok(());
        }

        tracing::info!(
            "Delete threshold reached ({}/{}), compacting",
            state.deletes.counter(),
            state.deletes.threshold()
        );

        for table in state.deletes.pending_tables() {
            self.compact_locked(state, &table)?;
        }

        state.deletes.reset_counter();
        Ok(())
    }

    /// Rewrite `table` without its marked records, clear its markers, and
    /// rebuild every index it had
    ///
    /// Returns the number of markers cleared.
    fn compact_locked(&self, state: &mut EngineState, table: &str) -> Result<usize> {
        let marked = match state.deletes.marked(table) {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => return Ok(0),
        };

        // Dropped before the rewrite so a failed shard write leaves no stale tree
        let indexed = state.garden.invalidate_table(table);

        compact_table(&self.files, table, &marked)?;
        let cleared = state.deletes.clear(table);

        for field in &indexed {
            state.garden.rebuild(&self.files, table, field)?;
        }

        Ok(cleared)
    }

    fn require_table(&self, table: &str) -> Result<()> {
        TableFiles::validate_name(table)?;
        if !self.files.exists(table) {
            return Err(GardenError::TableMissing(table.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        self.files.data_dir()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ids of `table` soft-deleted and waiting for compaction
    pub fn pending_deletes(&self, table: &str) -> Vec<u64> {
        self.state
            .lock()
            .deletes
            .marked(table)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Fresh soft deletions since the last compaction (all tables)
    pub fn delete_counter(&self) -> usize {
        self.state.lock().deletes.counter()
    }

    /// Fields of `table` that currently have a built index
    pub fn indexed_fields(&self, table: &str) -> Vec<String> {
        self.state.lock().garden.fields(table)
    }

    /// Paths of every existing shard of `table`
    pub fn shard_paths(&self, table: &str) -> Result<Vec<std::path::PathBuf>> {
        Ok(self
            .files
            .shards(table)?
            .into_iter()
            .map(|shard| shard.path)
            .collect())
    }
}
