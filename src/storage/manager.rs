//! Table File Manager
//!
//! Resolves table names to shard files and moves records in and out of them.
//!
//! ## Responsibilities
//! - Validate table names before they touch the filesystem
//! - Pick the shard that receives new inserts (size ceiling policy)
//! - Enumerate every existing shard of a table
//! - Read shard documents and rewrite them atomically (temp file + rename)

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{GardenError, Result};

use super::Record;

/// One physical file holding part of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// 0 for the primary file, n for `{table}_{n}.json`
    pub number: usize,
    pub path: PathBuf,
}

/// Manages the table files under the data directory
///
/// Stateless apart from its settings: every answer is derived from what is
/// on disk at call time.
#[derive(Debug, Clone)]
pub struct TableFiles {
    /// Directory that holds every shard file
    data_dir: PathBuf,

    /// Shards larger than this are closed to new inserts
    max_shard_size: u64,
}

impl TableFiles {
    const EXTENSION: &'static str = "json";
    const TEMP_EXTENSION: &'static str = "json.tmp";

    /// Open the table directory, creating it if needed
    pub fn open(data_dir: &Path, max_shard_size: u64) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            max_shard_size,
        })
    }

    /// Reject names that are empty, could escape the data directory, or end
    /// in `_<digits>`
    ///
    /// The suffix rule keeps "t_1" from reading and writing shard 1 of "t".
    pub fn validate_name(table: &str) -> Result<()> {
        let bad = table.is_empty()
            || table.contains('/')
            || table.contains('\\')
            || table.contains("..")
            || table.chars().any(char::is_control)
            || has_shard_suffix(table);
        if bad {
            return Err(GardenError::InvalidTableName(table.to_string()));
        }
        Ok(())
    }

    /// File path for shard `number` of `table`
    ///
    /// "users", 0 → users.json, "users", 2 → users_2.json
    pub fn shard_path(&self, table: &str, number: usize) -> PathBuf {
        let name = if number == 0 {
            format!("{}.{}", table, Self::EXTENSION)
        } else {
            format!("{}_{}.{}", table, number, Self::EXTENSION)
        };
        self.data_dir.join(name)
    }

    /// Pick the shard that receives the next insert
    ///
    /// Returns the lowest-numbered shard that is missing or at/below the size
    /// ceiling. Nothing is created here.
    pub fn resolve(&self, table: &str) -> Result<Shard> {
        Self::validate_name(table)?;

        let mut number = 0;
        loop {
            let path = self.shard_path(table, number);
            match fs::metadata(&path) {
                Ok(meta) if meta.len() > self.max_shard_size => number += 1,
                Ok(_) => return Ok(Shard { number, path }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(Shard { number, path })
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Every existing shard of `table`, in shard order
    ///
    /// Checks `table.json`, `table_1.json`, … until the first missing file.
    pub fn shards(&self, table: &str) -> Result<Vec<Shard>> {
        Self::validate_name(table)?;

        let mut shards = Vec::new();
        let mut number = 0;
        loop {
            let path = self.shard_path(table, number);
            if !path.is_file() {
                return Ok(shards);
            }
            shards.push(Shard { number, path });
            number += 1;
        }
    }

    /// True once the table's primary shard has been created
    pub fn exists(&self, table: &str) -> bool {
        Self::validate_name(table).is_ok() && self.shard_path(table, 0).is_file()
    }

    /// Raw bytes of a shard file
    pub fn read_bytes(&self, shard: &Shard) -> Result<Vec<u8>> {
        Ok(fs::read(&shard.path)?)
    }

    /// All records of `table` stored in `shard`, in file order
    ///
    /// A missing or empty file holds no records.
    pub fn read_records(&self, table: &str, shard: &Shard) -> Result<Vec<Record>> {
        let mut root = match self.read_root(&shard.path)? {
            Some(root) => root,
            None => return Ok(Vec::new()),
        };

        match root.remove(table) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(GardenError::Serialization(format!(
                        "{}: table {} holds a non-record element: {}",
                        shard.path.display(),
                        table,
                        other
                    ))),
                })
                .collect(),
            Some(other) => Err(GardenError::Serialization(format!(
                "{}: table {} is not an array: {}",
                shard.path.display(),
                table,
                other
            ))),
        }
    }

    /// Replace the records of `table` in `shard`
    ///
    /// Other top-level keys already in the document are kept. The new
    /// document is written to a temp file, synced, then renamed into place.
    pub fn write_records(&self, table: &str, shard: &Shard, records: Vec<Record>) -> Result<()> {
        let mut root = self.read_root(&shard.path)?.unwrap_or_default();
        root.insert(
            table.to_string(),
            Value::Array(records.into_iter().map(Value::Object).collect()),
        );

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        root.serialize(&mut serializer)?;

        Self::write_atomic(&shard.path, &buf)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the shard size ceiling
    pub fn max_shard_size(&self) -> u64 {
        self.max_shard_size
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Parse the top-level mapping of a shard (None if the file is absent)
    fn read_root(&self, path: &Path) -> Result<Option<Map<String, Value>>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Some(Map::new()));
        }

        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(root) => Ok(Some(root)),
            other => Err(GardenError::Serialization(format!(
                "{}: top level is not a mapping: {}",
                path.display(),
                other
            ))),
        }
    }

    fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let temp_path = path.with_extension(Self::TEMP_EXTENSION);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;

        // fsync the directory so the rename itself is durable
        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

/// True if `table` ends in an underscore followed by one or more digits
fn has_shard_suffix(table: &str) -> bool {
    match table.rsplit_once('_') {
        Some((_, digits)) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
