//! Storage Module
//!
//! File-backed table storage, one JSON document per shard.
//!
//! ## Responsibilities
//! - Map a table name to its shard files (size-based rollover)
//! - Read and atomically rewrite shard documents
//! - Locate the byte extent of every record inside a shard
//!
//! ## File Format
//! ```text
//! {data_dir}/users.json          {data_dir}/users_1.json
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ {                        │   │ {                        │
//! │     "users": [           │   │     "users": [           │
//! │         { ..., "id": 1 },│   │         { ..., "id": 9 },│
//! │         { ..., "id": 2 } │   │         ...              │
//! │     ]                    │   │     ]                    │
//! │ }                        │   │ }                        │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```

mod manager;
pub mod scanner;

use serde_json::{Map, Value};

pub use manager::{Shard, TableFiles};
pub use scanner::{parse_record, read_slice, scan, ScanError};

/// A schema-free record: ordered field name → JSON value
pub type Record = Map<String, Value>;

/// Name of the reserved, engine-assigned record identifier
pub const ID_FIELD: &str = "id";

/// Half-open byte range `[start, end)` of one record inside a shard file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locator {
    /// Shard number (0 = primary file)
    pub shard: usize,
    /// Offset of the opening `{`
    pub start: usize,
    /// Offset one past the matching `}`
    pub end: usize,
}

impl Locator {
    pub fn new(shard: usize, start: usize, end: usize) -> Self {
        Self { shard, start, end }
    }

    /// Length of the record's serialized extent in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The engine-assigned id of a record, if it carries one
pub fn record_id(record: &Record) -> Option<u64> {
    record.get(ID_FIELD).and_then(Value::as_u64)
}
