//! Record Scanner
//!
//! Finds the byte extent of every record in a shard without parsing values.
//!
//! The shard's wrapping object sits at depth 1. Each `{` seen at depth 1
//! opens a record, and the `}` that brings the depth back to 1 closes it.
//! Only braces are counted, so nested objects and arrays inside a record are
//! handled. Braces inside string values are counted as well: a string holding
//! an unbalanced `{` or `}` shifts every later extent. Index builds detect
//! this when the shifted slice fails to parse and report `MalformedRecord`.

use std::fmt;
use std::path::Path;

use crate::error::{GardenError, Result};

use super::{Locator, Record};

/// Structural failure found while scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// A record opened at `start` never closed
    Unterminated { start: usize },

    /// A closing brace at `offset` has no opening partner
    Unbalanced { offset: usize },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Unterminated { start } => {
                write!(f, "record opened at byte {} is never closed", start)
            }
            ScanError::Unbalanced { offset } => {
                write!(f, "unbalanced closing brace at byte {}", offset)
            }
        }
    }
}

impl ScanError {
    /// Attach the shard path, producing the engine-level error
    pub fn into_error(self, path: &Path, len: usize) -> GardenError {
        let (start, end) = match self {
            ScanError::Unterminated { start } => (start, len),
            ScanError::Unbalanced { offset } => (offset, offset + 1),
        };
        GardenError::MalformedRecord {
            path: path.to_path_buf(),
            start,
            end,
            reason: self.to_string(),
        }
    }
}

/// Scan a shard's bytes and return one Locator per top-level record
///
/// Single linear pass. Locators come back in file order.
pub fn scan(bytes: &[u8], shard: usize) -> std::result::Result<Vec<Locator>, ScanError> {
    let mut locators = Vec::new();
    let mut depth: usize = 0;
    let mut record_start = 0;

    for (offset, &byte) in bytes.iter().enumerate() {
        match byte {
            b'{' => {
                if depth == 1 {
                    record_start = offset;
                }
                depth += 1;
            }
            b'}' => {
                if depth == 0 {
                    return Err(ScanError::Unbalanced { offset });
                }
                depth -= 1;
                if depth == 1 {
                    locators.push(Locator::new(shard, record_start, offset + 1));
                }
            }
            _ => {}
        }
    }

    match depth {
        0 => Ok(locators),
        // The wrapping object itself was never closed
        1 => Err(ScanError::Unbalanced { offset: bytes.len() }),
        _ => Err(ScanError::Unterminated {
            start: record_start,
        }),
    }
}

/// The exact bytes a Locator points at
pub fn read_slice<'a>(bytes: &'a [u8], locator: &Locator) -> Option<&'a [u8]> {
    bytes.get(locator.start..locator.end)
}

/// Parse the bytes at `locator` as a standalone record
pub fn parse_record(bytes: &[u8], locator: &Locator, path: &Path) -> Result<Record> {
    let malformed = |reason: String| GardenError::MalformedRecord {
        path: path.to_path_buf(),
        start: locator.start,
        end: locator.end,
        reason,
    };

    let slice = read_slice(bytes, locator)
        .ok_or_else(|| malformed(format!("range exceeds file length {}", bytes.len())))?;

    serde_json::from_slice::<Record>(slice).map_err(|e| malformed(e.to_string()))
}
