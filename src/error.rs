//! Error types for GardenDB
//!
//! Provides a unified error type for all operations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using GardenError
pub type Result<T> = std::result::Result<T, GardenError>;

/// Why a predicate produced no records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No record in the table carries the field at all
    FieldAbsent,

    /// The field exists but no record holds the requested value
    NoMatch,

    /// Every matching record is soft-deleted
    AllDeleted,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::FieldAbsent => write!(f, "field is absent from every record"),
            MissReason::NoMatch => write!(f, "no record holds the value"),
            MissReason::AllDeleted => write!(f, "all matching records are deleted"),
        }
    }
}

/// Unified error type for GardenDB operations
#[derive(Debug, Error)]
pub enum GardenError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Table Errors
    // -------------------------------------------------------------------------
    #[error("Table {0} does not exist")]
    TableMissing(String),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("No matching records found in table {table} for condition {condition} ({reason})")]
    NotFound {
        table: String,
        condition: String,
        reason: MissReason,
    },

    #[error("Malformed record in {} at bytes {start}..{end}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        start: usize,
        end: usize,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Query Errors
    // -------------------------------------------------------------------------
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("Query error: {0}")]
    Query(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for GardenError {
    fn from(e: serde_json::Error) -> Self {
        GardenError::Serialization(e.to_string())
    }
}

impl GardenError {
    /// True for the "predicate matched nothing" family
    pub fn is_not_found(&self) -> bool {
        matches!(self, GardenError::NotFound { .. })
    }
}
