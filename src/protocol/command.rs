//! Command definitions
//!
//! Represents commands from clients.

use crate::query::Condition;
use crate::storage::Record;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Insert = 0x01,
    Select = 0x02,
    Update = 0x03,
    Delete = 0x04,
    Flush = 0x05,
    CreateIndex = 0x06,
    Ping = 0x07,
}

impl CommandType {
    /// Map a wire byte back to a command type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Insert),
            0x02 => Some(CommandType::Select),
            0x03 => Some(CommandType::Update),
            0x04 => Some(CommandType::Delete),
            0x05 => Some(CommandType::Flush),
            0x06 => Some(CommandType::CreateIndex),
            0x07 => Some(CommandType::Ping),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Append a record (the engine assigns its id)
    Insert { table: String, record: Record },

    /// Fetch every live record matching the condition
    Select { table: String, condition: Condition },

    /// Merge `patch` into every live record matching the condition
    Update {
        table: String,
        condition: Condition,
        patch: Record,
    },

    /// Soft-delete every live record matching the condition
    Delete { table: String, condition: Condition },

    /// Compact one table now
    Flush { table: String },

    /// Build indexes for the named fields eagerly
    CreateIndex { table: String, fields: Vec<String> },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Insert { .. } => CommandType::Insert,
            Command::Select { .. } => CommandType::Select,
            Command::Update { .. } => CommandType::Update,
            Command::Delete { .. } => CommandType::Delete,
            Command::Flush { .. } => CommandType::Flush,
            Command::CreateIndex { .. } => CommandType::CreateIndex,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Target table (None for Ping)
    pub fn table(&self) -> Option<&str> {
        match self {
            Command::Insert { table, .. }
            | Command::Select { table, .. }
            | Command::Update { table, .. }
            | Command::Delete { table, .. }
            | Command::Flush { table }
            | Command::CreateIndex { table, .. } => Some(table),
            Command::Ping => None,
        }
    }
}
