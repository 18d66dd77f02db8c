//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │     Payload (JSON object)   │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! - INSERT:       {"table", "record"}
//! - SELECT:       {"table", "condition"}
//! - UPDATE:       {"table", "condition", "patch"}
//! - DELETE:       {"table", "condition"}
//! - FLUSH:        {"table"}
//! - CREATE_INDEX: {"table", "fields"}
//! - PING:         empty
//!
//! Conditions travel in their text form: `"id" == 3`.
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GardenError, Result};
use crate::query::Condition;
use crate::storage::Record;

use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Payload Shapes
// =============================================================================

#[derive(Serialize, Deserialize)]
struct TablePayload {
    table: String,
}

#[derive(Serialize, Deserialize)]
struct InsertPayload {
    table: String,
    record: Record,
}

#[derive(Serialize, Deserialize)]
struct ConditionPayload {
    table: String,
    condition: Condition,
}

#[derive(Serialize, Deserialize)]
struct UpdatePayload {
    table: String,
    condition: Condition,
    patch: Record,
}

#[derive(Serialize, Deserialize)]
struct IndexPayload {
    table: String,
    fields: Vec<String>,
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let cmd_type = command.command_type() as u8;

    let payload = match command.clone() {
        Command::Insert { table, record } => serde_json::to_vec(&InsertPayload { table, record })?,
        Command::Select { table, condition } | Command::Delete { table, condition } => {
            serde_json::to_vec(&ConditionPayload { table, condition })?
        }
        Command::Update {
            table,
            condition,
            patch,
        } => serde_json::to_vec(&UpdatePayload {
            table,
            condition,
            patch,
        })?,
        Command::Flush { table } => serde_json::to_vec(&TablePayload { table })?,
        Command::CreateIndex { table, fields } => {
            serde_json::to_vec(&IndexPayload { table, fields })?
        }
        Command::Ping => Vec::new(),
    };

    encode_frame(cmd_type, &payload)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "command")?;

    let command_type = CommandType::from_byte(cmd_type).ok_or_else(|| {
        GardenError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_type))
    })?;

    let command = match command_type {
        CommandType::Insert => {
            let p: InsertPayload = decode_payload(payload, "INSERT")?;
            Command::Insert {
                table: p.table,
                record: p.record,
            }
        }
        CommandType::Select => {
            let p: ConditionPayload = decode_payload(payload, "SELECT")?;
            Command::Select {
                table: p.table,
                condition: p.condition,
            }
        }
        CommandType::Update => {
            let p: UpdatePayload = decode_payload(payload, "UPDATE")?;
            Command::Update {
                table: p.table,
                condition: p.condition,
                patch: p.patch,
            }
        }
        CommandType::Delete => {
            let p: ConditionPayload = decode_payload(payload, "DELETE")?;
            Command::Delete {
                table: p.table,
                condition: p.condition,
            }
        }
        CommandType::Flush => {
            let p: TablePayload = decode_payload(payload, "FLUSH")?;
            Command::Flush { table: p.table }
        }
        CommandType::CreateIndex => {
            let p: IndexPayload = decode_payload(payload, "CREATE_INDEX")?;
            Command::CreateIndex {
                table: p.table,
                fields: p.fields,
            }
        }
        CommandType::Ping => {
            if !payload.is_empty() {
                return Err(GardenError::Protocol(format!(
                    "PING command: unexpected payload of {} bytes",
                    payload.len()
                )));
            }
            Command::Ping
        }
    };

    Ok(command)
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8], name: &str) -> Result<T> {
    serde_json::from_slice(payload)
        .map_err(|e| GardenError::Protocol(format!("{} command: invalid payload: {}", name, e)))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    encode_frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        _ => {
            return Err(GardenError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Framing
// =============================================================================

fn encode_frame(tag: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(GardenError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(tag);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    Ok(message)
}

/// Validate a frame and return its tag byte and payload
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(GardenError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = frame_len(&bytes[..HEADER_SIZE])?;

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(GardenError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

/// Payload length from a header, checked against the maximum
fn frame_len(header: &[u8]) -> Result<usize> {
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(GardenError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(payload_len as usize)
}

/// Read one whole frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = frame_len(&header)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut message[HEADER_SIZE..])?;
    }
    Ok(message)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    decode_response(&read_frame(reader)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
