//! Connection Handler
//!
//! One client session: read a frame, run it against the engine, answer.

use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{GardenError, Result};
use crate::protocol::{read_command, write_response, Command, Response, MAX_PAYLOAD_SIZE};

/// Serves a single client until it hangs up
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,

    /// Shared storage engine
    engine: Arc<Engine>,

    /// Peer address, used only in log lines
    peer: String,
}

/// How a session ended without an error worth reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hangup {
    Closed,
    Idle,
}

impl Connection {
    /// Wrap an accepted stream
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_string(), |a| a.to_string());

        // Frames are small and request/response, so don't batch them
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            engine,
            peer,
        })
    }

    /// Apply socket timeouts (0 leaves a direction without one)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let millis = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));

        self.reader.get_ref().set_read_timeout(millis(read_ms))?;
        self.writer.get_ref().set_write_timeout(millis(write_ms))?;
        Ok(())
    }

    /// Run the request loop until the client disconnects or goes idle
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Client {} connected", self.peer);

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(command) => command,
                Err(GardenError::Io(e)) => match hangup(&e) {
                    Some(reason) => {
                        tracing::debug!("Client {} session ended ({:?})", self.peer, reason);
                        return Ok(());
                    }
                    None => return Err(GardenError::Io(e)),
                },
                Err(e) => {
                    // Framing is lost after a bad frame: report it and close
                    tracing::warn!("Rejected frame from {}: {}", self.peer, e);
                    let _ = write_response(&mut self.writer, &Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!(
                "Frame from {}: {:?} on {:?}",
                self.peer,
                command.command_type(),
                command.table()
            );

            let response = self.dispatch(command);
            match write_response(&mut self.writer, &response) {
                Ok(()) => {}
                Err(GardenError::Io(e)) if hangup(&e) == Some(Hangup::Closed) => {
                    tracing::debug!("Client {} left before its response was sent", self.peer);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one command, folding the outcome into a status frame
    fn dispatch(&self, command: Command) -> Response {
        let outcome = self.engine.execute(command).and_then(|value| match value {
            Some(value) => Response::ok_json(&value),
            None => Ok(Response::ok(None)),
        });

        match outcome {
            Ok(response) => {
                let size = response.payload.as_ref().map_or(0, Vec::len);
                // A frame this large can't be written, so answer with an error instead
                if size > MAX_PAYLOAD_SIZE as usize {
                    tracing::warn!(
                        "Response for {} is {} bytes, over the {} byte frame limit",
                        self.peer,
                        size,
                        MAX_PAYLOAD_SIZE
                    );
                    Response::error(&format!(
                        "Response too large: {} bytes (max {})",
                        size, MAX_PAYLOAD_SIZE
                    ))
                } else {
                    response
                }
            }
            Err(e) if e.is_not_found() => Response::not_found(&e.to_string()),
            Err(e) => {
                tracing::debug!("Command from {} failed: {}", self.peer, e);
                Response::error(&e.to_string())
            }
        }
    }

    /// Peer address as text
    pub fn peer_addr(&self) -> &str {
        &self.peer
    }
}

/// Classify I/O errors that simply end a session
fn hangup(e: &io::Error) -> Option<Hangup> {
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => Some(Hangup::Closed),
        // Read timeout (Windows reports TimedOut instead of WouldBlock)
        ErrorKind::WouldBlock | ErrorKind::TimedOut => Some(Hangup::Idle),
        _ => None,
    }
}
