//! TCP Client
//!
//! Blocking client used by the CLI and the network tests.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;

use crate::error::{GardenError, Result};
use crate::protocol::{read_response, write_command, Command, Response, Status};

/// A connection to a GardenDB server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to `addr` (host:port)
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| GardenError::Network(format!("failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Send one command and wait for its response
    pub fn execute(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    /// Round-trip a PING
    pub fn ping(&mut self) -> Result<()> {
        let response = self.execute(&Command::Ping)?;
        match response.status {
            Status::Ok => Ok(()),
            _ => Err(GardenError::Protocol(format!(
                "unexpected PING response: {}",
                response.message()
            ))),
        }
    }
}
