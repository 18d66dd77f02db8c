//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, TrySendError};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{GardenError, Result};

use super::Connection;

/// TCP server for GardenDB
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Poll interval of the non-blocking accept loop
    const ACCEPT_POLL: Duration = Duration::from_millis(10);

    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the listen address, returning the bound address
    ///
    /// Useful with port 0 to learn the assigned port before `run`.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            GardenError::Network(format!("failed to bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Start the server (blocking until shutdown)
    ///
    /// Accepted streams go through a bounded channel to a fixed pool of
    /// workers. When the queue is full, new connections are dropped.
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err(GardenError::Network("listener not bound".to_string())),
        };

        tracing::info!(
            "Listening on {} with {} workers",
            listener.local_addr()?,
            self.config.worker_threads
        );

        let (sender, receiver) = channel::bounded::<TcpStream>(self.config.max_connections.max(1));

        let mut workers = Vec::with_capacity(self.config.worker_threads);
        for worker_id in 0..self.config.worker_threads {
            let receiver = receiver.clone();
            let engine = Arc::clone(&self.engine);
            let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

            workers.push(thread::spawn(move || {
                for stream in receiver.iter() {
                    if let Err(e) = serve(stream, Arc::clone(&engine), read_ms, write_ms) {
                        tracing::warn!("Worker {} connection error: {}", worker_id, e);
                    }
                }
            }));
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    tracing::trace!("Accepted connection from {}", addr);
                    match sender.try_send(stream) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::warn!("Connection queue full, dropping {}", addr);
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Self::ACCEPT_POLL);
                }
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        tracing::info!("Shutting down, waiting for workers");
        drop(sender);
        for worker in workers {
            let _ = worker.join();
        }

        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Shared flag that stops `run` when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }
}

fn serve(stream: TcpStream, engine: Arc<Engine>, read_ms: u64, write_ms: u64) -> Result<()> {
    // Accepted sockets may inherit the listener's non-blocking mode
    stream.set_nonblocking(false)?;

    let mut connection = Connection::new(stream, engine)?;
    connection.set_timeouts(read_ms, write_ms)?;
    connection.handle()
}
