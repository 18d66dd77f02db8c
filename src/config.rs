//! Configuration for GardenDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{GardenError, Result};

/// Size ceiling for one shard file before inserts roll over to the next one
pub const DEFAULT_MAX_SHARD_SIZE: u64 = 10_000_000;

/// Soft deletions accumulated (across all tables) before compaction runs
pub const DEFAULT_FLUSH_THRESHOLD: usize = 5;

/// Main configuration for a GardenDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all table files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── users.json       (primary shard)
    ///     ├── users_1.json     (rollover shard)
    ///     └── orders.json
    pub data_dir: PathBuf,

    /// Shard size ceiling (in bytes); a larger shard is closed to new inserts
    pub max_shard_size: u64,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Number of soft deletions that triggers compaction of every pending table
    pub flush_threshold: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max queued client connections waiting for a worker
    pub max_connections: usize,

    /// Worker threads serving connections
    pub worker_threads: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./gardendb_data"),
            max_shard_size: DEFAULT_MAX_SHARD_SIZE,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            listen_addr: "127.0.0.1:5000".to_string(),
            max_connections: 1024,
            worker_threads: 4,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_shard_size == 0 {
            return Err(GardenError::Config(
                "max_shard_size must be greater than zero".to_string(),
            ));
        }
        if self.flush_threshold == 0 {
            return Err(GardenError::Config(
                "flush_threshold must be greater than zero".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(GardenError::Config(
                "worker_threads must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all table files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the shard size ceiling (in bytes)
    pub fn max_shard_size(mut self, size: u64) -> Self {
        self.config.max_shard_size = size;
        self
    }

    /// Set the soft-deletion count that triggers compaction
    pub fn flush_threshold(mut self, count: usize) -> Self {
        self.config.flush_threshold = count;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of queued connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the number of worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
