//! GardenDB Server Binary
//!
//! Starts the TCP server for GardenDB.

use std::sync::Arc;

use clap::Parser;
use gardendb::network::Server;
use gardendb::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// GardenDB Server
#[derive(Parser, Debug)]
#[command(name = "gardendb-server")]
#[command(about = "File-backed document store with locator indexes")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./gardendb_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    listen: String,

    /// Maximum queued connections waiting for a worker
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Shard size ceiling in MB before inserts roll over to a new shard
    #[arg(long, default_value = "10")]
    max_shard_mb: u64,

    /// Soft deletions (across all tables) that trigger compaction
    #[arg(long, default_value = "5")]
    flush_threshold: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gardendb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("GardenDB Server v{}", gardendb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .max_shard_size(args.max_shard_mb * 1_000_000)
        .flush_threshold(args.flush_threshold)
        .build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    // Start server
    let mut server = Server::new(config, engine);
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
