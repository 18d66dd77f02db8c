//! # GardenDB
//!
//! A minimal, file-backed document store with:
//! - Named tables persisted as JSON documents, sharded by size
//! - Per-field locator indexes ("the Garden") built from byte ranges
//! - Soft deletes with threshold-triggered compaction
//! - One engine-wide lock serializing every operation
//! - TCP-based client protocol and a small query language
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             TCP Server / Query Language                      │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │                (single engine-wide lock)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┐
//!          │            │                 │
//!          ▼            ▼                 ▼
//!   ┌─────────────┐ ┌──────────┐  ┌───────────────┐
//!   │   Garden    │ │  Delete  │  │  Table Files  │
//!   │ (locators)  │ │ markers  │  │   (shards)    │
//!   └──────┬──────┘ └──────────┘  └───────▲───────┘
//!          │                              │
//!          └────── Record Scanner ────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod garden;
pub mod compaction;
pub mod query;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GardenError, MissReason, Result};
pub use config::Config;
pub use engine::Engine;
pub use query::{Condition, Literal};
pub use storage::{Locator, Record};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of GardenDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
