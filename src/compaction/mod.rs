//! Compaction Module
//!
//! Soft deletes and the rewrite that reclaims their space.
//!
//! ## Record Lifecycle
//! ```text
//!   Active ──mark()──► Marked ──compaction──► Compacted
//!   (visible)          (hidden from select,   (bytes removed,
//!                       bytes still on disk)   marker cleared)
//! ```
//!
//! ## Trigger
//! One counter is shared by every table. When it reaches the configured
//! threshold, every table with pending markers is compacted, not only the
//! table whose delete tipped the count.

mod markers;
mod rewrite;

pub use markers::DeleteManager;
pub use rewrite::{compact_table, CompactionStats};
