//! # robinmap
//!
//! A concurrent sharded hash map built on Robin Hood probing.
//!
//! Entries are spread across independently locked shards by a 64-bit key
//! fingerprint: the low bits pick the shard, the high 48 bits pick the
//! bucket inside it and pre-filter probing, so operations on unrelated keys
//! proceed in parallel. Each shard is an open-addressed table with Robin
//! Hood displacement on insert and tombstone-free backward-shift deletion,
//! which keeps probe lengths short even at the 0.85 load factor.
//!
//! ## Features
//!
//! - **Parallel by construction**: one reader/writer lock per shard, each
//!   padded to its own cache line
//! - **Bounded probes**: Robin Hood displacement keeps worst-case lookups
//!   close to the average
//! - **No tombstones**: deletions shift probe chains backward instead of
//!   leaving dead slots
//! - **Atomic read-modify-write**: [`mutate`](ShardMap::mutate) runs a
//!   closure under the owning shard's exclusive lock
//! - **Observable**: per-shard sizes, operation counters, and load-balance
//!   diagnostics
//!
//! ## Example
//!
//! ```rust
//! use robinmap::ShardMap;
//!
//! let map = ShardMap::new();
//!
//! // Insert values
//! map.insert("key1", "value1");
//! map.insert("key2", "value2");
//!
//! // Read values
//! if let Some(value) = map.get(&"key1") {
//!     println!("Found: {}", value);
//! }
//!
//! // Atomically insert-or-update
//! map.mutate("key1", |_old| Some("updated"));
//!
//! // Iterate over entries
//! map.range(|key, value| {
//!     println!("{}: {}", key, value);
//!     true
//! });
//!
//! // Get statistics
//! let stats = map.stats();
//! println!("Total entries: {}", stats.size);
//! ```
//!
//! ## Configuration
//!
//! The shard count defaults to the smallest power of two at least 16x the
//! logical CPU count, fixed for the lifetime of the map.
//!
//! ```rust
//! use robinmap::ShardMapBuilder;
//!
//! let map = ShardMapBuilder::new()
//!     .shard_count(32)?  // Must be a power of two
//!     .capacity(10_000)
//!     .build::<String, i32>()?;
//! # Ok::<(), robinmap::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Configuration and builder types.
pub mod config;
/// Error types.
pub mod error;
/// Hash function implementations.
pub mod hash;
/// Iterator implementations.
pub mod iter;
/// Main sharded map implementation.
pub mod map;
/// Internal shard implementation: one lock around one table.
mod shard;
/// Statistics and metrics collection.
pub mod stats;
/// Internal Robin Hood hash table.
mod table;

// Re-export main types
pub use config::{Config, HashFunction, ShardMapBuilder};
pub use error::Error;
pub use map::ShardMap;
pub use stats::{Diagnostics, ShardDiagnostics, ShardOps, Stats};
