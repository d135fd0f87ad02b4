//! Statistics and diagnostics types.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-shard operation counters.
///
/// `writes` counts entries that were newly inserted, `reads` counts lookup
/// hits, and `removes` counts entries actually removed, so the numbers stay
/// meaningful for load-shape analysis rather than raw call volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardOps {
    /// Lookup hits on this shard.
    pub reads: u64,
    /// New entries inserted into this shard.
    pub writes: u64,
    /// Entries removed from this shard.
    pub removes: u64,
}

/// Relaxed atomic counters for a single shard. The numbers are advisory and
/// carry no ordering relative to the shard lock.
pub(crate) struct ShardStats {
    reads: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
}

impl ShardStats {
    pub fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            removes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ShardOps {
        ShardOps {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }
}

impl Default for ShardStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics for a map instance.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Total number of entries across all shards.
    pub size: usize,
    /// Number of entries in each shard.
    pub shard_sizes: Vec<usize>,
    /// Operation counts for each shard.
    pub operations: Vec<ShardOps>,
}

/// Per-shard diagnostics snapshot.
#[derive(Debug, Clone)]
pub struct ShardDiagnostics {
    /// Number of entries in this shard.
    pub entries: usize,
    /// Slot count of this shard's table.
    pub capacity: usize,
    /// Lookup hits on this shard.
    pub reads: u64,
    /// New entries inserted into this shard.
    pub writes: u64,
    /// Entries removed from this shard.
    pub removes: u64,
}

/// Structured snapshot for performance introspection.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Total number of entries across all shards.
    pub total_entries: usize,
    /// Per-shard diagnostics.
    pub shards: Vec<ShardDiagnostics>,
    /// Total read + write + remove operations across all shards.
    pub total_operations: u64,
    /// Average load (entries) per shard.
    pub avg_load_per_shard: f64,
    /// Max load / avg load ratio. User interprets (e.g. threshold 2.0 for
    /// imbalance).
    pub max_load_ratio: f64,
}
