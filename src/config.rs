use crate::error::Error;
use crate::hash::ShardHasher;

/// Which hash function fingerprints keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// Use ahash (default, fast and well-distributed).
    #[default]
    AHash,
    /// Use xxh3 (fast on long keys, well-distributed).
    #[cfg(feature = "xxh3")]
    Xxh3,
}

/// Smallest power of two at least 16x the logical CPU count. Read once per
/// map construction; the shard count never changes afterwards.
pub(crate) fn default_shard_count() -> usize {
    (num_cpus::get().max(1) * 16).next_power_of_two()
}

/// Configuration for a [`ShardMap`](crate::ShardMap) instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) shard_count: usize,
    pub(crate) capacity: usize,
    pub(crate) hash_function: HashFunction,
}

impl Config {
    /// Create a new config with defaults (CPU-derived shard count, no
    /// capacity hint, ahash).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of shards. Must be a power of two and greater than 0.
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        if count == 0 || !count.is_power_of_two() {
            return Err(Error::InvalidShardCount);
        }
        self.shard_count = count;
        Ok(self)
    }

    /// Set the total capacity hint, spread across shards. This is also the
    /// floor that per-shard shrinking never drops below.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.hash_function = hash_fn;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
            capacity: 0,
            hash_function: HashFunction::default(),
        }
    }
}

/// Builder for creating a [`ShardMap`](crate::ShardMap) with custom
/// configuration.
pub struct ShardMapBuilder {
    config: Config,
}

impl ShardMapBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the number of shards. Must be a power of two and greater than 0.
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.shard_count(count)?;
        Ok(self)
    }

    /// Set the total capacity hint, spread across shards.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.capacity(capacity);
        self
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.config = self.config.hash_function(hash_fn);
        self
    }

    /// Build a map with the configured settings.
    pub fn build<K, V>(self) -> Result<crate::ShardMap<K, V>, Error>
    where
        K: std::hash::Hash + Eq + Send + Sync,
        V: Send + Sync,
    {
        crate::ShardMap::with_config(self.config)
    }
}

impl Default for ShardMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a hash function instance based on the configuration.
pub(crate) fn create_hasher(hash_fn: HashFunction) -> ShardHasher {
    match hash_fn {
        HashFunction::AHash => ShardHasher::AHash,
        #[cfg(feature = "xxh3")]
        HashFunction::Xxh3 => ShardHasher::Xxh3,
    }
}
