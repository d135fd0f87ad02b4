use crate::config::{create_hasher, Config};
use crate::error::Error;
use crate::hash::ShardHasher;
use crate::shard::Shard;
use crate::stats::{Diagnostics, ShardDiagnostics, ShardOps, Stats};
use crossbeam_utils::CachePadded;
use std::borrow::Borrow;
use std::hash::Hash;

/// Concurrent sharded hash map.
///
/// Entries are spread across independently locked shards by the low bits of
/// a 64-bit key fingerprint; each shard is an open-addressed Robin Hood
/// table that consumes the high 48 bits of the same fingerprint. Operations
/// on different shards never block each other, and each shard sits on its
/// own cache line so the locks don't false-share.
///
/// Reads take a shard's shared lock, writes its exclusive lock. There are no
/// cross-shard consistency guarantees: [`len`](ShardMap::len) and
/// [`range`](ShardMap::range) sweep the shards one at a time and may observe
/// a state no single instant agrees upon.
///
/// # Example
///
/// ```rust
/// use robinmap::ShardMap;
///
/// let map = ShardMap::new();
/// map.insert("key1", "value1");
///
/// if let Some(value) = map.get(&"key1") {
///     println!("Found: {}", value);
/// }
/// ```
pub struct ShardMap<K, V> {
    shards: Box<[CachePadded<Shard<K, V>>]>,
    shard_mask: usize,
    hasher: ShardHasher,
    cap: usize,
}

impl<K, V> ShardMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    /// Create a new map with defaults: ahash, and the smallest power-of-two
    /// shard count at least 16x the logical CPU count.
    pub fn new() -> Self {
        Self::with_config(Config::default()).unwrap()
    }

    /// Create a new map sized for at least `capacity` entries, spread across
    /// the default shard count. The capacity also acts as a floor that
    /// shrinking never drops below.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Config::default().capacity(capacity)).unwrap()
    }

    /// Create a new map with custom config.
    pub fn with_config(config: Config) -> Result<Self, Error> {
        if config.shard_count == 0 || !config.shard_count.is_power_of_two() {
            return Err(Error::InvalidShardCount);
        }

        let shard_count = config.shard_count;
        let cap_per_shard = config.capacity / shard_count;
        let shards: Vec<CachePadded<Shard<K, V>>> = (0..shard_count)
            .map(|_| CachePadded::new(Shard::with_capacity(cap_per_shard)))
            .collect();

        Ok(Self {
            shards: shards.into_boxed_slice(),
            shard_mask: shard_count - 1,
            hasher: create_hasher(config.hash_function),
            cap: config.capacity,
        })
    }

    /// Returns the fingerprint of a key for shard routing. Use with
    /// [`shard_for_hash`](ShardMap::shard_for_hash) when you already have a
    /// hash.
    #[inline]
    pub fn hash_for_key<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        self.hasher.fingerprint(key)
    }

    /// Returns which shard index the given fingerprint maps to.
    #[inline]
    pub fn shard_for_hash(&self, hash: u64) -> usize {
        (hash as usize) & self.shard_mask
    }

    /// Returns which shard index the given key maps to.
    ///
    /// Shard assignment is a pure function of the key for the lifetime of
    /// the map; use this for observability or shard-aware logic, e.g. to
    /// interpret `stats().operations[shard_for_key(k)]`.
    #[inline]
    pub fn shard_for_key<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        self.shard_for_hash(self.hash_for_key(key))
    }

    /// The number of shards, fixed at construction.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard_and_fp<Q>(&self, key: &Q) -> (&Shard<K, V>, u64)
    where
        Q: Hash + ?Sized,
    {
        let fp = self.hasher.fingerprint(key);
        (&*self.shards[(fp as usize) & self.shard_mask], fp)
    }

    /// Insert or overwrite. Returns the previous value if the key was
    /// already present.
    ///
    /// # Example
    ///
    /// ```rust
    /// use robinmap::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// assert!(map.insert("key", "value").is_none());
    /// assert_eq!(map.insert("key", "new_value"), Some("value"));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let (shard, fp) = self.shard_and_fp(&key);
        shard.insert(fp, key, value)
    }

    /// Get a clone of the value for a key, under the shard's shared lock.
    ///
    /// The borrowed form `Q` must hash identically to the owned key form.
    ///
    /// # Example
    ///
    /// ```rust
    /// use robinmap::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.insert("key".to_string(), 7);
    /// assert_eq!(map.get("key"), Some(7));
    /// assert_eq!(map.get("missing"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let (shard, fp) = self.shard_and_fp(key);
        shard.get(fp, key)
    }

    /// Apply `f` to the value for a key under the shard's shared lock,
    /// without cloning the value out. `f` must not call back into this map
    /// (the shard lock is held while it runs).
    ///
    /// # Example
    ///
    /// ```rust
    /// use robinmap::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.insert("greeting".to_string(), "hello".to_string());
    /// assert_eq!(map.get_with("greeting", |v| v.len()), Some(5));
    /// ```
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        let (shard, fp) = self.shard_and_fp(key);
        shard.get_with(fp, key, f)
    }

    /// Returns whether the map contains a value for the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (shard, fp) = self.shard_and_fp(key);
        shard.contains_key(fp, key)
    }

    /// Remove a key-value pair, returning the value if it existed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use robinmap::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.insert("key", "value");
    /// assert_eq!(map.remove(&"key"), Some("value"));
    /// assert_eq!(map.remove(&"key"), None);
    /// ```
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (shard, fp) = self.shard_and_fp(key);
        shard.remove(fp, key)
    }

    /// Atomically read-modify-write the entry for `key` under its shard's
    /// exclusive lock.
    ///
    /// `f` is called with the current value (`None` when the key is absent)
    /// and returns the new state: `Some(v)` inserts or overwrites with `v`,
    /// `None` removes the entry (a no-op when it was already absent).
    /// Returns the resulting change in map size: +1, -1, or 0.
    ///
    /// `f` runs while the shard's exclusive lock is held: it must not call
    /// back into this map, or it may deadlock. If `f` panics the lock is
    /// released before the panic propagates.
    ///
    /// # Example
    ///
    /// ```rust
    /// use robinmap::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// // Insert-if-absent: the key is new, so the delta is +1.
    /// assert_eq!(map.mutate("visits", |old| Some(old.copied().unwrap_or(0) + 1)), 1);
    /// // Increment in place: the key exists, so the delta is 0.
    /// assert_eq!(map.mutate("visits", |old| Some(old.copied().unwrap_or(0) + 1)), 0);
    /// assert_eq!(map.get("visits"), Some(2));
    /// // Conditional removal.
    /// assert_eq!(map.mutate("visits", |_| None), -1);
    /// assert_eq!(map.mutate("visits", |_| None), 0);
    /// ```
    pub fn mutate<F>(&self, key: K, f: F) -> isize
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let (shard, fp) = self.shard_and_fp(&key);
        shard.mutate(fp, key, f)
    }

    /// Total number of entries, summed over a sequential sweep that takes
    /// each shard's exclusive lock in turn. The sweep serializes with
    /// pending writers per shard, but the total reflects no single instant.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    /// Total slot count across all shards.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(|shard| shard.capacity()).sum()
    }

    /// Visit every entry, one shard at a time under that shard's shared
    /// lock. The visitor returns false to stop early. Entries mutated in
    /// shards not yet visited may or may not be observed.
    ///
    /// The visitor must not call back into this map (the shard lock is held
    /// while it runs).
    ///
    /// # Example
    ///
    /// ```rust
    /// use robinmap::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.insert("a", 1);
    /// map.insert("b", 2);
    ///
    /// let mut total = 0;
    /// map.range(|_key, value| {
    ///     total += value;
    ///     true
    /// });
    /// assert_eq!(total, 3);
    /// ```
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for shard in self.shards.iter() {
            if !shard.for_each(&mut visit) {
                break;
            }
        }
    }

    /// Remove all entries, reinitializing each shard in turn under its
    /// exclusive lock. Shard count and capacity floor are preserved.
    pub fn clear(&self) {
        let cap_per_shard = self.cap / self.shards.len();
        for shard in self.shards.iter() {
            shard.clear(cap_per_shard);
        }
    }

    /// Per-shard entry counts. Use for imbalance detection.
    pub fn shard_loads(&self) -> Vec<usize> {
        self.shards.iter().map(|shard| shard.len()).collect()
    }

    /// Get detailed statistics about the map and its shards.
    pub fn stats(&self) -> Stats {
        let shard_sizes = self.shard_loads();
        let operations: Vec<ShardOps> = self.shards.iter().map(|s| s.stats()).collect();
        let size: usize = shard_sizes.iter().sum();

        Stats {
            size,
            shard_sizes,
            operations,
        }
    }

    /// Structured diagnostics snapshot: per-shard entry counts, capacities,
    /// operation counters, and load aggregates.
    pub fn diagnostics(&self) -> Diagnostics {
        let shards: Vec<ShardDiagnostics> = self
            .shards
            .iter()
            .map(|s| s.diagnostics_snapshot())
            .collect();
        let total_entries: usize = shards.iter().map(|s| s.entries).sum();
        let n = self.shards.len() as f64;
        let avg_load_per_shard = if n > 0.0 { total_entries as f64 / n } else { 0.0 };
        let max_load = shards.iter().map(|s| s.entries).max().unwrap_or(0) as f64;
        let max_load_ratio = if avg_load_per_shard > 0.0 {
            max_load / avg_load_per_shard
        } else {
            1.0
        };
        let total_operations: u64 = shards.iter().map(|s| s.reads + s.writes + s.removes).sum();

        Diagnostics {
            total_entries,
            shards,
            total_operations,
            avg_load_per_shard,
            max_load_ratio,
        }
    }

    /// Create a snapshot-based iterator over clones of all entries.
    ///
    /// The snapshot is captured shard by shard up front; concurrent
    /// modifications made afterwards are not seen.
    ///
    /// # Example
    ///
    /// ```rust
    /// use robinmap::ShardMap;
    ///
    /// let map = ShardMap::new();
    /// map.insert("key1", "value1");
    /// map.insert("key2", "value2");
    ///
    /// assert_eq!(map.iter_snapshot().count(), 2);
    /// ```
    pub fn iter_snapshot(&self) -> crate::iter::SnapshotIter<K, V>
    where
        K: Clone,
        V: Clone,
    {
        crate::iter::SnapshotIter::new(&self.shards)
    }

    /// Create an iterator that buffers one shard at a time under its read
    /// lock, so later shards reflect modifications made while earlier shards
    /// were being consumed.
    pub fn iter_concurrent(&self) -> crate::iter::ConcurrentIter<'_, K, V>
    where
        K: Clone,
        V: Clone,
    {
        crate::iter::ConcurrentIter::new(&self.shards)
    }
}

impl<K, V> Default for ShardMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
