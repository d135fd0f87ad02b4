use crate::stats::{ShardDiagnostics, ShardOps, ShardStats};
use crate::table::Table;
use parking_lot::RwLock;
use std::borrow::Borrow;

/// A single shard: one Robin Hood table behind a read-write lock, plus
/// operation counters. All callers arrive with the key's fingerprint already
/// computed; the shard never hashes anything itself.
///
/// The lock guards are RAII, so a panicking user callback (in `mutate` or a
/// range visitor) releases the lock on unwind before the panic propagates.
pub(crate) struct Shard<K, V> {
    table: RwLock<Table<K, V>>,
    stats: ShardStats,
}

impl<K: Eq, V> Shard<K, V> {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            table: RwLock::new(Table::with_capacity(cap)),
            stats: ShardStats::new(),
        }
    }

    /// Insert a key-value pair, returning the previous value if any.
    pub fn insert(&self, fp: u64, key: K, value: V) -> Option<V> {
        let prev = self.table.write().set(fp, key, value);
        if prev.is_none() {
            self.stats.record_write();
        }
        prev
    }

    /// Clone out the value for a key under the shard's read lock.
    pub fn get<Q>(&self, fp: u64, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        V: Clone,
    {
        let table = self.table.read();
        let value = table.get(fp, key).cloned();
        if value.is_some() {
            self.stats.record_read();
        }
        value
    }

    /// Apply `f` to the value for a key under the shard's read lock, without
    /// cloning it out.
    pub fn get_with<Q, F, R>(&self, fp: u64, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        let table = self.table.read();
        let out = table.get(fp, key).map(f);
        if out.is_some() {
            self.stats.record_read();
        }
        out
    }

    pub fn contains_key<Q>(&self, fp: u64, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.table.read().get(fp, key).is_some()
    }

    /// Remove a key-value pair, returning the value if it existed.
    pub fn remove<Q>(&self, fp: u64, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let prev = self.table.write().delete(fp, key);
        if prev.is_some() {
            self.stats.record_remove();
        }
        prev
    }

    /// Atomic read-modify-write under the shard's exclusive lock. `f` sees
    /// the current value (`None` when absent) and decides the new state:
    /// `Some` inserts or overwrites, `None` removes. Returns the map size
    /// delta: +1 for an addition, -1 for a removal, 0 otherwise.
    pub fn mutate<F>(&self, fp: u64, key: K, f: F) -> isize
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let mut table = self.table.write();
        let current = table.get(fp, &key);
        let existed = current.is_some();
        match f(current) {
            Some(value) => {
                table.set(fp, key, value);
                if existed {
                    0
                } else {
                    self.stats.record_write();
                    1
                }
            }
            None => {
                if existed {
                    table.delete(fp, &key);
                    self.stats.record_remove();
                    -1
                } else {
                    0
                }
            }
        }
    }

    /// Entry count under the shard's exclusive lock, so the reading
    /// serializes behind any in-flight writer.
    pub fn len(&self) -> usize {
        self.table.write().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.table.read().capacity()
    }

    /// Reinitialize the table in place, keeping `cap` as the new floor.
    pub fn clear(&self, cap: usize) {
        *self.table.write() = Table::with_capacity(cap);
    }

    /// Visit this shard's entries under its read lock. Returns false if the
    /// visitor stopped early.
    pub fn for_each<F>(&self, visit: &mut F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.table.read().range(visit)
    }

    /// Clone this shard's entries into `out` under its read lock.
    pub fn snapshot_into(&self, out: &mut Vec<(K, V)>)
    where
        K: Clone,
        V: Clone,
    {
        let table = self.table.read();
        let mut push = |k: &K, v: &V| {
            out.push((k.clone(), v.clone()));
            true
        };
        table.range(&mut push);
    }

    /// Get a snapshot of statistics for this shard.
    pub fn stats(&self) -> ShardOps {
        self.stats.snapshot()
    }

    pub fn diagnostics_snapshot(&self) -> ShardDiagnostics {
        let table = self.table.read();
        let ops = self.stats.snapshot();
        ShardDiagnostics {
            entries: table.len(),
            capacity: table.capacity(),
            reads: ops.reads,
            writes: ops.writes,
            removes: ops.removes,
        }
    }
}
