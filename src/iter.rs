use crate::shard::Shard;
use crossbeam_utils::CachePadded;
use std::vec;

/// Snapshot-based iterator that captures the current state of the map.
///
/// Collects clones of all entries up front, one shard at a time under that
/// shard's read lock, then iterates with no locks held. Modifications made
/// after the snapshot are not seen, and the snapshot of each shard is
/// internally consistent.
pub struct SnapshotIter<K, V> {
    entries: vec::IntoIter<(K, V)>,
}

impl<K, V> SnapshotIter<K, V>
where
    K: Eq + Clone,
    V: Clone,
{
    pub(crate) fn new(shards: &[CachePadded<Shard<K, V>>]) -> Self {
        let mut entries = Vec::new();
        for shard in shards {
            shard.snapshot_into(&mut entries);
        }
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl<K, V> Iterator for SnapshotIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for SnapshotIter<K, V> {}

/// Iterator that visits shards one at a time.
///
/// Each shard's entries are buffered under its read lock when the iterator
/// reaches it, so later shards reflect concurrent modifications made while
/// earlier shards were being consumed. There is no cross-shard consistency.
pub struct ConcurrentIter<'a, K, V> {
    shards: &'a [CachePadded<Shard<K, V>>],
    current_shard: usize,
    buffer: vec::IntoIter<(K, V)>,
}

impl<'a, K, V> ConcurrentIter<'a, K, V>
where
    K: Eq + Clone,
    V: Clone,
{
    pub(crate) fn new(shards: &'a [CachePadded<Shard<K, V>>]) -> Self {
        Self {
            shards,
            current_shard: 0,
            buffer: Vec::new().into_iter(),
        }
    }
}

impl<'a, K, V> Iterator for ConcurrentIter<'a, K, V>
where
    K: Eq + Clone,
    V: Clone,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(item);
            }
            let shard = self.shards.get(self.current_shard)?;
            self.current_shard += 1;
            let mut buffer = Vec::new();
            shard.snapshot_into(&mut buffer);
            self.buffer = buffer.into_iter();
        }
    }
}
