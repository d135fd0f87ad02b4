use std::hash::{Hash, Hasher};

/// Hash backend producing the 64-bit key fingerprint.
/// An enum to avoid trait object limitations with generics.
///
/// The fingerprint is consumed twice: the low bits route to a shard and the
/// high 48 bits choose the bucket inside it and pre-filter probing, so the
/// backend must mix well across the whole word.
#[derive(Default)]
pub enum ShardHasher {
    /// AHash implementation (default, fast and well-distributed).
    #[default]
    AHash,
    /// XXH3 implementation (fast on long keys, well-distributed).
    #[cfg(feature = "xxh3")]
    Xxh3,
}

impl ShardHasher {
    /// Fingerprint a key. Deterministic for the process lifetime and
    /// equality-respecting: equal keys (including borrowed forms that hash
    /// like their owned form) produce equal fingerprints.
    pub fn fingerprint<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        match self {
            ShardHasher::AHash => {
                let mut hasher = ahash::AHasher::default();
                key.hash(&mut hasher);
                hasher.finish()
            }
            #[cfg(feature = "xxh3")]
            ShardHasher::Xxh3 => {
                let mut hasher = xxhash_rust::xxh3::Xxh3::default();
                key.hash(&mut hasher);
                hasher.finish()
            }
        }
    }
}
