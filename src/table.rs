use std::borrow::Borrow;
use std::mem::{self, MaybeUninit};
use std::ptr;

const LOAD_FACTOR: f64 = 0.85;
const DIB_BITS: u32 = 16;
const MAX_DIB: u64 = (1 << DIB_BITS) - 1;
const MIN_SIZE: usize = 8;

/// Packs the high 48 bits of a fingerprint with a displacement-from-initial-
/// bucket counter: `{ hash:48 | dib:16 }`. `dib == 0` marks an empty slot,
/// `dib == 1` a slot sitting in its home bucket.
#[inline]
fn pack(hash: u64, dib: u64) -> u64 {
    (hash << DIB_BITS) | dib
}

#[inline]
fn dib_of(hdib: u64) -> u64 {
    hdib & MAX_DIB
}

#[inline]
fn hash_of(hdib: u64) -> u64 {
    hdib >> DIB_BITS
}

/// Smallest valid table size for a requested capacity.
#[inline]
fn size_for(cap: usize) -> usize {
    let mut sz = MIN_SIZE;
    while sz < cap {
        sz <<= 1;
    }
    sz
}

struct Slot<K, V> {
    hdib: u64,
    kv: MaybeUninit<(K, V)>,
}

/// Open-addressed Robin Hood table. Single-threaded; the shard layer supplies
/// mutual exclusion. The table never sees a key directly during probing: the
/// packed hash48 pre-filters candidates and full key equality runs only on a
/// hash48 match.
///
/// Probing invariant: walking from any home bucket, occupied slots carry
/// non-decreasing dib values until a match or an empty slot, so `dib == 0`
/// terminates every search. Deletion preserves this by shifting successors
/// backward instead of leaving tombstones.
pub(crate) struct Table<K, V> {
    slots: Box<[Slot<K, V>]>,
    cap: usize,
    len: usize,
    mask: usize,
    grow_at: usize,
    shrink_at: usize,
}

impl<K, V> Table<K, V> {
    /// A table sized for `cap` entries: the smallest power of two >= 8 that
    /// fits them. `cap` is remembered as a floor that shrinking never drops
    /// below.
    pub fn with_capacity(cap: usize) -> Self {
        let sz = size_for(cap);
        let slots: Vec<Slot<K, V>> = (0..sz)
            .map(|_| Slot {
                hdib: 0,
                kv: MaybeUninit::uninit(),
            })
            .collect();
        Table {
            slots: slots.into_boxed_slice(),
            cap,
            len: 0,
            mask: sz - 1,
            grow_at: (sz as f64 * LOAD_FACTOR) as usize,
            shrink_at: (sz as f64 * (1.0 - LOAD_FACTOR)) as usize,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Visits occupied slots in stored index order. Returns false if the
    /// visitor stopped early.
    pub fn range<F>(&self, visit: &mut F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        for slot in self.slots.iter() {
            if dib_of(slot.hdib) != 0 {
                // SAFETY: dib != 0 means the slot payload is initialized.
                let (k, v) = unsafe { slot.kv.assume_init_ref() };
                if !visit(k, v) {
                    return false;
                }
            }
        }
        true
    }

    /// First occupied slot scanning forward from `pos & mask`. Samples a
    /// "random-ish" entry when `pos` is arbitrary; the result is a function
    /// of `pos` and the current layout only.
    pub fn get_pos(&self, pos: u64) -> Option<(&K, &V)> {
        for step in 0..self.slots.len() {
            let i = (pos as usize).wrapping_add(step) & self.mask;
            let slot = &self.slots[i];
            if dib_of(slot.hdib) != 0 {
                // SAFETY: dib != 0 means the slot payload is initialized.
                let (k, v) = unsafe { slot.kv.assume_init_ref() };
                return Some((k, v));
            }
        }
        None
    }
}

impl<K: Eq, V> Table<K, V> {
    /// Insert or overwrite. Grows first when the load factor would be
    /// exceeded, so the probe below always finds an empty slot.
    pub fn set(&mut self, fp: u64, key: K, value: V) -> Option<V> {
        if self.len >= self.grow_at {
            self.resize(self.slots.len() << 1);
        }
        self.insert(fp >> DIB_BITS, key, value)
    }

    fn insert(&mut self, hash: u64, key: K, value: V) -> Option<V> {
        let mut hdib = pack(hash, 1);
        let mut kv = (key, value);
        let mut i = (hash as usize) & self.mask;
        loop {
            let slot = &mut self.slots[i];
            if dib_of(slot.hdib) == 0 {
                slot.hdib = hdib;
                slot.kv = MaybeUninit::new(kv);
                self.len += 1;
                return None;
            }
            if hash_of(slot.hdib) == hash_of(hdib) {
                // SAFETY: dib != 0 means the slot payload is initialized.
                let occupant = unsafe { slot.kv.assume_init_mut() };
                if occupant.0 == kv.0 {
                    let (_, old) = mem::replace(occupant, kv);
                    return Some(old);
                }
            }
            if dib_of(slot.hdib) < dib_of(hdib) {
                // The occupant sits closer to its home than we do: take its
                // slot and keep probing with the displaced entry.
                mem::swap(&mut slot.hdib, &mut hdib);
                // SAFETY: dib != 0 means the slot payload is initialized.
                mem::swap(unsafe { slot.kv.assume_init_mut() }, &mut kv);
            }
            i = (i + 1) & self.mask;
            debug_assert!(
                dib_of(hdib) < MAX_DIB,
                "probe displacement overflowed the 16-bit dib field"
            );
            hdib = pack(hash_of(hdib), dib_of(hdib) + 1);
        }
    }

    pub fn get<Q>(&self, fp: u64, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let hash = fp >> DIB_BITS;
        let mut i = (hash as usize) & self.mask;
        loop {
            let slot = &self.slots[i];
            if dib_of(slot.hdib) == 0 {
                return None;
            }
            if hash_of(slot.hdib) == hash {
                // SAFETY: dib != 0 means the slot payload is initialized.
                let (k, v) = unsafe { slot.kv.assume_init_ref() };
                if k.borrow() == key {
                    return Some(v);
                }
            }
            i = (i + 1) & self.mask;
        }
    }

    pub fn delete<Q>(&mut self, fp: u64, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let hash = fp >> DIB_BITS;
        let mut i = (hash as usize) & self.mask;
        loop {
            let slot = &self.slots[i];
            if dib_of(slot.hdib) == 0 {
                return None;
            }
            if hash_of(slot.hdib) == hash
                // SAFETY: dib != 0 means the slot payload is initialized.
                && unsafe { slot.kv.assume_init_ref() }.0.borrow() == key
            {
                return Some(self.remove_at(i));
            }
            i = (i + 1) & self.mask;
        }
    }

    /// Backward-shift deletion: pull every successor with `dib > 1` one slot
    /// toward its home, then clear the final hole. No tombstones, so probe
    /// chains stay terminated by the first empty slot.
    fn remove_at(&mut self, mut i: usize) -> V {
        // SAFETY: the caller verified slot `i` is occupied. The payload is
        // read out by value; its bits stay behind but are either overwritten
        // by the shift below or masked off by `hdib = 0`.
        let (_, value) = unsafe { self.slots[i].kv.assume_init_read() };
        loop {
            let pi = i;
            i = (i + 1) & self.mask;
            if dib_of(self.slots[i].hdib) <= 1 {
                self.slots[pi].hdib = 0;
                break;
            }
            self.slots[pi].hdib = pack(
                hash_of(self.slots[i].hdib),
                dib_of(self.slots[i].hdib) - 1,
            );
            // SAFETY: slot `i` is occupied (dib > 1) and `pi != i`. The move
            // transfers ownership of the payload to `pi`; `i` becomes the
            // hole for the next iteration.
            unsafe {
                let base = self.slots.as_mut_ptr();
                let src = (*base.add(i)).kv.as_ptr();
                let dst = (*base.add(pi)).kv.as_mut_ptr();
                ptr::copy_nonoverlapping(src, dst, 1);
            }
        }
        self.len -= 1;
        if self.slots.len() > size_for(self.cap) && self.len <= self.shrink_at {
            self.resize(self.len);
        }
        value
    }

    /// Rebuild at a new size (power of two >= 8, >= `new_cap`, never below
    /// what the `cap` floor requires), reinserting every entry from its
    /// stored hash48.
    fn resize(&mut self, new_cap: usize) {
        let mut next = Table::with_capacity(new_cap.max(self.cap));
        next.cap = self.cap;
        for slot in mem::take(&mut self.slots).into_vec() {
            if dib_of(slot.hdib) != 0 {
                // SAFETY: the slot is occupied and owned by value here; Slot
                // has no Drop, so the payload moves out exactly once.
                let (key, value) = unsafe { slot.kv.assume_init() };
                next.insert(hash_of(slot.hdib), key, value);
            }
        }
        debug_assert_eq!(next.len, self.len);
        *self = next;
    }
}

impl<K, V> Drop for Table<K, V> {
    fn drop(&mut self) {
        if mem::needs_drop::<(K, V)>() {
            for slot in self.slots.iter_mut() {
                if dib_of(slot.hdib) != 0 {
                    // SAFETY: dib != 0 means the slot payload is initialized,
                    // and nothing reads it after this.
                    unsafe { ptr::drop_in_place(slot.kv.as_mut_ptr()) };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Builds a fingerprint whose high 48 bits are exactly `hash`.
    fn fp(hash: u64) -> u64 {
        hash << DIB_BITS
    }

    /// Spreads an integer into a well-mixed fingerprint.
    fn mix(i: u64) -> u64 {
        let x = i.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        let x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        x ^ (x >> 31)
    }

    /// Every occupied slot's recorded dib must equal its actual displacement
    /// from home plus one, and the occupied count must equal `len`.
    fn check_invariants<K: Eq, V>(t: &Table<K, V>) {
        let size = t.capacity();
        let mut occupied = 0;
        for i in 0..size {
            let hdib = t.slots[i].hdib;
            let dib = dib_of(hdib);
            if dib == 0 {
                continue;
            }
            occupied += 1;
            let home = (hash_of(hdib) as usize) & t.mask;
            let displacement = (i + size - home) & t.mask;
            assert_eq!(
                dib as usize,
                displacement + 1,
                "slot {} records dib {} but sits {} past its home",
                i,
                dib,
                displacement
            );
        }
        assert_eq!(occupied, t.len());
    }

    #[test]
    fn test_set_get_delete() {
        let mut t: Table<u64, u64> = Table::with_capacity(0);
        assert_eq!(t.capacity(), 8);

        for i in 0..5u64 {
            assert_eq!(t.set(mix(i), i, i * 10), None);
        }
        assert_eq!(t.len(), 5);
        check_invariants(&t);

        for i in 0..5u64 {
            assert_eq!(t.get(mix(i), &i), Some(&(i * 10)));
        }
        assert_eq!(t.get(mix(99), &99), None);

        assert_eq!(t.delete(mix(3), &3), Some(30));
        assert_eq!(t.delete(mix(3), &3), None);
        assert_eq!(t.len(), 4);
        check_invariants(&t);
    }

    #[test]
    fn test_overwrite_returns_previous() {
        let mut t: Table<&str, &str> = Table::with_capacity(0);
        assert_eq!(t.set(fp(1), "hello", "world"), None);
        assert_eq!(t.set(fp(1), "hello", "planet"), Some("world"));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(fp(1), &"hello"), Some(&"planet"));
        check_invariants(&t);
    }

    #[test]
    fn test_collision_chain_and_backward_shift() {
        let mut t: Table<&str, u32> = Table::with_capacity(0);
        // Same hash48 for all three keys: equality must disambiguate, and
        // the chain occupies home, home+1, home+2 with dibs 1, 2, 3.
        t.set(fp(2), "a", 1);
        t.set(fp(2), "b", 2);
        t.set(fp(2), "c", 3);
        assert_eq!(t.len(), 3);
        check_invariants(&t);

        // Removing the head shifts the others back one slot each.
        assert_eq!(t.delete(fp(2), &"a"), Some(1));
        check_invariants(&t);
        assert_eq!(t.get(fp(2), &"b"), Some(&2));
        assert_eq!(t.get(fp(2), &"c"), Some(&3));

        // Removing the middle of what remains.
        assert_eq!(t.delete(fp(2), &"b"), Some(2));
        check_invariants(&t);
        assert_eq!(t.get(fp(2), &"c"), Some(&3));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_probe_chain_wraps_around() {
        let mut t: Table<&str, u32> = Table::with_capacity(0);
        // Home bucket 7 in an 8-slot table: the chain wraps to 0 and 1.
        t.set(fp(7), "x", 1);
        t.set(fp(7), "y", 2);
        t.set(fp(7), "z", 3);
        check_invariants(&t);
        assert_eq!(t.get(fp(7), &"y"), Some(&2));

        assert_eq!(t.delete(fp(7), &"x"), Some(1));
        check_invariants(&t);
        assert_eq!(t.get(fp(7), &"y"), Some(&2));
        assert_eq!(t.get(fp(7), &"z"), Some(&3));
    }

    #[test]
    fn test_richer_slot_yields_to_poorer() {
        let mut t: Table<&str, u32> = Table::with_capacity(0);
        // "d" takes its home bucket 4 with dib 1. The chain growing out of
        // bucket 3 then probes past it with larger dibs, so "d" gets
        // displaced further down its own probe path.
        t.set(fp(4), "d", 4);
        t.set(fp(3), "a", 1);
        t.set(fp(3), "b", 2);
        t.set(fp(3), "c", 3);
        check_invariants(&t);
        for (key, want) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            let h = if key == "d" { fp(4) } else { fp(3) };
            assert_eq!(t.get(h, &key), Some(&want), "lost {:?}", key);
        }
    }

    #[test]
    fn test_grow_boundary() {
        let mut t: Table<u64, u64> = Table::with_capacity(0);
        // grow_at for size 8 is 6: the seventh insert resizes first.
        for i in 0..6u64 {
            t.set(mix(i), i, i);
        }
        assert_eq!(t.capacity(), 8);
        t.set(mix(6), 6, 6);
        assert_eq!(t.capacity(), 16);
        assert_eq!(t.len(), 7);
        check_invariants(&t);
        for i in 0..7u64 {
            assert_eq!(t.get(mix(i), &i), Some(&i));
        }
    }

    #[test]
    fn test_shrink_boundary() {
        let mut t: Table<u64, u64> = Table::with_capacity(0);
        for i in 0..21u64 {
            t.set(mix(i), i, i);
        }
        assert_eq!(t.capacity(), 32);

        // shrink_at for size 32 is 4.
        let mut remaining = 21usize;
        for i in 0..17u64 {
            assert_eq!(t.delete(mix(i), &i), Some(i));
            remaining -= 1;
            assert_eq!(t.len(), remaining);
        }
        assert_eq!(t.len(), 4);
        assert_eq!(t.capacity(), 8);
        check_invariants(&t);
        for i in 17..21u64 {
            assert_eq!(t.get(mix(i), &i), Some(&i));
        }
    }

    #[test]
    fn test_shrink_respects_capacity_floor() {
        let mut t: Table<u64, u64> = Table::with_capacity(20);
        assert_eq!(t.capacity(), 32);
        for i in 0..30u64 {
            t.set(mix(i), i, i);
        }
        assert_eq!(t.capacity(), 64);
        for i in 0..28u64 {
            t.delete(mix(i), &i);
        }
        // Two entries would fit in 8 slots, but the floor of 20 holds the
        // table at 32.
        assert_eq!(t.len(), 2);
        assert_eq!(t.capacity(), 32);
        check_invariants(&t);
    }

    #[test]
    fn test_resize_preserves_mapping() {
        let mut t: Table<String, u64> = Table::with_capacity(0);
        for i in 0..500u64 {
            t.set(mix(i), i.to_string(), i);
        }
        assert_eq!(t.len(), 500);
        check_invariants(&t);
        for i in 0..500u64 {
            assert_eq!(t.get(mix(i), &i.to_string()), Some(&i));
        }
    }

    #[test]
    fn test_range_visits_every_entry_once() {
        let mut t: Table<u64, u64> = Table::with_capacity(0);
        for i in 0..100u64 {
            t.set(mix(i), i, i);
        }
        let mut seen = HashMap::new();
        let full = t.range(&mut |k: &u64, v: &u64| {
            *seen.entry(*k).or_insert(0u32) += 1;
            assert_eq!(k, v);
            true
        });
        assert!(full);
        assert_eq!(seen.len(), 100);
        assert!(seen.values().all(|&n| n == 1));

        let mut visited = 0;
        let full = t.range(&mut |_k: &u64, _v: &u64| {
            visited += 1;
            visited < 10
        });
        assert!(!full);
        assert_eq!(visited, 10);
    }

    #[test]
    fn test_get_pos() {
        let empty: Table<u64, u64> = Table::with_capacity(0);
        assert!(empty.get_pos(12345).is_none());

        let mut t: Table<u64, u64> = Table::with_capacity(0);
        t.set(mix(1), 1, 10);
        t.set(mix(2), 2, 20);
        for pos in [0u64, 7, u64::MAX] {
            let (k, v) = t.get_pos(pos).expect("non-empty table yields an entry");
            assert_eq!(*v, *k * 10);
            // Same pos, same layout, same answer.
            assert_eq!(t.get_pos(pos), Some((k, v)));
        }
    }

    #[test]
    fn test_against_model() {
        let mut t: Table<u64, u64> = Table::with_capacity(0);
        let mut model: HashMap<u64, u64> = HashMap::new();
        let mut state = 0x1234_5678_u64;
        let mut rng = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for step in 0..20_000u64 {
            let key = rng() % 512;
            match rng() % 3 {
                0 | 1 => {
                    let value = step;
                    assert_eq!(t.set(mix(key), key, value), model.insert(key, value));
                }
                _ => {
                    assert_eq!(t.delete(mix(key), &key), model.remove(&key));
                }
            }
            if step % 1000 == 0 {
                check_invariants(&t);
            }
        }

        check_invariants(&t);
        assert_eq!(t.len(), model.len());
        let mut collected = HashMap::new();
        t.range(&mut |k: &u64, v: &u64| {
            collected.insert(*k, *v);
            true
        });
        assert_eq!(collected, model);
    }

    #[test]
    fn test_drop_runs_for_occupied_slots() {
        use std::rc::Rc;

        let marker = Rc::new(());
        {
            let mut t: Table<u64, Rc<()>> = Table::with_capacity(0);
            for i in 0..50u64 {
                t.set(mix(i), i, Rc::clone(&marker));
            }
            for i in 0..10u64 {
                t.delete(mix(i), &i);
            }
            assert_eq!(Rc::strong_count(&marker), 41);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
