//! A fixed-capacity, second-chance ("clock") page cache.
//!
//! Maps `page_id -> offset` (the byte offset of that page within its
//! index's mapped region): storing offsets rather than raw pointers means a
//! cached value survives a remap, since the caller re-derives the actual
//! slice from the *current* base pointer using the cached offset instead of
//! a pointer that growth could invalidate.
//!
//! The cache is not internally synchronized; callers (here,
//! [`crate::index::QuadIndex`]) provide their own, since the cache is
//! always protected by the owning index's lock.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

struct Slot {
    page_id: u64,
    offset: u64,
    referenced: bool,
    access_count: u32,
    occupied: bool,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            page_id: 0,
            offset: 0,
            referenced: false,
            access_count: 0,
            occupied: false,
        }
    }
}

/// A bounded `page_id -> offset` cache with clock eviction.
pub struct PageCache {
    slots: Vec<Slot>,
    /// Open-address hash table mapping `page_id -> slot index`, roughly
    /// twice `slots.len()` to keep probe chains short.
    index: Vec<Option<usize>>,
    hand: usize,
    len: usize,
}

impl PageCache {
    /// Create a cache holding at most `capacity` pages. `capacity` must be
    /// nonzero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PageCache capacity must be nonzero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::empty);
        let index_len = (capacity * 2).max(4);
        PageCache {
            slots,
            index: vec![None; index_len],
            hand: 0,
            len: 0,
        }
    }

    /// Number of pages currently cached.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up `page_id`, marking it referenced (second-chance bit) and
    /// bumping its access count on a hit.
    pub fn try_get(&mut self, page_id: u64) -> Option<u64> {
        let probe = self.find_slot(page_id)?;
        let slot = &mut self.slots[probe];
        slot.referenced = true;
        slot.access_count += 1;
        Some(slot.offset)
    }

    /// Insert or update the cached offset for `page_id`.
    pub fn add(&mut self, page_id: u64, offset: u64) {
        if let Some(probe) = self.find_slot(page_id) {
            self.slots[probe].offset = offset;
            self.slots[probe].referenced = true;
            return;
        }
        let victim = self.evict_one();
        self.remove_from_index(victim);
        self.slots[victim] = Slot {
            page_id,
            offset,
            referenced: true,
            access_count: 1,
            occupied: true,
        };
        self.insert_into_index(page_id, victim);
        self.len += 1;
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::empty();
        }
        for entry in &mut self.index {
            *entry = None;
        }
        self.hand = 0;
        self.len = 0;
    }

    fn find_slot(&self, page_id: u64) -> Option<usize> {
        let mut probe = bucket_for(page_id, self.index.len());
        for _ in 0..self.index.len() {
            match self.index[probe] {
                Some(slot_idx) if self.slots[slot_idx].page_id == page_id => return Some(slot_idx),
                None => return None,
                _ => probe = (probe + 1) % self.index.len(),
            }
        }
        None
    }

    fn insert_into_index(&mut self, page_id: u64, slot_idx: usize) {
        let mut probe = bucket_for(page_id, self.index.len());
        loop {
            if self.index[probe].is_none() {
                self.index[probe] = Some(slot_idx);
                return;
            }
            probe = (probe + 1) % self.index.len();
        }
    }

    /// Remove `slot_idx` from the hash table and rehash its probe chain's
    /// tail so later lookups aren't broken by the hole this leaves behind.
    fn remove_from_index(&mut self, slot_idx: usize) {
        if !self.slots[slot_idx].occupied {
            return;
        }
        let page_id = self.slots[slot_idx].page_id;
        let mut probe = bucket_for(page_id, self.index.len());
        while self.index[probe] != Some(slot_idx) {
            probe = (probe + 1) % self.index.len();
        }
        self.index[probe] = None;

        // Rehash the contiguous run following the hole.
        let mut scan = (probe + 1) % self.index.len();
        while let Some(displaced_slot) = self.index[scan] {
            self.index[scan] = None;
            let displaced_page_id = self.slots[displaced_slot].page_id;
            self.insert_into_index(displaced_page_id, displaced_slot);
            scan = (scan + 1) % self.index.len();
        }
    }

    fn evict_one(&mut self) -> usize {
        if self.len < self.slots.len() {
            for (i, slot) in self.slots.iter().enumerate() {
                if !slot.occupied {
                    return i;
                }
            }
        }
        loop {
            let candidate = self.hand;
            self.hand = (self.hand + 1) % self.slots.len();
            if !self.slots[candidate].occupied {
                return candidate;
            }
            if self.slots[candidate].referenced {
                self.slots[candidate].referenced = false;
            } else {
                self.len -= 1;
                return candidate;
            }
        }
    }
}

fn bucket_for(page_id: u64, table_len: usize) -> usize {
    let mut hasher = FxHasher::default();
    page_id.hash(&mut hasher);
    (hasher.finish() as usize) % table_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_after_add() {
        let mut cache = PageCache::new(4);
        cache.add(1, 100);
        assert_eq!(cache.try_get(1), Some(100));
        assert_eq!(cache.try_get(2), None);
    }

    #[test]
    fn evicts_when_full() {
        let mut cache = PageCache::new(2);
        cache.add(1, 10);
        cache.add(2, 20);
        // Touch page 1 so it gets a second chance over page 2.
        cache.try_get(1);
        cache.add(3, 30);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.try_get(1), Some(10));
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = PageCache::new(4);
        cache.add(1, 10);
        cache.add(2, 20);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.try_get(1), None);
    }

    #[test]
    fn update_existing_entry_does_not_grow_len() {
        let mut cache = PageCache::new(4);
        cache.add(1, 10);
        cache.add(1, 11);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.try_get(1), Some(11));
    }
}
