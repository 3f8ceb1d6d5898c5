//! Optional trigram posting-list index over normalised literal text.
//!
//! Named in the component table as a thin full-text assist: maps every
//! 3-character trigram of an indexed literal to the atom ids of literals
//! containing it, so a substring-search caller (out of scope here) can
//! intersect candidate sets before falling back to an exact compare. Not
//! required for any of the core's bitemporal guarantees.
//!
//! On-disk: `trigram.hash` is a fixed open-address table of `(trigram:u32,
//! count:i32, offset:i64)` buckets; `trigram.posts` holds the variable-length
//! posting lists themselves, `[i32 count][i32 capacity][i64 atom_id]*`,
//! appended and reallocated at the end of the file when a list outgrows its
//! capacity (the same grow-by-reallocation shape as the atom blob).

use byteorder::{ByteOrder, LittleEndian};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use mercury_core::AtomId;

use crate::error::StorageError;

const HASH_BUCKET_SIZE: u64 = 16;
const DEFAULT_BUCKET_COUNT: u64 = 1_000_000;
/// Linear-probe cap for the hash table. The trigram index is advisory, so a
/// cap far smaller than the atom store's is an acceptable simplification —
/// a full table degrades to "no candidates found," never corruption.
const PROBE_CAP: u64 = 256;
const POSTS_HEADER_SIZE: u64 = 16;
const POSTING_HEADER_SIZE: u64 = 8;
const POSTING_ENTRY_SIZE: u64 = 8;
const INITIAL_POSTING_CAPACITY: i32 = 4;
const POSTS_MAGIC: u64 = 0x5452_4947_5241_4D21; // "TRIGRAM!"

/// A trigram posting index rooted at a store directory's `trigram.hash` /
/// `trigram.posts` files.
pub struct TrigramIndex {
    bucket_count: u64,
    hash_file: File,
    hash_mmap: MmapMut,
    posts_file: File,
    posts_mmap: MmapMut,
    posts_capacity: u64,
    next_free_offset: u64,
}

impl TrigramIndex {
    /// Open (creating if absent) the trigram index rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        Self::open_with_bucket_count(dir, DEFAULT_BUCKET_COUNT)
    }

    /// Like [`TrigramIndex::open`], but with an explicit hash bucket count
    /// (tests use far fewer than the production default).
    pub fn open_with_bucket_count(dir: &Path, bucket_count: u64) -> Result<Self, StorageError> {
        let hash_path = dir.join("trigram.hash");
        let posts_path = dir.join("trigram.posts");
        let is_new = !posts_path.exists();

        let hash_file = open_rw(&hash_path)?;
        let posts_file = open_rw(&posts_path)?;

        let hash_len = bucket_count * HASH_BUCKET_SIZE;
        if hash_file.metadata()?.len() < hash_len {
            hash_file.set_len(hash_len)?;
        }

        let next_free_offset = if is_new {
            posts_file.set_len(POSTS_HEADER_SIZE)?;
            let mut mmap = unsafe { MmapOptions::new().map_mut(&posts_file)? };
            write_posts_header(&mut mmap, POSTS_HEADER_SIZE);
            mmap.flush()?;
            POSTS_HEADER_SIZE
        } else {
            let mmap = unsafe { MmapOptions::new().map_mut(&posts_file)? };
            read_posts_header(&mmap)?
        };

        let posts_capacity = posts_file.metadata()?.len().max(POSTS_HEADER_SIZE);
        let hash_mmap = unsafe { MmapOptions::new().map_mut(&hash_file)? };
        let posts_mmap = unsafe { MmapOptions::new().map_mut(&posts_file)? };

        Ok(TrigramIndex {
            bucket_count,
            hash_file,
            hash_mmap,
            posts_file,
            posts_mmap,
            posts_capacity,
            next_free_offset,
        })
    }

    /// Index every trigram of `text` (lowercased) against `atom`. A no-op for
    /// `text` shorter than three characters.
    pub fn index_literal(&mut self, atom: AtomId, text: &str) -> Result<(), StorageError> {
        for trigram in trigrams(text) {
            self.append_posting(trigram, atom)?;
        }
        Ok(())
    }

    /// Atom ids whose indexed literal shares every trigram of `text` with
    /// it — a candidate set a caller narrows with an exact compare, not a
    /// guaranteed match set (trigram indexes admit false positives).
    pub fn candidates(&self, text: &str) -> Vec<AtomId> {
        let mut grams = trigrams(text);
        grams.sort_unstable();
        grams.dedup();
        if grams.is_empty() {
            return Vec::new();
        }

        let mut lists: Vec<Vec<u64>> = grams.iter().map(|g| self.posting(*g)).collect();
        lists.sort_by_key(|l| l.len());
        let mut iter = lists.into_iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut acc: std::collections::HashSet<u64> = first.into_iter().collect();
        for list in iter {
            let set: std::collections::HashSet<u64> = list.into_iter().collect();
            acc.retain(|id| set.contains(id));
            if acc.is_empty() {
                break;
            }
        }
        acc.into_iter().map(AtomId::new).collect()
    }

    /// Reset both files to empty, matching `QuadStore::clear`'s call to
    /// every subsystem's `clear()`.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        for chunk in self.hash_mmap.chunks_mut(8192) {
            chunk.fill(0);
        }
        self.hash_mmap.flush()?;

        self.posts_file.set_len(POSTS_HEADER_SIZE)?;
        self.posts_mmap = unsafe { MmapOptions::new().map_mut(&self.posts_file)? };
        write_posts_header(&mut self.posts_mmap, POSTS_HEADER_SIZE);
        self.posts_mmap.flush()?;
        self.posts_capacity = POSTS_HEADER_SIZE;
        self.next_free_offset = POSTS_HEADER_SIZE;
        Ok(())
    }

    fn posting(&self, trigram: u32) -> Vec<u64> {
        match self.find_bucket(trigram) {
            Some((_, offset)) if offset != 0 => self.read_posting(offset),
            _ => Vec::new(),
        }
    }

    fn append_posting(&mut self, trigram: u32, atom: AtomId) -> Result<(), StorageError> {
        let bucket_idx = self.find_bucket_for_insert(trigram)?;
        let offset = self.read_bucket_offset(bucket_idx);

        if offset == 0 {
            let new_offset = self.alloc_posting(INITIAL_POSTING_CAPACITY)?;
            self.write_posting_entry(new_offset, 0, atom.raw());
            self.set_posting_count(new_offset, 1);
            self.write_bucket(bucket_idx, trigram, 1, new_offset);
            return Ok(());
        }

        let count = self.read_posting_count(offset);
        let capacity = self.read_posting_capacity(offset);
        for i in 0..count {
            if self.read_posting_entry(offset, i) == atom.raw() {
                return Ok(()); // already indexed for this trigram
            }
        }

        if count < capacity {
            self.write_posting_entry(offset, count, atom.raw());
            self.set_posting_count(offset, count + 1);
            self.write_bucket(bucket_idx, trigram, count + 1, offset);
        } else {
            let existing = self.read_posting(offset);
            let new_capacity = capacity * 2;
            let new_offset = self.alloc_posting(new_capacity)?;
            for (i, id) in existing.iter().enumerate() {
                self.write_posting_entry(new_offset, i as i32, *id);
            }
            self.write_posting_entry(new_offset, count, atom.raw());
            self.set_posting_count(new_offset, count + 1);
            self.write_bucket(bucket_idx, trigram, count + 1, new_offset);
        }
        Ok(())
    }

    fn alloc_posting(&mut self, capacity: i32) -> Result<u64, StorageError> {
        let record_size = POSTING_HEADER_SIZE + capacity as u64 * POSTING_ENTRY_SIZE;
        let offset = self.next_free_offset;
        let needed = offset + record_size;
        if needed > self.posts_capacity {
            let mut new_len = self.posts_capacity.max(POSTS_HEADER_SIZE);
            while new_len < needed {
                new_len *= 2;
            }
            self.posts_file.set_len(new_len)?;
            self.posts_mmap = unsafe { MmapOptions::new().map_mut(&self.posts_file)? };
            self.posts_capacity = new_len;
        }
        LittleEndian::write_i32(&mut self.posts_mmap[offset as usize..], 0);
        LittleEndian::write_i32(&mut self.posts_mmap[offset as usize + 4..], capacity);
        self.next_free_offset = offset + record_size;
        write_posts_header(&mut self.posts_mmap, self.next_free_offset);
        Ok(offset)
    }

    fn read_posting(&self, offset: u64) -> Vec<u64> {
        let count = self.read_posting_count(offset);
        (0..count).map(|i| self.read_posting_entry(offset, i)).collect()
    }

    fn read_posting_count(&self, offset: u64) -> i32 {
        LittleEndian::read_i32(&self.posts_mmap[offset as usize..])
    }

    fn read_posting_capacity(&self, offset: u64) -> i32 {
        LittleEndian::read_i32(&self.posts_mmap[offset as usize + 4..])
    }

    fn set_posting_count(&mut self, offset: u64, count: i32) {
        LittleEndian::write_i32(&mut self.posts_mmap[offset as usize..], count);
    }

    fn read_posting_entry(&self, offset: u64, index: i32) -> u64 {
        let pos = offset + POSTING_HEADER_SIZE + index as u64 * POSTING_ENTRY_SIZE;
        LittleEndian::read_u64(&self.posts_mmap[pos as usize..])
    }

    fn write_posting_entry(&mut self, offset: u64, index: i32, atom_id: u64) {
        let pos = offset + POSTING_HEADER_SIZE + index as u64 * POSTING_ENTRY_SIZE;
        LittleEndian::write_u64(&mut self.posts_mmap[pos as usize..], atom_id);
    }

    fn read_bucket_offset(&self, bucket_idx: u64) -> u64 {
        let base = (bucket_idx * HASH_BUCKET_SIZE) as usize;
        LittleEndian::read_u64(&self.hash_mmap[base + 8..])
    }

    fn write_bucket(&mut self, bucket_idx: u64, trigram: u32, count: i32, offset: u64) {
        let base = (bucket_idx * HASH_BUCKET_SIZE) as usize;
        LittleEndian::write_u32(&mut self.hash_mmap[base..], trigram);
        LittleEndian::write_i32(&mut self.hash_mmap[base + 4..], count);
        LittleEndian::write_u64(&mut self.hash_mmap[base + 8..], offset);
    }

    fn find_bucket(&self, trigram: u32) -> Option<(u64, u64)> {
        let home = (trigram as u64) % self.bucket_count;
        for step in 0..PROBE_CAP {
            let idx = (home + step) % self.bucket_count;
            let base = (idx * HASH_BUCKET_SIZE) as usize;
            let offset = LittleEndian::read_u64(&self.hash_mmap[base + 8..]);
            if offset == 0 {
                return None;
            }
            let stored = LittleEndian::read_u32(&self.hash_mmap[base..]);
            if stored == trigram {
                return Some((idx, offset));
            }
        }
        None
    }

    fn find_bucket_for_insert(&self, trigram: u32) -> Result<u64, StorageError> {
        let home = (trigram as u64) % self.bucket_count;
        for step in 0..PROBE_CAP {
            let idx = (home + step) % self.bucket_count;
            let base = (idx * HASH_BUCKET_SIZE) as usize;
            let offset = LittleEndian::read_u64(&self.hash_mmap[base + 8..]);
            let stored = LittleEndian::read_u32(&self.hash_mmap[base..]);
            if offset == 0 || stored == trigram {
                return Ok(idx);
            }
        }
        Err(StorageError::CorruptPage {
            page_id: trigram as u64,
            detail: "trigram hash table probe cap exceeded".to_string(),
        })
    }
}

fn write_posts_header(mmap: &mut [u8], next_free_offset: u64) {
    LittleEndian::write_u64(&mut mmap[0..], next_free_offset);
    LittleEndian::write_u64(&mut mmap[8..], POSTS_MAGIC);
}

fn read_posts_header(mmap: &[u8]) -> Result<u64, StorageError> {
    let magic = LittleEndian::read_u64(&mmap[8..]);
    if magic != POSTS_MAGIC {
        return Err(StorageError::CorruptHeader {
            expected: POSTS_MAGIC,
            found: magic,
        });
    }
    Ok(LittleEndian::read_u64(&mmap[0..]))
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().read(true).write(true).create(true).open(path)
}

/// Lowercased character-trigrams of `text`. Shorter inputs yield none.
fn trigrams(text: &str) -> Vec<u32> {
    let lower: Vec<char> = text.to_lowercase().chars().collect();
    if lower.len() < 3 {
        return Vec::new();
    }
    lower
        .windows(3)
        .map(|w| {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            use std::hash::{Hash, Hasher};
            w.hash(&mut hasher);
            hasher.finish() as u32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_small(dir: &Path) -> TrigramIndex {
        TrigramIndex::open_with_bucket_count(dir, 1024).unwrap()
    }

    #[test]
    fn indexes_and_finds_candidate() {
        let dir = tempdir().unwrap();
        let mut idx = open_small(dir.path());
        idx.index_literal(AtomId::new(1), "hello world").unwrap();
        idx.index_literal(AtomId::new(2), "goodbye world").unwrap();

        let candidates = idx.candidates("hello");
        assert_eq!(candidates, vec![AtomId::new(1)]);
    }

    #[test]
    fn shared_trigrams_return_both_atoms() {
        let dir = tempdir().unwrap();
        let mut idx = open_small(dir.path());
        idx.index_literal(AtomId::new(1), "hello world").unwrap();
        idx.index_literal(AtomId::new(2), "hello there").unwrap();

        let mut candidates = idx.candidates("hello");
        candidates.sort_by_key(|a| a.raw());
        assert_eq!(candidates, vec![AtomId::new(1), AtomId::new(2)]);
    }

    #[test]
    fn short_query_yields_no_candidates() {
        let dir = tempdir().unwrap();
        let idx = open_small(dir.path());
        assert!(idx.candidates("hi").is_empty());
    }

    #[test]
    fn posting_growth_past_initial_capacity() {
        let dir = tempdir().unwrap();
        let mut idx = open_small(dir.path());
        for i in 0..20u64 {
            idx.index_literal(AtomId::new(i + 1), "repeated shared phrase").unwrap();
        }
        let candidates = idx.candidates("shared phrase");
        assert_eq!(candidates.len(), 20);
    }

    #[test]
    fn clear_empties_both_files() {
        let dir = tempdir().unwrap();
        let mut idx = open_small(dir.path());
        idx.index_literal(AtomId::new(1), "hello world").unwrap();
        idx.clear().unwrap();
        assert!(idx.candidates("hello").is_empty());
    }

    #[test]
    fn reopen_recovers_postings() {
        let dir = tempdir().unwrap();
        {
            let mut idx = TrigramIndex::open_with_bucket_count(dir.path(), 1024).unwrap();
            idx.index_literal(AtomId::new(1), "hello world").unwrap();
        }
        let idx = TrigramIndex::open_with_bucket_count(dir.path(), 1024).unwrap();
        assert_eq!(idx.candidates("hello"), vec![AtomId::new(1)]);
    }
}
