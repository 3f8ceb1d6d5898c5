//! The atom store: a memory-mapped open-address hash table over an
//! append-only blob file, assigning stable 64-bit ids to interned UTF-8
//! byte strings.
//!
//! On-disk layout (three files per store):
//!
//! - `.atoms`: the data blob, 1 KiB reserved header followed by
//!   `[u64 length][bytes]` records, append-only.
//! - `.atomidx`: a fixed-size open-address hash table, 32-byte buckets.
//! - `.offsets`: a dense `u64[]` mapping `atom_id -> offset_in_data`.
//!
//! `AtomStore` is **not** thread-safe on its own: every mutating method
//! takes `&mut self`, and every read-only method takes `&self`. The
//! containing `QuadStore`'s reader-writer lock is what actually enforces
//! "mutations require the exclusive side; reads require at least the
//! shared side" — the Rust borrow checker then makes it impossible to hold
//! a `get()` slice across a call to `intern()` or `clear()`.

use byteorder::{ByteOrder, LittleEndian};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, Ordering};

use mercury_core::limits::{
    ATOM_BUCKET_SIZE, ATOM_HASH_BUCKET_COUNT, ATOM_HEADER_SIZE, ATOM_PROBE_CAP,
    ATOM_QUADRATIC_PROBES, DEFAULT_MAX_ATOM_SIZE,
};
use mercury_core::AtomId;

use crate::error::AtomError;
use crate::hash::fnv1a;
use crate::header::AtomHeader;

const INITIAL_BLOB_SIZE: u64 = ATOM_HEADER_SIZE + 64 * 1024;
const INITIAL_OFFSETS_SLOTS: u64 = 1024;
const OFFSET_SLOT_SIZE: u64 = 8;

/// Summary counters reported by [`AtomStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomStats {
    /// Number of atoms currently interned.
    pub atom_count: u64,
    /// Sum of the byte lengths of every interned atom.
    pub total_bytes: u64,
    /// `total_bytes / atom_count`, or 0 when the store is empty.
    pub avg_length: f64,
}

/// A memory-mapped, append-only atom interning store.
pub struct AtomStore {
    path: PathBuf,
    max_atom_size: usize,
    bucket_count: u64,

    atoms_file: File,
    atoms_mmap: MmapMut,
    atoms_capacity: u64,

    atomidx_file: File,
    atomidx_mmap: MmapMut,

    offsets_file: File,
    offsets_mmap: MmapMut,
    offsets_capacity: u64,

    header: AtomHeader,
}

impl AtomStore {
    /// Open (creating if absent) the atom store rooted at `dir`, which must
    /// already exist as a directory. `max_atom_size` bounds `intern`.
    pub fn open(dir: &Path, max_atom_size: usize) -> Result<Self, AtomError> {
        Self::open_with_bucket_count(dir, max_atom_size, ATOM_HASH_BUCKET_COUNT)
    }

    /// Like [`AtomStore::open`], but with an explicit bucket count for the
    /// hash table. Production stores should use the ~16M default; tests use
    /// a far smaller count so the sparse `.atomidx` file stays cheap to
    /// create.
    pub fn open_with_bucket_count(
        dir: &Path,
        max_atom_size: usize,
        bucket_count: u64,
    ) -> Result<Self, AtomError> {
        let atoms_path = dir.join("atoms.atoms");
        let atomidx_path = dir.join("atoms.atomidx");
        let offsets_path = dir.join("atoms.offsets");

        let is_new = !atoms_path.exists();

        let atoms_file = open_rw(&atoms_path)?;
        let atomidx_file = open_rw(&atomidx_path)?;
        let offsets_file = open_rw(&offsets_path)?;

        let atomidx_len = bucket_count * ATOM_BUCKET_SIZE;
        if atomidx_file.metadata()?.len() < atomidx_len {
            atomidx_file.set_len(atomidx_len)?;
        }

        let header = if is_new {
            atoms_file.set_len(INITIAL_BLOB_SIZE)?;
            offsets_file.set_len(INITIAL_OFFSETS_SLOTS * OFFSET_SLOT_SIZE)?;
            let header = AtomHeader::fresh();
            let mut mmap = unsafe { MmapOptions::new().map_mut(&atoms_file)? };
            header.write_to(&mut mmap[..ATOM_HEADER_SIZE as usize]);
            mmap.flush()?;
            header
        } else {
            let mmap = unsafe { MmapOptions::new().map_mut(&atoms_file)? };
            AtomHeader::read_from(&mmap[..ATOM_HEADER_SIZE as usize])?
        };

        let atoms_capacity = atoms_file.metadata()?.len();
        let offsets_capacity = offsets_file.metadata()?.len() / OFFSET_SLOT_SIZE;

        let atoms_mmap = unsafe { MmapOptions::new().map_mut(&atoms_file)? };
        let atomidx_mmap = unsafe { MmapOptions::new().map_mut(&atomidx_file)? };
        let offsets_mmap = unsafe { MmapOptions::new().map_mut(&offsets_file)? };

        Ok(AtomStore {
            path: dir.to_path_buf(),
            max_atom_size,
            bucket_count,
            atoms_file,
            atoms_mmap,
            atoms_capacity,
            atomidx_file,
            atomidx_mmap,
            offsets_file,
            offsets_mmap,
            offsets_capacity,
            header,
        })
    }

    /// The directory this store is rooted at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured maximum atom size.
    pub fn max_atom_size(&self) -> usize {
        self.max_atom_size
    }

    /// Intern `bytes`, returning its existing id if already present,
    /// otherwise allocating and persisting a new one.
    pub fn intern(&mut self, bytes: &[u8]) -> Result<AtomId, AtomError> {
        if bytes.len() > self.max_atom_size {
            return Err(AtomError::TooLarge {
                len: bytes.len(),
                max: self.max_atom_size,
            });
        }

        let hash = fnv1a(bytes);
        match self.probe(hash, bytes)? {
            Probe::Found(id) => Ok(id),
            Probe::Empty(bucket_idx) => self.insert_new(bucket_idx, hash, bytes),
        }
    }

    /// Probe for `bytes` without inserting. Returns `AtomId::NIL` if absent.
    pub fn get_id(&self, bytes: &[u8]) -> AtomId {
        let hash = fnv1a(bytes);
        match self.probe(hash, bytes) {
            Ok(Probe::Found(id)) => id,
            _ => AtomId::NIL,
        }
    }

    /// Zero-copy view of the bytes behind `id`. Borrowed from `&self`, so it
    /// cannot outlive a subsequent `intern`/`clear` call, which require
    /// `&mut self`.
    pub fn get(&self, id: AtomId) -> Result<&[u8], AtomError> {
        if id.is_nil() || id.raw() >= self.header.next_atom_id {
            return Err(AtomError::CorruptHeader {
                expected: id.raw(),
                found: 0,
            });
        }
        let offset = self.read_offset(id.raw());
        let len_bytes = &self.atoms_mmap[offset as usize..offset as usize + 8];
        let len = LittleEndian::read_u64(len_bytes) as usize;
        let start = offset as usize + 8;
        Ok(&self.atoms_mmap[start..start + len])
    }

    /// Snapshot of store-wide counters.
    pub fn stats(&self) -> AtomStats {
        let avg_length = if self.header.atom_count == 0 {
            0.0
        } else {
            self.header.total_bytes as f64 / self.header.atom_count as f64
        };
        AtomStats {
            atom_count: self.header.atom_count,
            total_bytes: self.header.total_bytes,
            avg_length,
        }
    }

    /// Reset the store to empty without touching file lengths: the position
    /// cursor rewinds to the header, the hash table is zeroed, and counters
    /// reset. Previously-interned bytes remain physically present (and
    /// unreachable) until the next growth event overwrites them.
    pub fn clear(&mut self) -> Result<(), AtomError> {
        self.header = AtomHeader::fresh();
        self.header
            .write_to(&mut self.atoms_mmap[..ATOM_HEADER_SIZE as usize]);
        self.atoms_mmap.flush()?;

        for chunk in self.atomidx_mmap.chunks_mut(8192) {
            chunk.fill(0);
        }
        self.atomidx_mmap.flush()?;
        Ok(())
    }

    fn probe(&self, hash: u64, bytes: &[u8]) -> Result<Probe, AtomError> {
        let home = hash % self.bucket_count;
        let len = bytes.len() as u64;
        for i in 0..ATOM_PROBE_CAP {
            let step = probe_step(i);
            let bucket_idx = (home + step) % self.bucket_count;
            let bucket = self.read_bucket(bucket_idx);
            if bucket.atom_id == 0 {
                return Ok(Probe::Empty(bucket_idx));
            }
            if bucket.hash == hash && bucket.length == len {
                let candidate = &self.atoms_mmap
                    [bucket.offset as usize + 8..bucket.offset as usize + 8 + len as usize];
                if candidate == bytes {
                    return Ok(Probe::Found(AtomId::new(bucket.atom_id)));
                }
            }
        }
        Err(AtomError::HashTableExhausted {
            probes: ATOM_PROBE_CAP,
            hash,
        })
    }

    fn insert_new(&mut self, bucket_idx: u64, hash: u64, bytes: &[u8]) -> Result<AtomId, AtomError> {
        let atom_id = self.header.next_atom_id;
        let record_size = 8 + bytes.len() as u64;

        self.ensure_blob_capacity(record_size)?;
        self.ensure_offsets_capacity(atom_id)?;

        let offset = self.header.data_position;
        let start = offset as usize;
        LittleEndian::write_u64(&mut self.atoms_mmap[start..], bytes.len() as u64);
        self.atoms_mmap[start + 8..start + 8 + bytes.len()].copy_from_slice(bytes);

        self.write_offset(atom_id, offset);

        // Publication order: hash, length, offset, then atom_id last, so any
        // probe that observes a non-zero atom_id sees a fully-initialised
        // slot. Sound only because AtomStore mutates exclusively under the
        // containing store's write lock (see crate docs).
        let base = (bucket_idx * ATOM_BUCKET_SIZE) as usize;
        LittleEndian::write_u64(&mut self.atomidx_mmap[base + 8..], hash);
        LittleEndian::write_u64(&mut self.atomidx_mmap[base + 24..], bytes.len() as u64);
        LittleEndian::write_u64(&mut self.atomidx_mmap[base + 16..], offset);
        fence(Ordering::Release);
        LittleEndian::write_u64(&mut self.atomidx_mmap[base..], atom_id);

        self.header.data_position = offset + record_size;
        self.header.next_atom_id += 1;
        self.header.atom_count += 1;
        self.header.total_bytes += bytes.len() as u64;
        self.header
            .write_to(&mut self.atoms_mmap[..ATOM_HEADER_SIZE as usize]);

        Ok(AtomId::new(atom_id))
    }

    fn read_bucket(&self, bucket_idx: u64) -> Bucket {
        let base = (bucket_idx * ATOM_BUCKET_SIZE) as usize;
        let buf = &self.atomidx_mmap[base..base + ATOM_BUCKET_SIZE as usize];
        Bucket {
            atom_id: LittleEndian::read_u64(&buf[0..]),
            hash: LittleEndian::read_u64(&buf[8..]),
            offset: LittleEndian::read_u64(&buf[16..]),
            length: LittleEndian::read_u64(&buf[24..]),
        }
    }

    fn read_offset(&self, atom_id: u64) -> u64 {
        let base = (atom_id * OFFSET_SLOT_SIZE) as usize;
        LittleEndian::read_u64(&self.offsets_mmap[base..])
    }

    fn write_offset(&mut self, atom_id: u64, offset: u64) {
        let base = (atom_id * OFFSET_SLOT_SIZE) as usize;
        LittleEndian::write_u64(&mut self.offsets_mmap[base..], offset);
    }

    /// Grow the blob file, doubling its length, extending the file before
    /// remapping so the mapped region never transiently exceeds the file
    /// length.
    fn ensure_blob_capacity(&mut self, additional: u64) -> Result<(), AtomError> {
        let needed = self.header.data_position + additional;
        if needed <= self.atoms_capacity {
            return Ok(());
        }
        let mut new_len = self.atoms_capacity.max(1);
        while new_len < needed {
            new_len *= 2;
        }
        self.atoms_file.set_len(new_len)?;
        self.atoms_mmap = unsafe { MmapOptions::new().map_mut(&self.atoms_file)? };
        self.atoms_capacity = new_len;
        Ok(())
    }

    /// Grow the offsets file so slot `atom_id` exists, doubling capacity.
    fn ensure_offsets_capacity(&mut self, atom_id: u64) -> Result<(), AtomError> {
        if atom_id + 1 <= self.offsets_capacity {
            return Ok(());
        }
        let mut new_capacity = self.offsets_capacity.max(1);
        while new_capacity < atom_id + 1 {
            new_capacity *= 2;
        }
        self.offsets_file.set_len(new_capacity * OFFSET_SLOT_SIZE)?;
        self.offsets_mmap = unsafe { MmapOptions::new().map_mut(&self.offsets_file)? };
        self.offsets_capacity = new_capacity;
        Ok(())
    }
}

/// Convenience constructor mirroring [`AtomStore::open`] with the default
/// max atom size from [`mercury_core::limits::DEFAULT_MAX_ATOM_SIZE`].
pub fn open_default(dir: &Path) -> Result<AtomStore, AtomError> {
    AtomStore::open(dir, DEFAULT_MAX_ATOM_SIZE)
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
}

/// The probe step for probe attempt `i`: quadratic (`i^2`) for the first
/// `ATOM_QUADRATIC_PROBES` attempts, then linear thereafter so the sequence
/// stays continuous at the switchover point.
fn probe_step(i: u64) -> u64 {
    if i < ATOM_QUADRATIC_PROBES {
        i * i
    } else {
        ATOM_QUADRATIC_PROBES * ATOM_QUADRATIC_PROBES + (i - ATOM_QUADRATIC_PROBES)
    }
}

enum Probe {
    Found(AtomId),
    Empty(u64),
}

struct Bucket {
    atom_id: u64,
    hash: u64,
    offset: u64,
    length: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_small(dir: &Path) -> AtomStore {
        AtomStore::open_with_bucket_count(dir, DEFAULT_MAX_ATOM_SIZE, 1024).unwrap()
    }

    #[test]
    fn intern_idempotence() {
        let dir = tempdir().unwrap();
        let mut store = open_small(dir.path());
        let a = store.intern(b"<http://ex/s>").unwrap();
        let b = store.intern(b"<http://ex/s>").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.get(a).unwrap(), b"<http://ex/s>");
    }

    #[test]
    fn atom_zero_never_returned_for_nonempty() {
        let dir = tempdir().unwrap();
        let mut store = open_small(dir.path());
        let id = store.intern(b"nonzero").unwrap();
        assert!(!id.is_nil());
    }

    #[test]
    fn get_id_does_not_insert() {
        let dir = tempdir().unwrap();
        let mut store = open_small(dir.path());
        assert_eq!(store.get_id(b"missing"), AtomId::NIL);
        let before = store.stats().atom_count;
        assert_eq!(store.get_id(b"still missing"), AtomId::NIL);
        assert_eq!(store.stats().atom_count, before);
    }

    #[test]
    fn too_large_is_rejected() {
        let dir = tempdir().unwrap();
        let mut store = AtomStore::open_with_bucket_count(dir.path(), 8, 64).unwrap();
        let err = store.intern(b"way too long for eight bytes").unwrap_err();
        assert!(matches!(err, AtomError::TooLarge { .. }));
    }

    #[test]
    fn growth_preserves_existing_atoms() {
        let dir = tempdir().unwrap();
        let mut store = open_small(dir.path());
        let mut ids = Vec::new();
        for i in 0..5000u32 {
            let value = format!("urn:atom:{i}");
            ids.push((value.clone(), store.intern(value.as_bytes()).unwrap()));
        }
        for (value, id) in &ids {
            assert_eq!(store.get(*id).unwrap(), value.as_bytes());
        }
    }

    #[test]
    fn clear_resets_counters_without_shrinking_files() {
        let dir = tempdir().unwrap();
        let mut store = open_small(dir.path());
        for i in 0..100u32 {
            store.intern(format!("x{i}").as_bytes()).unwrap();
        }
        let atoms_len_before = store.atoms_capacity;
        store.clear().unwrap();
        assert_eq!(store.stats().atom_count, 0);
        assert_eq!(store.get_id(b"x0"), AtomId::NIL);
        assert_eq!(store.atoms_capacity, atoms_len_before);
    }

    #[test]
    fn reopen_recovers_interned_atoms() {
        let dir = tempdir().unwrap();
        let id;
        {
            let mut store = open_small(dir.path());
            id = store.intern(b"persisted").unwrap();
        }
        let store = open_small(dir.path());
        assert_eq!(store.get(id).unwrap(), b"persisted");
        assert_eq!(store.get_id(b"persisted"), id);
    }
}
