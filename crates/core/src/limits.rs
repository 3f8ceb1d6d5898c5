//! Compile-time constants shared across the storage substrate.
//!
//! Probe caps for the atom hash table, the B+Tree page size, and the WAL
//! checkpoint thresholds, grouped here so a reader only has one place to
//! check when reasoning about capacity.

/// Default maximum size, in bytes, of a single interned atom.
pub const DEFAULT_MAX_ATOM_SIZE: usize = 1024 * 1024;

/// Number of buckets in the atom hash table (~16 million, 32 bytes each).
pub const ATOM_HASH_BUCKET_COUNT: u64 = 16 * 1024 * 1024;

/// Number of probes performed with the quadratic step before falling back
/// to linear probing.
pub const ATOM_QUADRATIC_PROBES: u64 = 64;

/// Hard cap on the total number of probes performed before a store reports
/// `HashTableExhausted`.
pub const ATOM_PROBE_CAP: u64 = 4096;

/// Size in bytes of the reserved header at the start of the `.atoms` file.
pub const ATOM_HEADER_SIZE: u64 = 1024;

/// Size in bytes of a single atom hash bucket: atom_id, hash, offset, length.
pub const ATOM_BUCKET_SIZE: u64 = 32;

/// Magic value identifying the `.atoms` data header ("UTF8ATOM" as ASCII,
/// little-endian encoded).
pub const ATOM_FILE_MAGIC: u64 = 0x5554_4638_4154_4F4D;

/// Size in bytes of a single B+Tree page.
pub const PAGE_SIZE: usize = 16 * 1024;

/// Magic value identifying a `QuadIndex` page file ("TEMPORAL" as ASCII).
pub const INDEX_FILE_MAGIC: u64 = 0x5445_4D50_4F52_414C;

/// Size in bytes of a single fixed WAL record.
pub const WAL_RECORD_SIZE: usize = 72;

/// Checkpoint threshold: trigger a checkpoint once the log has grown past
/// this many bytes since the last checkpoint.
pub const WAL_CHECKPOINT_SIZE_BYTES: u64 = 16 * 1024 * 1024;

/// Checkpoint threshold: trigger a checkpoint once this many seconds have
/// elapsed since the last checkpoint.
pub const WAL_CHECKPOINT_INTERVAL_SECS: u64 = 60;

/// Prime multiplier used by the WAL's non-cryptographic checksum.
pub const WAL_CHECKSUM_PRIME: u64 = 0x9E37_79B9_7F4A_7C15;

/// Default timeout, in seconds, for the pool's optional cross-process gate.
pub const DEFAULT_POOL_GATE_TIMEOUT_SECS: u64 = 60;

/// Default fraction of free disk space a pool may claim for its stores.
pub const DEFAULT_POOL_DISK_BUDGET_FRACTION: f64 = 0.33;
