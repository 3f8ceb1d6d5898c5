//! Unified error taxonomy for Mercury.
//!
//! Every subsystem crate (`mercury-atoms`, `mercury-storage`,
//! `mercury-durability`, `mercury-pool`) defines its own narrower error enum
//! for the failures only it can produce; [`Error`] composes them via `#[from]`
//! so callers at the facade boundary see one flat type.

use thiserror::Error;

/// Result type alias used throughout the Mercury workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The unified error type returned from the public API boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A file or mapping operation failed. The store becomes read-only.
    #[error("storage I/O error: {0}")]
    StorageIo(#[from] std::io::Error),

    /// An interned value exceeded `max_atom_size`.
    #[error("atom of {len} bytes exceeds max_atom_size of {max}")]
    AtomTooLarge {
        /// Length of the rejected value, in bytes.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Growing a mapped file would breach the configured minimum free space.
    #[error("insufficient disk space: need {needed} bytes, {available} available")]
    InsufficientDiskSpace {
        /// Bytes required to complete the growth.
        needed: u64,
        /// Bytes actually available.
        available: u64,
    },

    /// An invalid WAL record was found before end-of-file during recovery.
    /// This is always fatal; torn tails are recovered silently and never
    /// surface as this variant.
    #[error("corrupt WAL record at offset {offset}, {remaining} bytes before EOF")]
    CorruptInterior {
        /// Byte offset of the invalid record.
        offset: u64,
        /// Bytes that followed it before EOF.
        remaining: u64,
    },

    /// The atom hash table's probe cap was hit. Indicates a capacity
    /// misconfiguration, not transient contention.
    #[error("atom hash table exhausted after {probes} probes")]
    HashTableExhausted {
        /// Number of probes attempted before giving up.
        probes: u64,
    },

    /// Acquiring the pool's cross-process gate timed out.
    #[error("pool gate acquisition timed out after {0:?}")]
    PoolTimeout(std::time::Duration),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The store (or pooled handle) was used after `dispose()`.
    #[error("object disposed")]
    ObjectDisposed,

    /// A value could not be encoded/decoded to its on-disk representation.
    #[error("codec error: {0}")]
    Codec(String),
}

impl Error {
    /// Corrupt-tail recovery truncates and continues; it is never surfaced
    /// as an [`Error`]. This helper exists so callers can distinguish the
    /// two corruption outcomes at a glance.
    pub fn is_fatal_corruption(&self) -> bool {
        matches!(self, Error::CorruptInterior { .. })
    }

    /// Whether the store should be considered read-only after this error.
    pub fn is_read_only_trigger(&self) -> bool {
        matches!(self, Error::StorageIo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_too_large_message_includes_sizes() {
        let err = Error::AtomTooLarge {
            len: 2_000_000,
            max: 1_048_576,
        };
        let msg = err.to_string();
        assert!(msg.contains("2000000"));
        assert!(msg.contains("1048576"));
    }

    #[test]
    fn corrupt_interior_is_fatal() {
        let err = Error::CorruptInterior {
            offset: 144,
            remaining: 72,
        };
        assert!(err.is_fatal_corruption());
        assert!(!Error::Cancelled.is_fatal_corruption());
    }

    #[test]
    fn io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::StorageIo(_)));
    }
}
