//! Failure modes specific to the atom store.

use thiserror::Error;

/// Errors raised by [`crate::store::AtomStore`].
#[derive(Debug, Error)]
pub enum AtomError {
    /// A file or mapping operation failed.
    #[error("atom store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `intern` was called with a value longer than `max_atom_size`.
    #[error("atom of {len} bytes exceeds max_atom_size of {max}")]
    TooLarge {
        /// Length of the rejected value, in bytes.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Probing exceeded the cap before finding an empty slot or existing
    /// match. Fatal: capacity is provisioned for well under 50% load, so
    /// this indicates misconfiguration rather than transient contention.
    #[error("atom hash table exhausted after {probes} probes for hash {hash:#x}")]
    HashTableExhausted {
        /// Number of probes attempted.
        probes: u64,
        /// The hash being probed for.
        hash: u64,
    },

    /// The `.atoms` header failed its magic-number check on open.
    #[error("corrupt atom store header: expected magic {expected:#x}, found {found:#x}")]
    CorruptHeader {
        /// Expected magic value.
        expected: u64,
        /// Magic value actually read.
        found: u64,
    },
}

impl From<AtomError> for mercury_core::Error {
    fn from(err: AtomError) -> Self {
        match err {
            AtomError::Io(e) => mercury_core::Error::StorageIo(e),
            AtomError::TooLarge { len, max } => mercury_core::Error::AtomTooLarge { len, max },
            AtomError::HashTableExhausted { probes, .. } => {
                mercury_core::Error::HashTableExhausted { probes }
            }
            AtomError::CorruptHeader { .. } => mercury_core::Error::Codec(err.to_string()),
        }
    }
}
