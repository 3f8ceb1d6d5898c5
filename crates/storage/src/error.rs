//! Failure modes specific to the B+Tree quad index and trigram index.

use thiserror::Error;

/// Errors raised by [`crate::index::QuadIndex`] and [`crate::trigram::TrigramIndex`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file or mapping operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A page's header failed its magic-number or page-id consistency check.
    #[error("corrupt page {page_id}: {detail}")]
    CorruptPage {
        /// The page that failed validation.
        page_id: u64,
        /// What about it was wrong.
        detail: String,
    },

    /// The index metadata header failed its magic-number check on open.
    #[error("corrupt index header: expected magic {expected:#x}, found {found:#x}")]
    CorruptHeader {
        /// Expected magic value.
        expected: u64,
        /// Magic value actually read.
        found: u64,
    },

    /// A leaf page overflowed its entry capacity and a split failed to make
    /// room, indicating a logic error rather than a data problem.
    #[error("page {page_id} overflowed its capacity of {capacity} entries")]
    PageOverflow {
        /// The page that overflowed.
        page_id: u64,
        /// Its entry capacity.
        capacity: usize,
    },
}

impl From<StorageError> for mercury_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => mercury_core::Error::StorageIo(e),
            StorageError::CorruptPage { page_id, detail } => {
                mercury_core::Error::CorruptInterior {
                    offset: page_id,
                    remaining: detail.len() as u64,
                }
            }
            StorageError::CorruptHeader { .. } => mercury_core::Error::Codec(err.to_string()),
            StorageError::PageOverflow { .. } => mercury_core::Error::Codec(err.to_string()),
        }
    }
}
