//! Failure modes specific to the write-ahead log.

use thiserror::Error;

/// Errors raised by [`crate::wal::WriteAheadLog`].
#[derive(Debug, Error)]
pub enum DurabilityError {
    /// A file operation (append, fsync, truncate) failed. Fatal to the
    /// containing store.
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An invalid record was found before end-of-file during recovery.
    /// Unlike a torn tail, this cannot be silently truncated: something
    /// wrote a corrupt record in the middle of an otherwise-valid log.
    #[error("corrupt WAL record at offset {offset}, {remaining} bytes of the log follow it")]
    CorruptInterior {
        /// Byte offset of the invalid record.
        offset: u64,
        /// Bytes that followed it before EOF.
        remaining: u64,
    },

    /// `append_batch` / `commit_batch` / `rollback_batch` was called with a
    /// `batch_tx_id` that does not match the currently open batch (or no
    /// batch is open at all).
    #[error("no open batch with id {0}")]
    NoSuchBatch(u64),

    /// A batch was already open when `begin_batch` was called again. The
    /// WAL serializes batches the same way the containing store's write
    /// lock serializes writers: only one batch may be open at a time.
    #[error("a batch is already open (tx_id {0})")]
    BatchAlreadyOpen(u64),
}

impl From<DurabilityError> for mercury_core::Error {
    fn from(err: DurabilityError) -> Self {
        match err {
            DurabilityError::Io(e) => mercury_core::Error::StorageIo(e),
            DurabilityError::CorruptInterior { offset, remaining } => {
                mercury_core::Error::CorruptInterior { offset, remaining }
            }
            DurabilityError::NoSuchBatch(_) | DurabilityError::BatchAlreadyOpen(_) => {
                mercury_core::Error::Codec(err.to_string())
            }
        }
    }
}
