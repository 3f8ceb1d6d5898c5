//! Failure modes specific to the pool.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by [`crate::pool::QuadStorePool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// A filesystem operation (temp-dir allocation, gate-slot file,
    /// disk-space probe) failed.
    #[error("pool I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening, clearing, or disposing a rented store failed.
    #[error(transparent)]
    Engine(#[from] mercury_engine::EngineError),

    /// The cross-process gate could not claim a slot before its timeout.
    #[error("pool gate acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// The pool was used after [`crate::pool::QuadStorePool::dispose`].
    #[error("pool used after dispose()")]
    Disposed,
}

impl From<PoolError> for mercury_core::Error {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Io(e) => mercury_core::Error::StorageIo(e),
            PoolError::Engine(e) => e.into(),
            PoolError::Timeout(d) => mercury_core::Error::PoolTimeout(d),
            PoolError::Disposed => mercury_core::Error::ObjectDisposed,
        }
    }
}

/// Result type alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, PoolError>;
