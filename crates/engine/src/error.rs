//! Facade-level error composition.

use thiserror::Error;

/// Errors raised by [`crate::store::QuadStore`] that don't already have a
/// narrower home in `mercury-atoms`/`mercury-storage`/`mercury-durability`
/// (which compose into [`mercury_core::Error`] directly via `#[from]` at
/// their own crate boundaries).
#[derive(Debug, Error)]
pub enum EngineError {
    /// An atom store operation failed.
    #[error(transparent)]
    Atom(#[from] mercury_atoms::AtomError),

    /// An index operation failed.
    #[error(transparent)]
    Storage(#[from] mercury_storage::StorageError),

    /// A WAL operation failed.
    #[error(transparent)]
    Durability(#[from] mercury_durability::DurabilityError),

    /// The store was used after `dispose()`.
    #[error("object disposed")]
    ObjectDisposed,

    /// The caller's cancellation token fired mid-operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<EngineError> for mercury_core::Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Atom(e) => e.into(),
            EngineError::Storage(e) => e.into(),
            EngineError::Durability(e) => e.into(),
            EngineError::ObjectDisposed => mercury_core::Error::ObjectDisposed,
            EngineError::Cancelled => mercury_core::Error::Cancelled,
        }
    }
}

/// Result type alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, EngineError>;
