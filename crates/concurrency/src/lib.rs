//! Session handles, cancellation tokens, and multi-store lock ordering for
//! Mercury's single-writer/multi-reader concurrency contract.
//!
//! This crate owns no storage of its own; it is the synchronization
//! vocabulary `mercury-engine` builds its `QuadStore` facade on top of.
#![warn(missing_docs)]

pub mod cancellation;
pub mod lock_order;
pub mod session;

pub use cancellation::CancellationToken;
pub use lock_order::{ascending, LockIdentity};
pub use session::{ReadSession, Sessions, WriteSession};
