//! The write-ahead log and crash-recovery protocol for Mercury.
//!
//! A [`wal::WriteAheadLog`] is a single append-only file of fixed
//! [`mercury_core::limits::WAL_RECORD_SIZE`]-byte records. It is the sole
//! durability source of truth: the B+Tree indexes in `mercury-storage` may
//! be mid-split or otherwise inconsistent at crash time, and a subsequent
//! `open` always replays from the log rather than trusting index state.
#![warn(missing_docs)]

pub mod error;
pub mod record;
pub mod wal;

pub use error::DurabilityError;
pub use record::{WalOp, WalRecord};
pub use wal::WriteAheadLog;
