//! The bitemporal B+Tree quad index, its page cache, and the optional
//! trigram full-text index.
//!
//! `mercury-storage` owns the on-disk page format and the four physical
//! orderings described in `mercury-core::quad::IndexOrdering`. It has no
//! notion of the write-ahead log or the atom store; `mercury-engine` wires
//! this crate, `mercury-atoms`, and `mercury-durability` together behind one
//! reader-writer lock.
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod index;
pub mod key;
pub mod page;
pub mod trigram;

pub use cache::PageCache;
pub use error::StorageError;
pub use index::QuadIndex;
pub use trigram::TrigramIndex;
