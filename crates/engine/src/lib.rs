//! `QuadStore`: the durable bitemporal facade that composes one
//! `mercury-atoms` store, four `mercury-storage` indexes, one
//! `mercury-durability` write-ahead log, and a statistics snapshot behind a
//! single reader-writer lock.
//!
//! This is the crate `mercury-pool` rents instances of, and the crate the
//! top-level `mercury` facade re-exports from.
#![warn(missing_docs)]

pub mod compaction;
pub mod error;
pub mod statistics;
pub mod store;

pub use error::{EngineError, Result};
pub use statistics::{PredicateStats, StatisticsSnapshot, StatisticsStore};
pub use store::{BatchSession, QuadRecord, QuadStore, QueryResults};
