//! Shared data model, error taxonomy, and configuration for Mercury.
//!
//! This crate has no I/O of its own — it is the vocabulary every other
//! crate in the workspace (`mercury-atoms`, `mercury-storage`,
//! `mercury-durability`, `mercury-concurrency`, `mercury-engine`,
//! `mercury-pool`) builds on: the `AtomId` and quad types, the four index
//! orderings, the unified error enum, and the store-wide configuration.
#![warn(missing_docs)]

pub mod atom;
pub mod config;
pub mod error;
pub mod limits;
pub mod quad;
pub mod time;

pub use atom::AtomId;
pub use config::{CheckpointPolicy, MercuryConfig, PoolPolicy};
pub use error::{Error, Result};
pub use quad::{IndexOrdering, Quad, QueryMode, TemporalQuadEntry, VALID_TO_FOREVER};
pub use time::now_millis;
