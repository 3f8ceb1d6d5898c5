//! Memory-mapped UTF-8 atom interning store.
//!
//! Assigns a stable 64-bit id to every distinct byte string presented to it
//! (IRIs, literals, blank-node labels) and hands the exact bytes back given
//! the id. See [`store::AtomStore`] for the full contract.
#![warn(missing_docs)]

pub mod error;
mod hash;
mod header;
pub mod store;

pub use error::AtomError;
pub use store::{open_default, AtomStats, AtomStore};
