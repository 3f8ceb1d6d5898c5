//! Compaction is an externally orchestrated protocol, not a method on
//! [`crate::store::QuadStore`]: the core only provides the primitives a
//! compaction job needs (a consistent point-in-time read of every live
//! quad, and the read/write session types to hold the store still while
//! copying). Creating the replacement store, running the copy, deciding
//! when to cut over, and disposing the old store are the orchestrator's
//! job, because only it knows which of the write-unavailability policies
//! the deployment wants.
//!
//! This module has no runtime code; it exists to keep the doc example
//! below compiled and close to the primitives it exercises.
//!
//! ```no_run
//! use mercury_core::MercuryConfig;
//! use mercury_core::now_millis;
//! use mercury_engine::QuadStore;
//!
//! # fn main() -> mercury_engine::Result<()> {
//! let source = QuadStore::open("./live".as_ref(), MercuryConfig::default())?;
//! let target = QuadStore::open("./compacted".as_ref(), MercuryConfig::default())?;
//!
//! // Policy (a), pause writes: the caller holds its own write lock around
//! // the source for the whole copy, so no quad committed during the copy
//! // is missed and none is copied twice. A caller implementing policy (b)
//! // (snapshot-then-catch-up) or (c) (dual-write during cutover) would
//! // only take a read session here and handle a second pass over
//! // `query_changes` for whatever committed after the snapshot instant.
//! let cutover = now_millis();
//! for row in source.live_quads_as_of(cutover)? {
//!     let row = row?;
//!     target.add(&row.graph, &row.subject, &row.predicate, &row.object, row.valid_from, row.valid_to)?;
//! }
//! target.checkpoint()?;
//!
//! // Cutover itself -- swapping which store a caller's `Arc<QuadStore>`
//! // points at -- is deliberately not a method here: it's the
//! // orchestrator's call on how readers discover the swap.
//! source.dispose()?;
//! # Ok(())
//! # }
//! ```
