//! # Mercury
//!
//! A bitemporal RDF quad store: a crash-safe, memory-mapped storage
//! substrate for (graph, subject, predicate, object) quads, each carrying a
//! valid-time interval (when a fact was true in the world) and a
//! transaction-time point (when the store learned it).
//!
//! Mercury is a storage engine, not a SPARQL database: there is no parser,
//! no query language, no HTTP surface. Callers pass interned strings and
//! structured patterns in, [`TemporalQuadEntry`] rows out.
//!
//! # Quick start
//!
//! ```no_run
//! use mercury::{MercuryConfig, QuadStore};
//!
//! fn main() -> mercury::Result<()> {
//!     let store = QuadStore::open("./my-graph".as_ref(), MercuryConfig::default())?;
//!
//!     store.add_current("", "https://example.org/alice", "knows", "https://example.org/bob")?;
//!
//!     for row in store.query_current(None, Some("https://example.org/alice"), None, None)? {
//!         let row = row?;
//!         println!("{} {} {}", row.subject, row.predicate, row.object);
//!     }
//!
//!     store.checkpoint()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The [`QuadStore`] is the main entry point, composing an interned string
//! table (`mercury-atoms`), four bitemporal B+Tree indexes
//! (`mercury-storage`), and a write-ahead log (`mercury-durability`) behind
//! a single reader-writer lock (`mercury-concurrency`). Workloads that
//! repeatedly need fresh, empty stores — test suites, bulk-load jobs —
//! should rent them from a [`QuadStorePool`] instead of opening and
//! disposing one each time.
//!
//! Internal crates (`mercury-core`, `mercury-atoms`, `mercury-storage`,
//! `mercury-durability`, `mercury-concurrency`) are implementation detail.
//! Only the surface re-exported here is stable.

pub use mercury_core::{
    now_millis, AtomId, CheckpointPolicy, Error, IndexOrdering, MercuryConfig, PoolPolicy, Quad, QueryMode, Result,
    TemporalQuadEntry, VALID_TO_FOREVER,
};
pub use mercury_engine::{BatchSession, PredicateStats, QuadRecord, QuadStore, QueryResults, StatisticsSnapshot};
pub use mercury_pool::{CrossProcessGate, GateSlot, QuadStorePool, RentedStore};
