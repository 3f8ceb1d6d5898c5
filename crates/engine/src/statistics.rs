//! Per-predicate cardinality statistics, rebuilt during checkpoint.
//!
//! Rebuilding scans the GPOS ordering exactly once (predicate-grouped,
//! so every predicate's entries are contiguous) and publishes a fresh,
//! immutable snapshot via a lock-free pointer swap. Readers always see a
//! complete, internally-consistent snapshot without taking a lock,
//! following the `ArcSwap` pattern used elsewhere in the corpus for
//! publish-once/read-many state (health/tip tracking).

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::{FxHashMap, FxHashSet};

use mercury_core::TemporalQuadEntry;

/// Cardinality counters for one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredicateStats {
    /// Number of live (non-tombstoned, currently valid) triples using this
    /// predicate.
    pub triple_count: u64,
    /// Number of distinct subjects seen with this predicate.
    pub distinct_subjects: u64,
    /// Number of distinct objects seen with this predicate.
    pub distinct_objects: u64,
    /// Highest transaction id observed for this predicate at snapshot time.
    pub last_tx_id: u64,
}

/// An immutable statistics snapshot, intended as optimizer input (out of
/// scope for this crate) and otherwise advisory only -- nothing in the core
/// depends on it for correctness.
#[derive(Debug, Clone, Default)]
pub struct StatisticsSnapshot {
    per_predicate: HashMap<u64, PredicateStats>,
    /// Total live triples across every predicate.
    pub total_triples: u64,
    /// Highest transaction id reflected anywhere in this snapshot.
    pub tx_id_watermark: u64,
}

impl StatisticsSnapshot {
    /// Stats for `predicate`, or the all-zero default if never observed.
    pub fn predicate(&self, predicate: u64) -> PredicateStats {
        self.per_predicate.get(&predicate).copied().unwrap_or_default()
    }

    /// Every predicate with recorded stats.
    pub fn predicates(&self) -> impl Iterator<Item = (&u64, &PredicateStats)> {
        self.per_predicate.iter()
    }
}

/// Builds a [`StatisticsSnapshot`] from a GPOS-ordered scan and publishes it
/// lock-free.
#[derive(Debug, Default)]
pub struct StatisticsStore {
    current: Arc<ArcSwap<StatisticsSnapshot>>,
}

impl StatisticsStore {
    /// A store with an empty initial snapshot.
    pub fn new() -> Self {
        StatisticsStore {
            current: Arc::new(ArcSwap::from_pointee(StatisticsSnapshot::default())),
        }
    }

    /// The current snapshot. Cheap: an `Arc` clone, no locking.
    pub fn snapshot(&self) -> Arc<StatisticsSnapshot> {
        self.current.load_full()
    }

    /// Recompute and publish a fresh snapshot from `entries`, which must be
    /// in GPOS order (predicate-major) -- the caller (the facade's
    /// `checkpoint`) is responsible for the ordering; this only aggregates.
    /// Only live (non-tombstoned), currently-valid entries contribute to
    /// the counts.
    pub fn rebuild<'a>(&self, entries: impl Iterator<Item = &'a TemporalQuadEntry>, now: i64) {
        let mut per_predicate: FxHashMap<u64, PredicateStats> = FxHashMap::default();
        let mut subjects: FxHashMap<u64, FxHashSet<u64>> = FxHashMap::default();
        let mut objects: FxHashMap<u64, FxHashSet<u64>> = FxHashMap::default();
        let mut total_triples = 0u64;
        let mut tx_id_watermark = 0u64;

        for entry in entries {
            tx_id_watermark = tx_id_watermark.max(entry.transaction_time.max(0) as u64);
            if !entry.visible_as_of(now) {
                continue;
            }
            let predicate = entry.quad.predicate.raw();
            let stats = per_predicate.entry(predicate).or_default();
            stats.triple_count += 1;
            stats.last_tx_id = stats.last_tx_id.max(entry.transaction_time.max(0) as u64);
            subjects.entry(predicate).or_default().insert(entry.quad.subject.raw());
            objects.entry(predicate).or_default().insert(entry.quad.object.raw());
            total_triples += 1;
        }

        for (predicate, stats) in per_predicate.iter_mut() {
            stats.distinct_subjects = subjects.get(predicate).map(|s| s.len() as u64).unwrap_or(0);
            stats.distinct_objects = objects.get(predicate).map(|s| s.len() as u64).unwrap_or(0);
        }

        let snapshot = StatisticsSnapshot {
            per_predicate: per_predicate.into_iter().collect(),
            total_triples,
            tx_id_watermark,
        };
        self.current.store(Arc::new(snapshot));
    }

    /// Reset to an empty snapshot, for `QuadStore::clear`.
    pub fn clear(&self) {
        self.current.store(Arc::new(StatisticsSnapshot::default()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercury_core::{AtomId, Quad};

    fn entry(p: u64, s: u64, o: u64, tx: i64) -> TemporalQuadEntry {
        TemporalQuadEntry {
            quad: Quad::new(AtomId::NIL, AtomId::new(s), AtomId::new(p), AtomId::new(o)),
            valid_from: 0,
            valid_to: i64::MAX,
            transaction_time: tx,
            is_deleted: false,
            created_at: tx,
            modified_at: tx,
            version: 1,
        }
    }

    #[test]
    fn rebuild_aggregates_per_predicate() {
        let store = StatisticsStore::new();
        let entries = vec![entry(1, 10, 100, 5), entry(1, 11, 100, 6), entry(2, 10, 200, 7)];
        store.rebuild(entries.iter(), 1000);
        let snap = store.snapshot();
        assert_eq!(snap.predicate(1).triple_count, 2);
        assert_eq!(snap.predicate(1).distinct_subjects, 2);
        assert_eq!(snap.predicate(1).distinct_objects, 1);
        assert_eq!(snap.predicate(2).triple_count, 1);
        assert_eq!(snap.total_triples, 3);
        assert_eq!(snap.tx_id_watermark, 7);
    }

    #[test]
    fn tombstoned_and_future_entries_are_excluded_from_counts() {
        let store = StatisticsStore::new();
        let mut deleted = entry(1, 10, 100, 5);
        deleted.is_deleted = true;
        let mut future = entry(1, 11, 100, 6);
        future.valid_from = 5000;
        store.rebuild([deleted, future].iter(), 1000);
        assert_eq!(store.snapshot().total_triples, 0);
        // The watermark still reflects every record seen, live or not.
        assert_eq!(store.snapshot().tx_id_watermark, 6);
    }

    #[test]
    fn successive_additions_are_monotonic() {
        let store = StatisticsStore::new();
        store.rebuild([entry(1, 10, 100, 1)].iter(), 1000);
        let first = store.snapshot().predicate(1).triple_count;
        store.rebuild([entry(1, 10, 100, 1), entry(1, 11, 101, 2)].iter(), 1000);
        let second = store.snapshot().predicate(1).triple_count;
        assert!(second >= first);
    }

    #[test]
    fn clear_resets_to_empty() {
        let store = StatisticsStore::new();
        store.rebuild([entry(1, 10, 100, 1)].iter(), 1000);
        store.clear();
        assert_eq!(store.snapshot().total_triples, 0);
    }
}
