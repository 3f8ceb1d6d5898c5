//! The logical quad, the persisted bitemporal entry, and the four B+Tree
//! index orderings that key it.

use crate::atom::AtomId;

/// A logical (graph, subject, predicate, object) tuple. `graph ==
/// AtomId::NIL` denotes the default graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quad {
    /// Named graph, or `AtomId::NIL` for the default graph.
    pub graph: AtomId,
    /// Subject atom.
    pub subject: AtomId,
    /// Predicate atom.
    pub predicate: AtomId,
    /// Object atom.
    pub object: AtomId,
}

impl Quad {
    /// Construct a quad from its four columns.
    pub fn new(graph: AtomId, subject: AtomId, predicate: AtomId, object: AtomId) -> Self {
        Quad {
            graph,
            subject,
            predicate,
            object,
        }
    }
}

/// The persisted, fixed-size bitemporal record: the quad's four atoms,
/// its valid-time interval, the
/// transaction-time watermark it was committed under, a soft-delete
/// tombstone, bookkeeping timestamps, and a per-SPO version counter.
///
/// `valid_to == i64::MAX` represents an open-ended ("still current")
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalQuadEntry {
    /// The logical quad.
    pub quad: Quad,
    /// Inclusive start of the valid-time interval, ms since epoch.
    pub valid_from: i64,
    /// Exclusive end of the valid-time interval, ms since epoch.
    pub valid_to: i64,
    /// Wall-clock ms when this record was committed.
    pub transaction_time: i64,
    /// Tombstone flag: invisible to as-of/range queries, visible to history.
    pub is_deleted: bool,
    /// Wall-clock ms when this record was first created.
    pub created_at: i64,
    /// Wall-clock ms when this record was last modified (e.g. truncated by
    /// a temporal overwrite, or tombstoned by a delete).
    pub modified_at: i64,
    /// Monotonic version counter, scoped per (subject, predicate, object).
    pub version: u32,
}

/// Sentinel used in prefix-bound scans for an unbound column at the low end
/// of a range.
pub const UNBOUND_MIN: u64 = 0;

/// Sentinel used in prefix-bound scans for an unbound column at the high end
/// of a range.
pub const UNBOUND_MAX: u64 = u64::MAX;

/// Represents "valid forever" for an open-ended interval.
pub const VALID_TO_FOREVER: i64 = i64::MAX;

impl TemporalQuadEntry {
    /// True if `at_time` falls within `[valid_from, valid_to)` and the
    /// entry is not tombstoned.
    pub fn visible_as_of(&self, at_time: i64) -> bool {
        !self.is_deleted && self.valid_from <= at_time && at_time < self.valid_to
    }

    /// True if `[self.valid_from, self.valid_to)` overlaps `[t_start,
    /// t_end)` and the entry is not tombstoned.
    pub fn visible_in_range(&self, t_start: i64, t_end: i64) -> bool {
        !self.is_deleted && self.valid_from < t_end && t_start < self.valid_to
    }
}

/// The four physical B+Tree orderings over the bitemporal composite key.
/// Each index file stores the same logical entries sorted by a different
/// column sequence, enabling an O(log n + k) scan for whichever column is
/// bound in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOrdering {
    /// graph, subject, predicate, object, then time columns.
    Gspo,
    /// graph, predicate, object, subject, then time columns.
    Gpos,
    /// graph, object, subject, predicate, then time columns.
    Gosp,
    /// transaction_time-prefixed, for transaction-time range scans.
    Tgsp,
}

impl IndexOrdering {
    /// All four orderings, in the order they are created for a store.
    pub const ALL: [IndexOrdering; 4] = [
        IndexOrdering::Gspo,
        IndexOrdering::Gpos,
        IndexOrdering::Gosp,
        IndexOrdering::Tgsp,
    ];

    /// The on-disk file stem for this ordering (e.g. `"gspo"` for
    /// `gspo.tdb`).
    pub fn file_stem(self) -> &'static str {
        match self {
            IndexOrdering::Gspo => "gspo",
            IndexOrdering::Gpos => "gpos",
            IndexOrdering::Gosp => "gosp",
            IndexOrdering::Tgsp => "tgsp",
        }
    }

    /// Reorders `(graph, subject, predicate, object)` into this ordering's
    /// native four-atom column sequence. `Tgsp` has no atom-column prefix of
    /// its own (it is transaction-time-prefixed); callers reorder it the
    /// same as `Gspo` for the atom columns that follow the transaction-time
    /// prefix.
    pub fn reorder(self, g: u64, s: u64, p: u64, o: u64) -> [u64; 4] {
        match self {
            IndexOrdering::Gspo | IndexOrdering::Tgsp => [g, s, p, o],
            IndexOrdering::Gpos => [g, p, o, s],
            IndexOrdering::Gosp => [g, o, s, p],
        }
    }

    /// The index best suited to a query with the given bind pattern:
    /// subject bound → GSPO; else predicate bound → GPOS; else object
    /// bound → GOSP; else GSPO.
    pub fn select_for_pattern(subject_bound: bool, predicate_bound: bool, object_bound: bool) -> Self {
        if subject_bound {
            IndexOrdering::Gspo
        } else if predicate_bound {
            IndexOrdering::Gpos
        } else if object_bound {
            IndexOrdering::Gosp
        } else {
            IndexOrdering::Gspo
        }
    }
}

/// The mode a `QuadStore::query` call runs under, selecting which temporal
/// predicate is applied to candidate entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Entries visible "now" (`at_time` = current wall clock).
    Current,
    /// Entries visible at a specific instant.
    AsOf(i64),
    /// Entries whose valid interval overlaps `[start, end)`.
    Range {
        /// Inclusive start of the valid-time window.
        start: i64,
        /// Exclusive end of the window.
        end: i64,
    },
    /// Every version, including tombstoned ones.
    History,
    /// Entries whose `transaction_time` falls in `[start, end)`, regardless
    /// of valid-time or tombstone status. Forces `Tgsp` selection (§4.5:
    /// "for a transaction-time range query, TGSP") instead of the usual
    /// bind-pattern rule.
    TransactionRange {
        /// Inclusive start of the transaction-time window.
        start: i64,
        /// Exclusive end of the window.
        end: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpos_reorders_predicate_first_after_graph() {
        let [g, p, o, s] = IndexOrdering::Gpos.reorder(1, 2, 3, 4);
        assert_eq!((g, p, o, s), (1, 3, 4, 2));
    }

    #[test]
    fn select_prefers_subject_then_predicate_then_object() {
        assert_eq!(
            IndexOrdering::select_for_pattern(true, true, true),
            IndexOrdering::Gspo
        );
        assert_eq!(
            IndexOrdering::select_for_pattern(false, true, true),
            IndexOrdering::Gpos
        );
        assert_eq!(
            IndexOrdering::select_for_pattern(false, false, true),
            IndexOrdering::Gosp
        );
        assert_eq!(
            IndexOrdering::select_for_pattern(false, false, false),
            IndexOrdering::Gspo
        );
    }

    #[test]
    fn visibility_is_half_open() {
        let entry = TemporalQuadEntry {
            quad: Quad::new(AtomId::NIL, AtomId::new(1), AtomId::new(2), AtomId::new(3)),
            valid_from: 1000,
            valid_to: 2000,
            transaction_time: 1000,
            is_deleted: false,
            created_at: 1000,
            modified_at: 1000,
            version: 1,
        };
        assert!(!entry.visible_as_of(999));
        assert!(entry.visible_as_of(1000));
        assert!(entry.visible_as_of(1999));
        assert!(!entry.visible_as_of(2000));
    }
}
