//! The bitemporal composite key and its physical orderings.
//!
//! Every [`crate::index::QuadIndex`] is keyed by the same seven-column
//! tuple — the four atom columns reordered per [`IndexOrdering`], followed by
//! `valid_from`, `valid_to`, `transaction_time` as tie-breakers — compared
//! lexicographically. `Tgsp` moves `transaction_time` to the front instead of
//! appending it at the back, which is what makes it suited to
//! transaction-time range scans: a bounded prefix on column 0 alone selects
//! the whole window.

use mercury_core::{AtomId, IndexOrdering, Quad, TemporalQuadEntry};

/// A fully-ordered composite key: seven columns, compared lexicographically.
pub type CompositeKey = [i64; 7];

/// The four atom columns of `key` in this ordering's native sequence,
/// skipping the `transaction_time` prefix column for [`IndexOrdering::Tgsp`].
/// Two keys under the same ordering have equal `atom_prefix` iff they encode
/// the same logical quad, which is what the temporal-overwrite check in
/// `QuadIndex::insert` compares.
pub fn atom_prefix(ordering: IndexOrdering, key: &CompositeKey) -> [i64; 4] {
    match ordering {
        IndexOrdering::Tgsp => [key[1], key[2], key[3], key[4]],
        _ => [key[0], key[1], key[2], key[3]],
    }
}

/// Index of the `valid_to` column within `key` for this ordering.
pub fn valid_to_index(ordering: IndexOrdering) -> usize {
    match ordering {
        IndexOrdering::Tgsp => 6,
        _ => 5,
    }
}

/// Index of the `valid_from` column within `key` for this ordering.
pub fn valid_from_index(ordering: IndexOrdering) -> usize {
    match ordering {
        IndexOrdering::Tgsp => 5,
        _ => 4,
    }
}

/// Recover the logical quad and bitemporal columns encoded in `key`, undoing
/// the ordering's column reordering.
pub fn decompose(ordering: IndexOrdering, key: &CompositeKey) -> (Quad, i64, i64, i64) {
    let (g, s, p, o, valid_from, valid_to, tx) = match ordering {
        IndexOrdering::Gspo => (key[0], key[1], key[2], key[3], key[4], key[5], key[6]),
        IndexOrdering::Gpos => (key[0], key[3], key[1], key[2], key[4], key[5], key[6]),
        IndexOrdering::Gosp => (key[0], key[2], key[3], key[1], key[4], key[5], key[6]),
        IndexOrdering::Tgsp => (key[1], key[2], key[3], key[4], key[5], key[6], key[0]),
    };
    let quad = Quad::new(
        AtomId::new(g as u64),
        AtomId::new(s as u64),
        AtomId::new(p as u64),
        AtomId::new(o as u64),
    );
    (quad, valid_from, valid_to, tx)
}

/// Build the composite key for `entry` under `ordering`.
pub fn composite_key(ordering: IndexOrdering, entry: &TemporalQuadEntry) -> CompositeKey {
    let g = entry.quad.graph.raw() as i64;
    let s = entry.quad.subject.raw() as i64;
    let p = entry.quad.predicate.raw() as i64;
    let o = entry.quad.object.raw() as i64;
    match ordering {
        IndexOrdering::Gspo => [g, s, p, o, entry.valid_from, entry.valid_to, entry.transaction_time],
        IndexOrdering::Gpos => [g, p, o, s, entry.valid_from, entry.valid_to, entry.transaction_time],
        IndexOrdering::Gosp => [g, o, s, p, entry.valid_from, entry.valid_to, entry.transaction_time],
        IndexOrdering::Tgsp => [entry.transaction_time, g, s, p, o, entry.valid_from, entry.valid_to],
    }
}

/// Build a search key for a bind pattern with optional columns, using
/// `low`/`high` to fill in unbound positions for a prefix scan. Time columns
/// default to the half-open window `[time_low, time_high)`.
#[allow(clippy::too_many_arguments)]
pub fn bound_key(
    ordering: IndexOrdering,
    graph: Option<u64>,
    subject: Option<u64>,
    predicate: Option<u64>,
    object: Option<u64>,
    low: i64,
    high: i64,
    time_low: i64,
    time_high: i64,
) -> (CompositeKey, CompositeKey) {
    let g_lo = graph.map(|v| v as i64).unwrap_or(low);
    let g_hi = graph.map(|v| v as i64).unwrap_or(high);
    let s_lo = subject.map(|v| v as i64).unwrap_or(low);
    let s_hi = subject.map(|v| v as i64).unwrap_or(high);
    let p_lo = predicate.map(|v| v as i64).unwrap_or(low);
    let p_hi = predicate.map(|v| v as i64).unwrap_or(high);
    let o_lo = object.map(|v| v as i64).unwrap_or(low);
    let o_hi = object.map(|v| v as i64).unwrap_or(high);

    let reorder = |g: i64, s: i64, p: i64, o: i64| -> [i64; 4] {
        let [a, b, c, d] = ordering.reorder(g as u64, s as u64, p as u64, o as u64);
        [a as i64, b as i64, c as i64, d as i64]
    };

    let lo4 = reorder(g_lo, s_lo, p_lo, o_lo);
    let hi4 = reorder(g_hi, s_hi, p_hi, o_hi);

    match ordering {
        IndexOrdering::Tgsp => (
            [time_low, lo4[0], lo4[1], lo4[2], lo4[3], low, low],
            [time_high, hi4[0], hi4[1], hi4[2], hi4[3], high, high],
        ),
        _ => (
            [lo4[0], lo4[1], lo4[2], lo4[3], time_low, low, low],
            [hi4[0], hi4[1], hi4[2], hi4[3], time_high, high, high],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercury_core::{AtomId, Quad};

    fn entry(g: u64, s: u64, p: u64, o: u64, vf: i64, vt: i64, tt: i64) -> TemporalQuadEntry {
        TemporalQuadEntry {
            quad: Quad::new(AtomId::new(g), AtomId::new(s), AtomId::new(p), AtomId::new(o)),
            valid_from: vf,
            valid_to: vt,
            transaction_time: tt,
            is_deleted: false,
            created_at: tt,
            modified_at: tt,
            version: 1,
        }
    }

    #[test]
    fn gspo_orders_graph_first() {
        let e = entry(1, 2, 3, 4, 10, 20, 30);
        assert_eq!(composite_key(IndexOrdering::Gspo, &e), [1, 2, 3, 4, 10, 20, 30]);
    }

    #[test]
    fn tgsp_prefixes_transaction_time() {
        let e = entry(1, 2, 3, 4, 10, 20, 30);
        assert_eq!(composite_key(IndexOrdering::Tgsp, &e), [30, 1, 2, 3, 4, 10, 20]);
    }

    #[test]
    fn gpos_matches_reorder() {
        let e = entry(1, 2, 3, 4, 10, 20, 30);
        assert_eq!(composite_key(IndexOrdering::Gpos, &e), [1, 3, 4, 2, 10, 20, 30]);
    }

    #[test]
    fn decompose_inverts_composite_key_for_every_ordering() {
        let e = entry(1, 2, 3, 4, 10, 20, 30);
        for ordering in IndexOrdering::ALL {
            let key = composite_key(ordering, &e);
            let (quad, vf, vt, tx) = decompose(ordering, &key);
            assert_eq!(quad, e.quad, "ordering {ordering:?}");
            assert_eq!((vf, vt, tx), (e.valid_from, e.valid_to, e.transaction_time));
        }
    }

    #[test]
    fn atom_prefix_ignores_time_columns_and_distinguishes_quads() {
        let a = entry(1, 2, 3, 4, 10, 20, 30);
        let b = entry(1, 2, 3, 4, 999, 999, 999);
        let c = entry(1, 2, 3, 5, 10, 20, 30);
        for ordering in IndexOrdering::ALL {
            let ka = composite_key(ordering, &a);
            let kb = composite_key(ordering, &b);
            let kc = composite_key(ordering, &c);
            assert_eq!(atom_prefix(ordering, &ka), atom_prefix(ordering, &kb));
            assert_ne!(atom_prefix(ordering, &ka), atom_prefix(ordering, &kc));
        }
    }
}
