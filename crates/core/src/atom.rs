//! The [`AtomId`] type: a stable 64-bit identifier for an interned UTF-8
//! byte string.
//!
//! Atom 0 is reserved ("absent" / the default graph). The on-disk format
//! relies on this zero-sentinel convention directly (a hash bucket is empty
//! iff its `atom_id` field is zero), so [`AtomId`] stays a thin wrapper over
//! `u64` rather than `NonZeroU64` — the surface instead exposes the
//! nullability explicitly via [`AtomId::checked`] and [`AtomId::as_option`].

use std::fmt;

/// A 64-bit identifier for an interned atom. `AtomId::NIL` (value 0) denotes
/// "absent" or the default graph, depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct AtomId(u64);

impl AtomId {
    /// The reserved sentinel: absent value / default graph.
    pub const NIL: AtomId = AtomId(0);

    /// Wrap a raw id. Does not validate; use [`AtomId::checked`] at
    /// deserialization boundaries where an unexpectedly-zero id for a
    /// required column would indicate corruption.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        AtomId(raw)
    }

    /// The underlying integer.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// True if this is the nil/default-graph sentinel.
    #[inline]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }

    /// Returns `Some(self)` unless this is the nil sentinel.
    #[inline]
    pub fn checked(self) -> Option<AtomId> {
        if self.is_nil() {
            None
        } else {
            Some(self)
        }
    }

    /// Convert to the `Option<AtomId>` view used at API boundaries where
    /// "absent" is meaningful (e.g. an unbound query column), collapsing the
    /// zero sentinel into `None`.
    #[inline]
    pub fn as_option(self) -> Option<AtomId> {
        self.checked()
    }
}

impl From<u64> for AtomId {
    fn from(raw: u64) -> Self {
        AtomId(raw)
    }
}

impl From<AtomId> for u64 {
    fn from(id: AtomId) -> Self {
        id.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_zero() {
        assert_eq!(AtomId::NIL.raw(), 0);
        assert!(AtomId::NIL.is_nil());
    }

    #[test]
    fn checked_collapses_zero() {
        assert_eq!(AtomId::new(0).checked(), None);
        assert_eq!(AtomId::new(7).checked(), Some(AtomId::new(7)));
    }
}
