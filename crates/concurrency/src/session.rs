//! Scoped read/write session handles.
//!
//! A caller acquires a lock on construction and releases it on drop,
//! rather than manually pairing `lock`/`unlock` calls. [`Sessions`] wraps a
//! `parking_lot::RwLock<T>` and hands out [`ReadSession`]/[`WriteSession`]
//! guards that `Deref`/`DerefMut` to `T`; a caller cannot observe `T`
//! without holding the corresponding side of the lock, and cannot hold a
//! borrow of `T` past the guard's lifetime.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Owns a `T` behind a fair reader-writer lock and hands out scoped
/// sessions. `parking_lot::RwLock` is used over `std::sync::RwLock`
/// throughout the workspace for its smaller footprint and writer-starvation
/// resistant queueing.
pub struct Sessions<T> {
    inner: RwLock<T>,
    /// Debug-only reentrancy guard: catches same-thread double-acquisition
    /// (e.g. a caller recursively calling back into the store while already
    /// holding a session) deterministically instead of deadlocking once in
    /// a blue moon under contention. `parking_lot::RwLock` is not
    /// reentrant, so this turns a rare, hard-to-reproduce hang into an
    /// immediate, debug-only panic at the point of misuse.
    #[cfg(debug_assertions)]
    write_held: AtomicBool,
}

impl<T> Sessions<T> {
    /// Wrap `value` behind a fresh lock.
    pub fn new(value: T) -> Self {
        Sessions {
            inner: RwLock::new(value),
            #[cfg(debug_assertions)]
            write_held: AtomicBool::new(false),
        }
    }

    /// Acquire the shared side. Blocks if a writer currently holds the
    /// exclusive side.
    pub fn read_session(&self) -> ReadSession<'_, T> {
        ReadSession {
            guard: self.inner.read(),
        }
    }

    /// Acquire the exclusive side, covering the full duration of the
    /// caller's operation -- including WAL append and any index
    /// growth/remap. Blocks if any reader or writer currently holds the
    /// lock.
    pub fn write_session(&self) -> WriteSession<'_, T> {
        #[cfg(debug_assertions)]
        {
            debug_assert!(
                !self.write_held.swap(true, Ordering::AcqRel),
                "re-entrant write_session on the same Sessions<T>: a caller attempted to \
                 acquire the write side while already holding it, which parking_lot's \
                 RwLock cannot do without deadlocking"
            );
        }
        WriteSession {
            guard: self.inner.write(),
            #[cfg(debug_assertions)]
            held: &self.write_held,
        }
    }

    /// Consume the wrapper, returning the inner value. Requires no
    /// outstanding sessions, enforced by `&mut self`.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// A scoped shared-read handle. `Deref`s to `&T`.
pub struct ReadSession<'a, T> {
    guard: RwLockReadGuard<'a, T>,
}

impl<'a, T> Deref for ReadSession<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

/// A scoped exclusive-write handle. `Deref`/`DerefMut`s to `T`.
pub struct WriteSession<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    #[cfg(debug_assertions)]
    held: &'a AtomicBool,
}

impl<'a, T> Deref for WriteSession<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T> DerefMut for WriteSession<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(debug_assertions)]
impl<'a, T> Drop for WriteSession<'a, T> {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_session_mutates_read_session_observes() {
        let sessions = Sessions::new(0u32);
        {
            let mut w = sessions.write_session();
            *w += 1;
        }
        let r = sessions.read_session();
        assert_eq!(*r, 1);
    }

    #[test]
    fn concurrent_readers_do_not_block_each_other() {
        let sessions = Sessions::new(vec![1, 2, 3]);
        let a = sessions.read_session();
        let b = sessions.read_session();
        assert_eq!(a.len(), b.len());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "re-entrant write_session")]
    fn reentrant_write_session_panics_in_debug() {
        let sessions = Sessions::new(0u32);
        let _outer = sessions.write_session();
        // A recursive call on the same thread would deadlock under
        // parking_lot; the debug assertion turns that into a clear panic.
        std::mem::forget(sessions.write_session());
    }
}
