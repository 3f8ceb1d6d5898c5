//! The bounded recycling pool.
//!
//! Test suites and bulk-load jobs that repeatedly need a fresh, empty
//! store pay the full four-index-plus-WAL creation cost every time unless
//! they reuse one. `QuadStorePool` amortises that cost: it keeps a bounded
//! set of store directories alive and recycles them via the cheap
//! `QuadStore::clear()` in lieu of delete-and-recreate.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{info, instrument, warn};

use mercury_core::MercuryConfig;
use mercury_engine::QuadStore;

use crate::error::{PoolError, Result};
use crate::gate::{CrossProcessGate, GateSlot};
use crate::temp_path;

struct Entry {
    dir: PathBuf,
    store: QuadStore,
}

struct PoolState {
    idle: Vec<Entry>,
    checked_out: usize,
    /// Total stores ever created, bounded by `max_stores`. Distinct from
    /// `idle.len() + checked_out` only during the brief window a fresh
    /// store is being created or disposed outside the lock.
    created: usize,
}

/// A bounded pool of recyclable `QuadStore` instances rooted at one temp
/// directory.
pub struct QuadStorePool {
    root: PathBuf,
    store_config: MercuryConfig,
    max_stores: usize,
    gate: Option<CrossProcessGate>,
    gate_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
    disposed: AtomicBool,
}

impl QuadStorePool {
    /// Open a pool rooted at `root` (created if absent). Sizing follows the
    /// spec's default: `min(cpu_count, disk_budget / estimated_store_size)`,
    /// where `disk_budget` is `store_config.pool.disk_budget_fraction` of
    /// the free space currently available on `root`'s volume.
    /// `estimated_store_size` is the caller's estimate of one store's
    /// on-disk footprint once its indexes, atom store, and WAL have grown
    /// to a typical working size.
    pub fn open(root: &Path, store_config: MercuryConfig, estimated_store_size: u64) -> Result<Self> {
        let max_stores = compute_max_stores(&store_config, root, estimated_store_size)?;
        Self::open_with_bound(root, store_config, max_stores)
    }

    /// Like [`QuadStorePool::open`], but with an explicit bound instead of
    /// the cpu/disk-derived default. Useful for tests and for callers that
    /// already know the concurrency ceiling they want.
    pub fn open_with_bound(root: &Path, store_config: MercuryConfig, max_stores: usize) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let max_stores = max_stores.max(1);
        let gate = if store_config.pool.cross_process_gate {
            Some(CrossProcessGate::open(max_stores)?)
        } else {
            None
        };
        info!(max_stores, gate = gate.is_some(), root = %root.display(), "pool opened");
        Ok(QuadStorePool {
            root: root.to_path_buf(),
            gate_timeout: store_config.pool.gate_timeout,
            store_config,
            max_stores,
            gate,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                checked_out: 0,
                created: 0,
            }),
            available: Condvar::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// The bound this pool is operating under.
    pub fn max_stores(&self) -> usize {
        self.max_stores
    }

    fn check_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(PoolError::Disposed);
        }
        Ok(())
    }

    /// Rent a store, blocking until one is available: an idle store to
    /// recycle, or room under `max_stores` to create a fresh one. The
    /// returned handle is cleared before being handed back, so it always
    /// satisfies the "fresh empty store" postcondition regardless of what
    /// the previous renter left in it.
    #[instrument(skip(self))]
    pub fn rent(&self) -> Result<RentedStore<'_>> {
        self.check_disposed()?;
        let gate_slot = match &self.gate {
            Some(gate) => Some(gate.acquire(self.gate_timeout)?),
            None => None,
        };

        let entry = self.acquire_entry()?;
        if let Err(e) = entry.store.clear() {
            // The store is unusable; give its slot back so other waiters
            // aren't starved by one bad rental, then surface the error.
            self.reclaim_entry(entry);
            return Err(e.into());
        }

        Ok(RentedStore {
            pool: self,
            entry: Some(entry),
            gate_slot,
            released: false,
        })
    }

    /// Claim either an idle entry or room to create a fresh one, blocking
    /// on `available` otherwise. `created` and `checked_out` are reserved
    /// atomically under the lock before any file I/O happens, so two
    /// concurrent rents can never together create more than `max_stores`
    /// stores.
    fn acquire_entry(&self) -> Result<Entry> {
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = state.idle.pop() {
                state.checked_out += 1;
                return Ok(entry);
            }
            if state.created < self.max_stores {
                state.created += 1;
                state.checked_out += 1;
                drop(state);
                return self.create_entry().map_err(|e| {
                    let mut state = self.state.lock();
                    state.created -= 1;
                    state.checked_out -= 1;
                    drop(state);
                    self.available.notify_one();
                    e
                });
            }
            self.available.wait(&mut state);
        }
    }

    fn create_entry(&self) -> Result<Entry> {
        let dir = temp_path::allocate(&self.root)?;
        let store = QuadStore::open(&dir, self.store_config.clone())?;
        Ok(Entry { dir, store })
    }

    /// An RAII wrapper over [`QuadStorePool::rent`]: the returned handle is
    /// already a scoped guard (it returns itself to the pool on drop), kept
    /// as a separate name so call sites can make the scoping intent
    /// explicit alongside `rent` / `return_store`.
    pub fn scoped_rent(&self) -> Result<RentedStore<'_>> {
        self.rent()
    }

    /// Return a rented store early. Equivalent to dropping the handle;
    /// provided for callers that want to release a store before the end of
    /// its enclosing scope.
    pub fn return_store(&self, handle: RentedStore<'_>) -> Result<()> {
        handle.release()
    }

    fn reclaim_entry(&self, entry: Entry) {
        let mut state = self.state.lock();
        state.checked_out -= 1;
        state.idle.push(entry);
        drop(state);
        self.available.notify_one();
    }

    /// Checkpoint and close every idle store this pool holds, and remove
    /// every temp directory it created. Idempotent. A pool disposed while
    /// rentals are still checked out logs a warning and leaks those
    /// directories -- `dispose` is a teardown operation, not a mid-use one.
    #[instrument(skip(self))]
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut state = self.state.lock();
        if state.checked_out > 0 {
            warn!(checked_out = state.checked_out, "disposing pool with outstanding rentals");
        }
        for entry in state.idle.drain(..) {
            entry.store.dispose()?;
            temp_path::reclaim(&entry.dir)?;
        }
        Ok(())
    }
}

/// An RAII handle to a rented `QuadStore`. Returns the store to its pool on
/// drop (or via the explicit [`RentedStore::release`] /
/// [`QuadStorePool::return_store`]), mirroring the `BatchSession` pattern
/// in `mercury-engine`: a caller who panics or simply forgets to return the
/// store explicitly still can't leak its slot.
pub struct RentedStore<'a> {
    pool: &'a QuadStorePool,
    entry: Option<Entry>,
    gate_slot: Option<GateSlot>,
    released: bool,
}

impl<'a> RentedStore<'a> {
    /// The directory this rental is rooted at.
    pub fn path(&self) -> &Path {
        &self.entry.as_ref().expect("entry present until release").dir
    }

    /// Explicitly return this rental to the pool.
    pub fn release(mut self) -> Result<()> {
        self.release_inner();
        Ok(())
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(entry) = self.entry.take() {
            self.pool.reclaim_entry(entry);
        }
        // `self.gate_slot` drops here if present, releasing the
        // cross-process gate slot.
    }
}

impl<'a> Deref for RentedStore<'a> {
    type Target = QuadStore;
    fn deref(&self) -> &QuadStore {
        &self.entry.as_ref().expect("entry present until release").store
    }
}

impl<'a> Drop for RentedStore<'a> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn compute_max_stores(config: &MercuryConfig, root: &Path, estimated_store_size: u64) -> Result<usize> {
    std::fs::create_dir_all(root)?;
    let cpu_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let free_bytes = fs2::available_space(root)?;
    let budget_bytes = (free_bytes as f64 * config.pool.disk_budget_fraction) as u64;
    let by_disk = (budget_bytes / estimated_store_size.max(1)).max(1) as usize;
    Ok(cpu_count.min(by_disk).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn config() -> MercuryConfig {
        MercuryConfig::for_testing()
    }

    #[test]
    fn rent_creates_up_to_bound_then_reuses() {
        let dir = tempdir().unwrap();
        let pool = QuadStorePool::open_with_bound(dir.path(), config(), 2).unwrap();

        let a = pool.rent().unwrap();
        let b = pool.rent().unwrap();
        assert_ne!(a.path(), b.path());
        drop(a);
        drop(b);

        let c = pool.rent().unwrap();
        // The third rental must reuse one of the two directories already
        // created, not allocate a third.
        let created_dirs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .collect();
        assert_eq!(created_dirs.len(), 2);
        drop(c);
    }

    #[test]
    fn rented_store_is_fresh_and_empty() {
        let dir = tempdir().unwrap();
        let pool = QuadStorePool::open_with_bound(dir.path(), config(), 1).unwrap();

        {
            let rented = pool.rent().unwrap();
            rented.add_current("", "a", "p", "1").unwrap();
        }
        let rented = pool.rent().unwrap();
        let rows: Vec<_> = rented
            .query_current(None, None, None, None)
            .unwrap()
            .collect::<mercury_engine::Result<Vec<_>>>()
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn pool_bound_serialises_a_third_concurrent_rental() {
        let dir = tempdir().unwrap();
        let pool = Arc::new(QuadStorePool::open_with_bound(dir.path(), config(), 2).unwrap());

        let a = pool.rent().unwrap();
        let b = pool.rent().unwrap();

        let pool2 = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            // Blocks until one of the two outstanding rentals returns.
            let _c = pool2.rent().unwrap();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        drop(a);
        handle.join().unwrap();
        drop(b);
    }

    #[test]
    fn explicit_return_store_releases_the_slot() {
        let dir = tempdir().unwrap();
        let pool = QuadStorePool::open_with_bound(dir.path(), config(), 1).unwrap();
        let rented = pool.rent().unwrap();
        pool.return_store(rented).unwrap();
        assert!(pool.rent().is_ok());
    }

    #[test]
    fn dispose_closes_idle_stores_and_removes_directories() {
        let dir = tempdir().unwrap();
        let pool = QuadStorePool::open_with_bound(dir.path(), config(), 2).unwrap();
        let rented = pool.rent().unwrap();
        let path = rented.path().to_path_buf();
        drop(rented);

        pool.dispose().unwrap();
        assert!(!path.exists());
        assert!(matches!(pool.rent().unwrap_err(), PoolError::Disposed));
        // Idempotent.
        assert!(pool.dispose().is_ok());
    }
}
