//! The optional machine-wide cross-process gate.
//!
//! Several test-runner processes on the same machine may each open their
//! own pool; without a shared bound, their disk budgets (each computed
//! independently from the same free-space figure) can oversubscribe the
//! volume in aggregate. The gate adds a second, machine-wide bound: a fixed
//! set of advisory lock files under a directory keyed by a stable machine
//! identifier, so any pool on the machine with the gate enabled competes
//! for the same slots regardless of which process or root directory it
//! belongs to. A portable advisory lock file per slot, in the style of the
//! `try_lock_exclusive` guard a single-writer store takes over its own
//! directory, rather than a kernel semaphore or shared-memory counter.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::PoolError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A claimed slot in the gate. The advisory lock is released when this
/// drops (closing the file descriptor clears an `flock`-style lock), so a
/// crashed holder's slot becomes available to the next acquirer without
/// any explicit cleanup.
pub struct GateSlot {
    _file: File,
    index: usize,
}

impl GateSlot {
    /// Which of the gate's fixed slots this handle holds, for diagnostics.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A fixed-size, machine-wide set of advisory-locked slot files.
pub struct CrossProcessGate {
    dir: PathBuf,
    slot_count: usize,
}

impl CrossProcessGate {
    /// Open (creating if absent) the gate directory for this machine,
    /// sized to `slot_count` concurrent holders.
    pub fn open(slot_count: usize) -> io::Result<Self> {
        let dir = std::env::temp_dir().join("mercury-pool-gate").join(machine_id());
        fs::create_dir_all(&dir)?;
        Ok(CrossProcessGate {
            dir,
            slot_count: slot_count.max(1),
        })
    }

    /// Try every slot in turn, retrying until any one is free or `timeout`
    /// elapses.
    pub fn acquire(&self, timeout: Duration) -> Result<GateSlot, PoolError> {
        let deadline = Instant::now() + timeout;
        loop {
            for index in 0..self.slot_count {
                let path = self.dir.join(format!("slot-{index}.lock"));
                let file = OpenOptions::new().create(true).read(true).write(true).open(&path)?;
                if file.try_lock_exclusive().is_ok() {
                    return Ok(GateSlot { _file: file, index });
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PoolError::Timeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

/// A stable-enough machine identifier. Falls back to a fixed constant on
/// hosts without either well-known machine-id file, which just means every
/// pool on such a host shares one gate directory -- still correct, only
/// less precise if the host is itself a container sharing a kernel with
/// others that also lack the file.
fn machine_id() -> String {
    for candidate in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(contents) = fs::read_to_string(candidate) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_with_root(root: &Path, slot_count: usize) -> CrossProcessGate {
        CrossProcessGate {
            dir: root.to_path_buf(),
            slot_count,
        }
    }

    #[test]
    fn single_slot_serialises_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate_with_root(dir.path(), 1);
        let first = gate.acquire(Duration::from_millis(100)).unwrap();
        let err = gate.acquire(Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));
        drop(first);
        assert!(gate.acquire(Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn distinct_slots_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate_with_root(dir.path(), 2);
        let a = gate.acquire(Duration::from_millis(100)).unwrap();
        let b = gate.acquire(Duration::from_millis(100)).unwrap();
        assert_ne!(a.index(), b.index());
    }
}
