//! Crash-safe temp directory allocation.
//!
//! A pooled store needs a directory nobody else is using, even if a prior
//! process crashed mid-allocation and left a half-initialised one behind.
//! [`allocate`] never reuses an existing path: it generates a fresh
//! candidate name and creates it with [`std::fs::create_dir`], which fails
//! on collision rather than silently adopting whatever a crashed process
//! left there, then retries with a new name. A leftover directory from a
//! killed process is simply never chosen again; it is orphaned, not
//! corrupted-and-reused.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Allocate a fresh, uniquely-named store directory under `root` (created
/// if absent).
pub fn allocate(root: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(root)?;
    loop {
        let candidate = root.join(format!("store-{}", Uuid::new_v4()));
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Remove a store directory and everything in it. Missing is not an error:
/// a directory already removed out-of-band (e.g. by a caller doing
/// post-mortem inspection during debugging, per the pool's deferred-clear
/// contract) should not fail disposal of the rest of the pool.
pub fn reclaim(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocate_creates_distinct_directories() {
        let root = tempdir().unwrap();
        let a = allocate(root.path()).unwrap();
        let b = allocate(root.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir());
        assert!(b.is_dir());
    }

    #[test]
    fn reclaim_is_idempotent() {
        let root = tempdir().unwrap();
        let dir = allocate(root.path()).unwrap();
        fs::write(dir.join("marker"), b"x").unwrap();
        reclaim(&dir).unwrap();
        assert!(!dir.exists());
        // Already gone: still Ok.
        reclaim(&dir).unwrap();
    }
}
