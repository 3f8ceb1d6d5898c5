//! The write-ahead log: a single append-only file of fixed 72-byte records,
//! providing crash-safe durability for quad mutations ahead of the B+Tree
//! indexes.
//!
//! Recovery on [`WriteAheadLog::open`] scans the file from offset 0.
//! Records whose checksum fails are handled one of two ways: if nothing
//! after it also validates, it's a torn tail from a partial write at crash
//! time, and the log is silently truncated there (`CorruptTail`); if a later
//! record *does* validate, the invalid one is an interior corruption that a
//! truncation would silently discard committed data to "fix", so it is
//! surfaced as a fatal [`DurabilityError::CorruptInterior`] instead.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use mercury_core::limits::WAL_RECORD_SIZE;
use mercury_core::CheckpointPolicy;
use tracing::{instrument, warn};

use crate::error::DurabilityError;
use crate::record::{WalOp, WalRecord};

struct ActiveBatch {
    tx_id: u64,
    /// File position when `begin_batch` was called, so `rollback_batch` can
    /// truncate back to exactly this point.
    start_position: u64,
}

/// A single append-only log of fixed-size WAL records.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
    /// Next position an append will write to; always equal to the file's
    /// current length.
    position: u64,
    next_tx_id: u64,
    last_checkpoint_position: u64,
    last_checkpoint_tx_id: u64,
    bytes_since_checkpoint: u64,
    last_checkpoint_at: Instant,
    active_batch: Option<ActiveBatch>,
    /// Add/Delete records read on open whose `tx_id` exceeds the last
    /// checkpoint's, drained exactly once via `replay_uncommitted`.
    pending_replay: Vec<WalRecord>,
}

impl WriteAheadLog {
    /// Open (creating if absent) the log at `path`, replaying its recovery
    /// scan immediately.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, DurabilityError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let (scan, truncate_to) = scan_records(&bytes)?;
        if truncate_to < bytes.len() as u64 {
            warn!(
                kept_bytes = truncate_to,
                discarded_bytes = bytes.len() as u64 - truncate_to,
                "WAL tail truncated on recovery"
            );
            file.set_len(truncate_to)?;
        }
        file.seek(SeekFrom::End(0))?;

        Ok(WriteAheadLog {
            path: path.to_path_buf(),
            file,
            position: truncate_to,
            next_tx_id: scan.last_tx_id + 1,
            last_checkpoint_position: scan.last_checkpoint_position,
            last_checkpoint_tx_id: scan.last_checkpoint_tx_id,
            bytes_since_checkpoint: truncate_to.saturating_sub(scan.last_checkpoint_position),
            last_checkpoint_at: Instant::now(),
            active_batch: None,
            pending_replay: scan.pending_replay,
        })
    }

    /// The file this log is backed by.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single Add/Delete record under its own freshly assigned
    /// `tx_id`, `fsync`ing before returning. Returns the assigned `tx_id`.
    #[instrument(skip(self, graph, subject, predicate, object), fields(op = ?op))]
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        op: WalOp,
        graph: u64,
        subject: u64,
        predicate: u64,
        object: u64,
        valid_from: i64,
        valid_to: i64,
    ) -> Result<u64, DurabilityError> {
        let tx_id = self.next_tx_id;
        self.next_tx_id += 1;
        let record = WalRecord {
            tx_id,
            op,
            graph,
            subject,
            predicate,
            object,
            valid_from,
            valid_to,
        };
        self.write_record(&record)?;
        self.file.sync_data()?;
        Ok(tx_id)
    }

    /// Reserve a single `tx_id` shared by every record in the batch that
    /// follows, and remember the log's current end so a rollback can
    /// truncate back to it.
    pub fn begin_batch(&mut self) -> Result<u64, DurabilityError> {
        if let Some(active) = &self.active_batch {
            return Err(DurabilityError::BatchAlreadyOpen(active.tx_id));
        }
        let tx_id = self.next_tx_id;
        self.next_tx_id += 1;
        self.active_batch = Some(ActiveBatch {
            tx_id,
            start_position: self.position,
        });
        Ok(tx_id)
    }

    /// Append one record to the open batch, without `fsync`ing. The record
    /// is durable only if the OS happens to have flushed it by the time of
    /// a crash -- batch semantics trade per-record durability for
    /// throughput, recovered only up to `commit_batch`'s `fsync`.
    #[allow(clippy::too_many_arguments)]
    pub fn append_batch(
        &mut self,
        batch_tx_id: u64,
        op: WalOp,
        graph: u64,
        subject: u64,
        predicate: u64,
        object: u64,
        valid_from: i64,
        valid_to: i64,
    ) -> Result<(), DurabilityError> {
        self.require_active_batch(batch_tx_id)?;
        let record = WalRecord {
            tx_id: batch_tx_id,
            op,
            graph,
            subject,
            predicate,
            object,
            valid_from,
            valid_to,
        };
        self.write_record(&record)
    }

    /// `fsync` once, durably committing every record written to the batch
    /// since `begin_batch`.
    #[instrument(skip(self))]
    pub fn commit_batch(&mut self, batch_tx_id: u64) -> Result<(), DurabilityError> {
        self.require_active_batch(batch_tx_id)?;
        self.file.sync_data()?;
        self.active_batch = None;
        Ok(())
    }

    /// Discard every record written to the batch since `begin_batch` by
    /// truncating the log back to the pre-batch position. Only meaningful
    /// before the process crashes; see the facade's documented rollback
    /// asymmetry for what this means for in-memory index state.
    pub fn rollback_batch(&mut self, batch_tx_id: u64) -> Result<(), DurabilityError> {
        let active = self.require_active_batch(batch_tx_id)?;
        let start = active.start_position;
        self.file.set_len(start)?;
        self.file.seek(SeekFrom::Start(start))?;
        self.position = start;
        self.active_batch = None;
        Ok(())
    }

    /// Write a Checkpoint record, `fsync`, then truncate the log so only
    /// that record remains at offset 0. Returns the checkpoint's `tx_id`.
    #[instrument(skip(self))]
    pub fn checkpoint(&mut self) -> Result<u64, DurabilityError> {
        let tx_id = self.next_tx_id;
        self.next_tx_id += 1;
        let record = WalRecord::checkpoint(tx_id);
        let encoded = record.encode();

        // Write-then-truncate rather than truncate-then-write: the log
        // always contains either the old tail or the new single record,
        // never neither, if a crash lands between the two syscalls below.
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&encoded)?;
        self.file.sync_data()?;

        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&encoded)?;
        self.file.sync_data()?;

        self.position = WAL_RECORD_SIZE as u64;
        self.last_checkpoint_position = WAL_RECORD_SIZE as u64;
        self.last_checkpoint_tx_id = tx_id;
        self.bytes_since_checkpoint = 0;
        self.last_checkpoint_at = Instant::now();
        Ok(tx_id)
    }

    /// Whether a checkpoint is due under `policy`: the log has grown past
    /// its size threshold, or enough wall-clock time has elapsed, since the
    /// last checkpoint.
    pub fn should_checkpoint(&self, policy: &CheckpointPolicy) -> bool {
        self.bytes_since_checkpoint >= policy.size_threshold_bytes
            || self.last_checkpoint_at.elapsed() >= policy.interval
    }

    /// Drain the Add/Delete records recovered on [`WriteAheadLog::open`]
    /// whose `tx_id` exceeds the last checkpoint's. Meant to be called
    /// exactly once, immediately after open, by the facade's recovery
    /// coordination; later calls return an empty vector.
    pub fn replay_uncommitted(&mut self) -> Vec<WalRecord> {
        std::mem::take(&mut self.pending_replay)
    }

    /// Truncate the log back to a single fresh state: no records, no
    /// checkpoint watermark. Used by `QuadStore::clear`.
    pub fn clear(&mut self) -> Result<(), DurabilityError> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.position = 0;
        self.next_tx_id = 1;
        self.last_checkpoint_position = 0;
        self.last_checkpoint_tx_id = 0;
        self.bytes_since_checkpoint = 0;
        self.last_checkpoint_at = Instant::now();
        self.active_batch = None;
        self.pending_replay.clear();
        Ok(())
    }

    fn require_active_batch(&self, batch_tx_id: u64) -> Result<&ActiveBatch, DurabilityError> {
        match &self.active_batch {
            Some(active) if active.tx_id == batch_tx_id => Ok(active),
            Some(active) => Err(DurabilityError::NoSuchBatch(active.tx_id)),
            None => Err(DurabilityError::NoSuchBatch(batch_tx_id)),
        }
    }

    fn write_record(&mut self, record: &WalRecord) -> Result<(), DurabilityError> {
        self.file.seek(SeekFrom::Start(self.position))?;
        let encoded = record.encode();
        self.file.write_all(&encoded)?;
        self.position += WAL_RECORD_SIZE as u64;
        self.bytes_since_checkpoint += WAL_RECORD_SIZE as u64;
        Ok(())
    }
}

struct ScanResult {
    last_tx_id: u64,
    last_checkpoint_position: u64,
    last_checkpoint_tx_id: u64,
    pending_replay: Vec<WalRecord>,
}

/// Validate every full-size record in `bytes` from the start, returning the
/// scan summary and the byte offset the file should be truncated to (equal
/// to `bytes.len()` when nothing needed truncating).
fn scan_records(bytes: &[u8]) -> Result<(ScanResult, u64), DurabilityError> {
    let record_size = WAL_RECORD_SIZE;
    let total_len = bytes.len() as u64;
    let mut offset = 0u64;
    let mut last_tx_id = 0u64;
    let mut last_checkpoint_position = 0u64;
    let mut last_checkpoint_tx_id = 0u64;
    let mut pending_replay = Vec::new();

    while offset + record_size as u64 <= total_len {
        let chunk: [u8; WAL_RECORD_SIZE] = bytes[offset as usize..offset as usize + record_size]
            .try_into()
            .expect("slice length matches WAL_RECORD_SIZE");
        match WalRecord::decode(&chunk) {
            Some(record) => {
                last_tx_id = record.tx_id;
                offset += record_size as u64;
                match record.op {
                    WalOp::Checkpoint => {
                        last_checkpoint_position = offset;
                        last_checkpoint_tx_id = record.tx_id;
                        pending_replay.clear();
                    }
                    WalOp::Add | WalOp::Delete => pending_replay.push(record),
                }
            }
            None => {
                if later_record_is_valid(bytes, offset + record_size as u64, total_len) {
                    return Err(DurabilityError::CorruptInterior {
                        offset,
                        remaining: total_len - offset,
                    });
                }
                break;
            }
        }
    }

    let scan = ScanResult {
        last_tx_id,
        last_checkpoint_position,
        last_checkpoint_tx_id,
        pending_replay,
    };
    Ok((scan, offset))
}

fn later_record_is_valid(bytes: &[u8], mut offset: u64, total_len: u64) -> bool {
    let record_size = WAL_RECORD_SIZE as u64;
    while offset + record_size <= total_len {
        let chunk: [u8; WAL_RECORD_SIZE] = bytes[offset as usize..offset as usize + record_size as usize]
            .try_into()
            .expect("slice length matches WAL_RECORD_SIZE");
        if WalRecord::decode(&chunk).is_some() {
            return true;
        }
        offset += record_size;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn policy(size: u64, secs: u64) -> CheckpointPolicy {
        CheckpointPolicy {
            size_threshold_bytes: size,
            interval: Duration::from_secs(secs),
        }
    }

    #[test]
    fn append_then_reopen_replays_uncommitted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut wal = WriteAheadLog::open(&path).unwrap();
            wal.append(WalOp::Add, 0, 1, 2, 3, 1000, i64::MAX).unwrap();
            wal.append(WalOp::Add, 0, 4, 5, 6, 1000, i64::MAX).unwrap();
        }
        let mut wal = WriteAheadLog::open(&path).unwrap();
        let replay = wal.replay_uncommitted();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].subject, 1);
        assert_eq!(replay[1].subject, 4);
        // Second call drains nothing further.
        assert!(wal.replay_uncommitted().is_empty());
    }

    #[test]
    fn checkpoint_truncates_and_stops_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut wal = WriteAheadLog::open(&path).unwrap();
        wal.append(WalOp::Add, 0, 1, 2, 3, 1000, i64::MAX).unwrap();
        wal.checkpoint().unwrap();
        drop(wal);

        let mut wal = WriteAheadLog::open(&path).unwrap();
        assert!(wal.replay_uncommitted().is_empty());
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            WAL_RECORD_SIZE as u64
        );
    }

    #[test]
    fn batch_commit_is_durable_batch_rollback_is_not() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut wal = WriteAheadLog::open(&path).unwrap();

        let tx = wal.begin_batch().unwrap();
        wal.append_batch(tx, WalOp::Add, 0, 1, 1, 1, 1000, i64::MAX).unwrap();
        wal.append_batch(tx, WalOp::Add, 0, 2, 1, 1, 1000, i64::MAX).unwrap();
        wal.commit_batch(tx).unwrap();
        drop(wal);
        let mut wal = WriteAheadLog::open(&path).unwrap();
        assert_eq!(wal.replay_uncommitted().len(), 2);

        let tx2 = wal.begin_batch().unwrap();
        wal.append_batch(tx2, WalOp::Add, 0, 3, 1, 1, 1000, i64::MAX).unwrap();
        wal.rollback_batch(tx2).unwrap();
        drop(wal);
        let mut wal = WriteAheadLog::open(&path).unwrap();
        assert!(wal.replay_uncommitted().is_empty());
    }

    #[test]
    fn operations_on_wrong_batch_id_are_rejected() {
        let dir = tempdir().unwrap();
        let mut wal = WriteAheadLog::open(&dir.path().join("wal.log")).unwrap();
        let tx = wal.begin_batch().unwrap();
        let err = wal.commit_batch(tx + 1).unwrap_err();
        assert!(matches!(err, DurabilityError::NoSuchBatch(_)));
        wal.commit_batch(tx).unwrap();
    }

    #[test]
    fn torn_tail_is_truncated_silently() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut wal = WriteAheadLog::open(&path).unwrap();
            wal.append(WalOp::Add, 0, 1, 2, 3, 1000, i64::MAX).unwrap();
        }
        // Simulate a crash mid-write: append a partial, garbage record.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xAB; 40]).unwrap();
        drop(file);

        let mut wal = WriteAheadLog::open(&path).unwrap();
        assert_eq!(wal.replay_uncommitted().len(), 1);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            WAL_RECORD_SIZE as u64
        );
    }

    #[test]
    fn interior_corruption_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut wal = WriteAheadLog::open(&path).unwrap();
            wal.append(WalOp::Add, 0, 1, 2, 3, 1000, i64::MAX).unwrap();
            wal.append(WalOp::Add, 0, 4, 5, 6, 1000, i64::MAX).unwrap();
        }
        // Corrupt the checksum of the first record while the second stays valid.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[20] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = WriteAheadLog::open(&path).unwrap_err();
        assert!(matches!(err, DurabilityError::CorruptInterior { .. }));
    }

    #[test]
    fn should_checkpoint_on_size_or_time() {
        let dir = tempdir().unwrap();
        let mut wal = WriteAheadLog::open(&dir.path().join("wal.log")).unwrap();
        assert!(!wal.should_checkpoint(&policy(1024, 3600)));
        for i in 0..20u64 {
            wal.append(WalOp::Add, 0, i, 1, 1, 1000, i64::MAX).unwrap();
        }
        assert!(wal.should_checkpoint(&policy(64, 3600)));
        assert!(wal.should_checkpoint(&policy(u64::MAX, 0)));
    }

    #[test]
    fn clear_resets_to_fresh_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut wal = WriteAheadLog::open(&path).unwrap();
        wal.append(WalOp::Add, 0, 1, 1, 1, 1000, i64::MAX).unwrap();
        wal.checkpoint().unwrap();
        wal.clear().unwrap();
        assert_eq!(wal.position, 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        drop(wal);
        let mut reopened = WriteAheadLog::open(&path).unwrap();
        assert!(reopened.replay_uncommitted().is_empty());
    }
}
