//! The fixed 72-byte WAL record and its checksum.
//!
//! ```text
//! tx_id (8) | op (1) | _reserved (7) | graph_id (8) | s (8) | p (8) | o (8)
//! | valid_from (8) | valid_to (8) | checksum (8)
//! ```
//!
//! The checksum is a non-cryptographic integrity check intended to catch
//! torn writes and bit flips, not adversarial tampering: a prime-mixed XOR
//! over every other field.

use byteorder::{ByteOrder, LittleEndian};

use mercury_core::limits::{WAL_CHECKSUM_PRIME, WAL_RECORD_SIZE};

/// The kind of mutation a [`WalRecord`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalOp {
    /// A quad (or temporal overwrite of one) was added.
    Add,
    /// A quad was tombstoned.
    Delete,
    /// A checkpoint boundary. Carries no quad payload; its fields are zero.
    Checkpoint,
}

impl WalOp {
    fn to_byte(self) -> u8 {
        match self {
            WalOp::Add => 0,
            WalOp::Delete => 1,
            WalOp::Checkpoint => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(WalOp::Add),
            1 => Some(WalOp::Delete),
            2 => Some(WalOp::Checkpoint),
            _ => None,
        }
    }
}

/// One fixed-size WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalRecord {
    /// Transaction id this record belongs to. Monotonic within a log.
    pub tx_id: u64,
    /// What kind of mutation this record represents.
    pub op: WalOp,
    /// Graph atom id (0 = default graph).
    pub graph: u64,
    /// Subject atom id.
    pub subject: u64,
    /// Predicate atom id.
    pub predicate: u64,
    /// Object atom id.
    pub object: u64,
    /// Inclusive start of the valid-time interval, ms since epoch.
    pub valid_from: i64,
    /// Exclusive end of the valid-time interval, ms since epoch.
    pub valid_to: i64,
}

impl WalRecord {
    /// A checkpoint marker record, carrying only its `tx_id`.
    pub fn checkpoint(tx_id: u64) -> Self {
        WalRecord {
            tx_id,
            op: WalOp::Checkpoint,
            graph: 0,
            subject: 0,
            predicate: 0,
            object: 0,
            valid_from: 0,
            valid_to: 0,
        }
    }

    fn checksum(&self) -> u64 {
        let p = WAL_CHECKSUM_PRIME;
        self.tx_id
            ^ (self.op.to_byte() as u64).wrapping_mul(p)
            ^ self.graph.wrapping_mul(p)
            ^ self.subject.wrapping_mul(p)
            ^ self.predicate.wrapping_mul(p)
            ^ self.object.wrapping_mul(p)
            ^ (self.valid_from as u64).wrapping_mul(p)
            ^ (self.valid_to as u64).wrapping_mul(p)
    }

    /// Serialize into a [`WAL_RECORD_SIZE`]-byte buffer, including the
    /// trailing checksum.
    pub fn encode(&self) -> [u8; WAL_RECORD_SIZE] {
        let mut buf = [0u8; WAL_RECORD_SIZE];
        LittleEndian::write_u64(&mut buf[0..], self.tx_id);
        buf[8] = self.op.to_byte();
        // bytes 9..16 are reserved padding, left zero.
        LittleEndian::write_u64(&mut buf[16..], self.graph);
        LittleEndian::write_u64(&mut buf[24..], self.subject);
        LittleEndian::write_u64(&mut buf[32..], self.predicate);
        LittleEndian::write_u64(&mut buf[40..], self.object);
        LittleEndian::write_i64(&mut buf[48..], self.valid_from);
        LittleEndian::write_i64(&mut buf[56..], self.valid_to);
        LittleEndian::write_u64(&mut buf[64..], self.checksum());
        buf
    }

    /// Decode a record from a buffer, validating the checksum. Returns
    /// `None` on a checksum mismatch (a torn write or a zeroed/garbage
    /// region) rather than an error — callers decide what that means (tail
    /// truncation during recovery, or a hard read failure elsewhere).
    pub fn decode(buf: &[u8; WAL_RECORD_SIZE]) -> Option<Self> {
        let op = WalOp::from_byte(buf[8])?;
        let record = WalRecord {
            tx_id: LittleEndian::read_u64(&buf[0..]),
            op,
            graph: LittleEndian::read_u64(&buf[16..]),
            subject: LittleEndian::read_u64(&buf[24..]),
            predicate: LittleEndian::read_u64(&buf[32..]),
            object: LittleEndian::read_u64(&buf[40..]),
            valid_from: LittleEndian::read_i64(&buf[48..]),
            valid_to: LittleEndian::read_i64(&buf[56..]),
        };
        let stored = LittleEndian::read_u64(&buf[64..]);
        if stored == record.checksum() {
            Some(record)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(op: WalOp) -> WalRecord {
        WalRecord {
            tx_id: 42,
            op,
            graph: 1,
            subject: 2,
            predicate: 3,
            object: 4,
            valid_from: 1000,
            valid_to: i64::MAX,
        }
    }

    #[test]
    fn round_trips_every_op() {
        for op in [WalOp::Add, WalOp::Delete, WalOp::Checkpoint] {
            let record = sample(op);
            let encoded = record.encode();
            assert_eq!(WalRecord::decode(&encoded), Some(record));
        }
    }

    #[test]
    fn flipped_bit_fails_checksum() {
        let record = sample(WalOp::Add);
        let mut encoded = record.encode();
        encoded[20] ^= 0x01;
        assert_eq!(WalRecord::decode(&encoded), None);
    }

    #[test]
    fn garbage_tail_fails_checksum() {
        // A torn write: a plausible-looking header followed by bytes that
        // never got fully flushed before a crash.
        let mut buf = sample(WalOp::Add).encode();
        buf[64..].fill(0xFF);
        assert_eq!(WalRecord::decode(&buf), None);
    }

    #[test]
    fn unknown_op_byte_is_rejected() {
        let mut buf = sample(WalOp::Add).encode();
        buf[8] = 0xFF;
        assert_eq!(WalRecord::decode(&buf), None);
    }
}
