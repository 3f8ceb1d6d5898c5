//! The 1 KiB reserved header at the start of the `.atoms` data file.
//!
//! ```text
//! [u64 data_position][u64 next_atom_id][u64 atom_count][u64 total_bytes]
//! [u64 magic = 0x55544638_41544F4D ("UTF8ATOM")]
//! ```
//!
//! Blob records follow at offset >= 1024.

use byteorder::{ByteOrder, LittleEndian};
use mercury_core::limits::{ATOM_FILE_MAGIC, ATOM_HEADER_SIZE};

use crate::error::AtomError;

const DATA_POSITION_OFFSET: usize = 0;
const NEXT_ATOM_ID_OFFSET: usize = 8;
const ATOM_COUNT_OFFSET: usize = 16;
const TOTAL_BYTES_OFFSET: usize = 24;
const MAGIC_OFFSET: usize = 32;

/// In-memory view of the atom store's data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    /// Byte offset of the next free position in the blob file.
    pub data_position: u64,
    /// The next atom id that will be assigned.
    pub next_atom_id: u64,
    /// Number of atoms interned so far.
    pub atom_count: u64,
    /// Sum of the byte lengths of every interned atom.
    pub total_bytes: u64,
}

impl AtomHeader {
    /// A fresh header for an empty store: the blob cursor sits right after
    /// the header, and atom id 1 is the first to be assigned (0 is the nil
    /// sentinel).
    pub fn fresh() -> Self {
        AtomHeader {
            data_position: ATOM_HEADER_SIZE,
            next_atom_id: 1,
            atom_count: 0,
            total_bytes: 0,
        }
    }

    /// Serialize into a `ATOM_HEADER_SIZE`-byte buffer.
    pub fn write_to(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() as u64 >= ATOM_HEADER_SIZE);
        LittleEndian::write_u64(&mut buf[DATA_POSITION_OFFSET..], self.data_position);
        LittleEndian::write_u64(&mut buf[NEXT_ATOM_ID_OFFSET..], self.next_atom_id);
        LittleEndian::write_u64(&mut buf[ATOM_COUNT_OFFSET..], self.atom_count);
        LittleEndian::write_u64(&mut buf[TOTAL_BYTES_OFFSET..], self.total_bytes);
        LittleEndian::write_u64(&mut buf[MAGIC_OFFSET..], ATOM_FILE_MAGIC);
    }

    /// Deserialize from a buffer of at least `ATOM_HEADER_SIZE` bytes,
    /// validating the magic number.
    pub fn read_from(buf: &[u8]) -> Result<Self, AtomError> {
        debug_assert!(buf.len() as u64 >= ATOM_HEADER_SIZE);
        let magic = LittleEndian::read_u64(&buf[MAGIC_OFFSET..]);
        if magic != ATOM_FILE_MAGIC {
            return Err(AtomError::CorruptHeader {
                expected: ATOM_FILE_MAGIC,
                found: magic,
            });
        }
        Ok(AtomHeader {
            data_position: LittleEndian::read_u64(&buf[DATA_POSITION_OFFSET..]),
            next_atom_id: LittleEndian::read_u64(&buf[NEXT_ATOM_ID_OFFSET..]),
            atom_count: LittleEndian::read_u64(&buf[ATOM_COUNT_OFFSET..]),
            total_bytes: LittleEndian::read_u64(&buf[TOTAL_BYTES_OFFSET..]),
        })
    }
}
