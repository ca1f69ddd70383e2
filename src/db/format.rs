//! Binary database format constants and structures.
//!
//! All multi-byte integers are little-endian, unsigned.

use crate::{Error, Result};

/// Super block length in bytes: two u32 file offsets.
pub const SUPER_BLOCK_LEN: usize = 8;

/// Fixed capacity of the checkpoint (sparse index) region in bytes.
///
/// Shared by builder and reader; the checkpoint interval is derived from it
/// so the two sides can never disagree on page geometry.
pub const HEADER_CAPACITY: usize = 16384;

/// Checkpoint entry length: {start_ip u32, index_ptr u32}.
pub const CHECKPOINT_ENTRY_LEN: usize = 8;

/// Index entry length: {start_ip u32, end_ip u32, packed ptr/len u32}.
pub const INDEX_ENTRY_LEN: usize = 12;

/// File offset where the data region begins.
pub const DATA_REGION_START: usize = SUPER_BLOCK_LEN + HEADER_CAPACITY;

/// Index entries per checkpoint page, leaving one entry of slack so a page
/// bulk-read can always include its closing boundary entry.
pub const CHECKPOINT_INTERVAL: usize = HEADER_CAPACITY / INDEX_ENTRY_LEN - 1;

/// Exclusive ceiling for a data block pointer (24-bit field).
pub const MAX_DATA_PTR: u32 = 1 << 24;

/// Maximum encoded data block length (8-bit field).
pub const MAX_DATA_LEN: usize = 255;

/// Read a little-endian u32 at `offset`. Caller guarantees bounds.
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// File-level pointer pair delimiting the index region.
///
/// `first_index_ptr` is the offset of the first index entry,
/// `last_index_ptr` the offset of the final one (not one past it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub first_index_ptr: u32,
    pub last_index_ptr: u32,
}

impl SuperBlock {
    pub fn to_bytes(&self) -> [u8; SUPER_BLOCK_LEN] {
        let mut b = [0u8; SUPER_BLOCK_LEN];
        b[0..4].copy_from_slice(&self.first_index_ptr.to_le_bytes());
        b[4..8].copy_from_slice(&self.last_index_ptr.to_le_bytes());
        b
    }

    pub fn from_bytes(b: &[u8; SUPER_BLOCK_LEN]) -> Self {
        Self {
            first_index_ptr: read_u32(b, 0),
            last_index_ptr: read_u32(b, 4),
        }
    }

    /// Sanity-check the pointers against the backing file length.
    pub fn validate(&self, file_len: u64) -> Result<()> {
        let first = self.first_index_ptr as u64;
        let last = self.last_index_ptr as u64;
        if first < DATA_REGION_START as u64 {
            return Err(Error::InvalidSuperBlock(format!(
                "first index pointer {} overlaps the header region",
                first
            )));
        }
        if last < first {
            return Err(Error::InvalidSuperBlock(format!(
                "last index pointer {} precedes first {}",
                last, first
            )));
        }
        if (last - first) % INDEX_ENTRY_LEN as u64 != 0 {
            return Err(Error::InvalidSuperBlock(format!(
                "index span {} is not a multiple of the entry width",
                last - first
            )));
        }
        if last + INDEX_ENTRY_LEN as u64 > file_len {
            return Err(Error::InvalidSuperBlock(format!(
                "index region ends past the file ({} > {})",
                last + INDEX_ENTRY_LEN as u64,
                file_len
            )));
        }
        Ok(())
    }

    /// Number of index entries delimited by this super block.
    pub fn total_entries(&self) -> u32 {
        (self.last_index_ptr - self.first_index_ptr) / INDEX_ENTRY_LEN as u32 + 1
    }
}

/// Fixed-width index entry mapping one IP range to its data block.
///
/// The pointer and length live in separate fields here; the 24/8-bit packing
/// happens only in `to_bytes`/`from_bytes` so range violations surface as
/// errors instead of silent truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub start_ip: u32,
    pub end_ip: u32,
    pub data_ptr: u32,
    pub data_len: u8,
}

impl IndexEntry {
    pub fn to_bytes(&self) -> Result<[u8; INDEX_ENTRY_LEN]> {
        if self.data_ptr >= MAX_DATA_PTR {
            return Err(Error::DataRegionFull {
                offset: self.data_ptr as u64,
            });
        }
        let packed = self.data_ptr | ((self.data_len as u32) << 24);
        let mut b = [0u8; INDEX_ENTRY_LEN];
        b[0..4].copy_from_slice(&self.start_ip.to_le_bytes());
        b[4..8].copy_from_slice(&self.end_ip.to_le_bytes());
        b[8..12].copy_from_slice(&packed.to_le_bytes());
        Ok(b)
    }

    /// Decode one entry from `buf` at `offset`. Caller guarantees bounds.
    pub fn from_bytes(buf: &[u8], offset: usize) -> Self {
        let packed = read_u32(buf, offset + 8);
        Self {
            start_ip: read_u32(buf, offset),
            end_ip: read_u32(buf, offset + 4),
            data_ptr: packed & 0x00FF_FFFF,
            data_len: (packed >> 24) as u8,
        }
    }

    /// Whether this entry's range contains `ordinal`.
    pub fn contains(&self, ordinal: u32) -> bool {
        self.start_ip <= ordinal && ordinal <= self.end_ip
    }
}

/// Sparse-index entry: the start IP of an index page and its file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub start_ip: u32,
    pub index_ptr: u32,
}

impl CheckpointEntry {
    pub fn to_bytes(&self) -> [u8; CHECKPOINT_ENTRY_LEN] {
        let mut b = [0u8; CHECKPOINT_ENTRY_LEN];
        b[0..4].copy_from_slice(&self.start_ip.to_le_bytes());
        b[4..8].copy_from_slice(&self.index_ptr.to_le_bytes());
        b
    }

    /// Decode one entry from `buf` at `offset`. Caller guarantees bounds.
    pub fn from_bytes(buf: &[u8], offset: usize) -> Self {
        Self {
            start_ip: read_u32(buf, offset),
            index_ptr: read_u32(buf, offset + 4),
        }
    }

    /// A zero pointer marks the unused tail of the checkpoint region; no
    /// real checkpoint can point at offset 0 (the super block lives there).
    pub fn is_sentinel(&self) -> bool {
        self.index_ptr == 0
    }
}
