//! Database reader with three interchangeable lookup strategies.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::format::*;
use crate::record::Region;
use crate::{ip, Error, Result};

/// Lookup strategy, chosen when the reader is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Materialize the whole file in memory on first lookup; every probe is
    /// a slice read. Fastest, costs the full file size in memory.
    Memory,
    /// Binary search straight against the file handle: one seek + 12-byte
    /// read per probe. Minimal memory, log2(n) seeks per lookup.
    File,
    /// Two-level search: the checkpoint region is cached on first use and
    /// narrows each lookup to one page-sized bulk read.
    Btree,
}

/// Reader over one built database file.
///
/// Concurrent lookups against a shared instance are safe in every mode: the
/// lazily populated caches are one-shot cells and file-handle strategies
/// treat each lookup as a critical section so seeks cannot interleave.
///
/// A failed lookup leaves the reader usable; only an IO error suggests the
/// underlying file needs reopening. Closing is dropping.
pub struct DbReader {
    path: PathBuf,
    file: Mutex<File>,
    file_len: u64,
    mode: SearchMode,
    super_block: SuperBlock,
    /// Memory mode: the whole file image, populated at most once.
    image: OnceCell<Vec<u8>>,
    /// Btree mode: the parsed checkpoint array, populated at most once.
    checkpoints: OnceCell<Vec<CheckpointEntry>>,
}

impl DbReader {
    /// Open a database file with the given lookup strategy.
    ///
    /// The super block is read and validated eagerly so a truncated or
    /// garbage file fails here rather than on the first lookup.
    pub fn open(path: impl AsRef<Path>, mode: SearchMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        let mut raw = [0u8; SUPER_BLOCK_LEN];
        file.read_exact(&mut raw).map_err(|_| {
            Error::InvalidSuperBlock(format!("file too short: {} bytes", file_len))
        })?;
        let super_block = SuperBlock::from_bytes(&raw);
        super_block.validate(file_len)?;

        log::debug!(
            "opened {:?}: {} index entries, mode {:?}",
            path,
            super_block.total_entries(),
            mode
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            file_len,
            mode,
            super_block,
            image: OnceCell::new(),
            checkpoints: OnceCell::new(),
        })
    }

    /// The strategy this reader was opened with.
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Number of index entries in the database.
    pub fn total_entries(&self) -> u32 {
        self.super_block.total_entries()
    }

    /// Look up the attribution record covering `ip_text`.
    pub fn lookup(&self, ip_text: &str) -> Result<Region> {
        let ordinal = ip::parse(ip_text)?;
        match self.mode {
            SearchMode::Memory => self.memory_lookup(ordinal),
            SearchMode::File => self.file_lookup(ordinal),
            SearchMode::Btree => self.btree_lookup(ordinal),
        }
    }

    fn memory_lookup(&self, ordinal: u32) -> Result<Region> {
        let image = self
            .image
            .get_or_try_init(|| -> Result<Vec<u8>> { Ok(std::fs::read(&self.path)?) })?;

        let base = self.super_block.first_index_ptr as usize;
        let count = self.super_block.total_entries() as usize;
        if base + count * INDEX_ENTRY_LEN > image.len() {
            return Err(Error::Corrupt(
                "index region ends past the loaded image".to_string(),
            ));
        }

        let (data_ptr, data_len) = search_entries(image, base, count, ordinal)
            .ok_or_else(|| Error::NotFound(ip::format(ordinal)))?;

        let start = data_ptr as usize;
        let end = start + data_len as usize;
        if end > image.len() {
            return Err(Error::Corrupt(format!(
                "data block {}+{} ends past the file",
                data_ptr, data_len
            )));
        }
        Ok(Region::decode(&image[start..end]))
    }

    fn file_lookup(&self, ordinal: u32) -> Result<Region> {
        // One lookup's seek sequence is a critical section.
        let mut file = self.file.lock();

        let first = self.super_block.first_index_ptr as u64;
        let mut low: i64 = 0;
        let mut high: i64 = self.super_block.total_entries() as i64 - 1;
        let mut found: Option<(u32, u8)> = None;
        let mut raw = [0u8; INDEX_ENTRY_LEN];

        while low <= high {
            let mid = (low + high) >> 1;
            file.seek(SeekFrom::Start(first + mid as u64 * INDEX_ENTRY_LEN as u64))?;
            file.read_exact(&mut raw)?;
            let entry = IndexEntry::from_bytes(&raw, 0);
            if ordinal < entry.start_ip {
                high = mid - 1;
            } else if ordinal > entry.end_ip {
                low = mid + 1;
            } else {
                found = Some((entry.data_ptr, entry.data_len));
                break;
            }
        }

        let (data_ptr, data_len) =
            found.ok_or_else(|| Error::NotFound(ip::format(ordinal)))?;
        self.read_data_block(&mut file, data_ptr, data_len)
    }

    fn btree_lookup(&self, ordinal: u32) -> Result<Region> {
        let checkpoints = self
            .checkpoints
            .get_or_try_init(|| self.load_checkpoints())?;
        if checkpoints.is_empty() {
            return Err(Error::NotFound(ip::format(ordinal)));
        }

        // Bounding checkpoint pair: the page starting at or before the
        // target and the checkpoint closing it. Past-the-last targets fall
        // into the final page, which the entry of slack below still covers.
        let after = checkpoints.partition_point(|cp| cp.start_ip <= ordinal);
        let lo = after
            .saturating_sub(1)
            .min(checkpoints.len().saturating_sub(2));
        let hi = (lo + 1).min(checkpoints.len() - 1);
        let sptr = checkpoints[lo].index_ptr as u64;
        let eptr = checkpoints[hi].index_ptr as u64;
        let index_end = self.super_block.last_index_ptr as u64 + INDEX_ENTRY_LEN as u64;
        if sptr < self.super_block.first_index_ptr as u64 || sptr > eptr || eptr > index_end {
            return Err(Error::Corrupt(format!(
                "checkpoint window {}..{} out of bounds",
                sptr, eptr
            )));
        }

        // Bulk-read the page plus one entry of slack for its closing
        // boundary, clamped so the trailing signature is never scanned.
        let span = ((eptr + INDEX_ENTRY_LEN as u64).min(index_end) - sptr) as usize;
        let mut page = vec![0u8; span];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(sptr))?;
            file.read_exact(&mut page)?;
        }

        let count = page.len() / INDEX_ENTRY_LEN;
        let (data_ptr, data_len) = search_entries(&page, 0, count, ordinal)
            .ok_or_else(|| Error::NotFound(ip::format(ordinal)))?;

        let mut file = self.file.lock();
        self.read_data_block(&mut file, data_ptr, data_len)
    }

    fn load_checkpoints(&self) -> Result<Vec<CheckpointEntry>> {
        let mut raw = vec![0u8; HEADER_CAPACITY];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(SUPER_BLOCK_LEN as u64))?;
            file.read_exact(&mut raw)?;
        }

        let mut checkpoints = Vec::new();
        for offset in (0..HEADER_CAPACITY).step_by(CHECKPOINT_ENTRY_LEN) {
            let cp = CheckpointEntry::from_bytes(&raw, offset);
            if cp.is_sentinel() {
                break;
            }
            checkpoints.push(cp);
        }
        log::debug!("cached {} checkpoints", checkpoints.len());
        Ok(checkpoints)
    }

    fn read_data_block(&self, file: &mut File, data_ptr: u32, data_len: u8) -> Result<Region> {
        if data_ptr as u64 + data_len as u64 > self.file_len {
            return Err(Error::Corrupt(format!(
                "data block {}+{} ends past the file",
                data_ptr, data_len
            )));
        }
        file.seek(SeekFrom::Start(data_ptr as u64))?;
        let mut data = vec![0u8; data_len as usize];
        file.read_exact(&mut data)?;
        Ok(Region::decode(&data))
    }
}

/// Binary search over `count` index entries stored contiguously in `buf`
/// starting at `base`. Returns the matching entry's (data_ptr, data_len).
fn search_entries(buf: &[u8], base: usize, count: usize, ordinal: u32) -> Option<(u32, u8)> {
    let mut low: i64 = 0;
    let mut high: i64 = count as i64 - 1;
    while low <= high {
        let mid = (low + high) >> 1;
        let entry = IndexEntry::from_bytes(buf, base + mid as usize * INDEX_ENTRY_LEN);
        if ordinal < entry.start_ip {
            high = mid - 1;
        } else if ordinal > entry.end_ip {
            low = mid + 1;
        } else {
            return Some((entry.data_ptr, entry.data_len));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_buf(entries: &[(u32, u32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (i, &(start, end)) in entries.iter().enumerate() {
            let entry = IndexEntry {
                start_ip: start,
                end_ip: end,
                data_ptr: 100 + i as u32,
                data_len: 1,
            };
            buf.extend_from_slice(&entry.to_bytes().unwrap());
        }
        buf
    }

    #[test]
    fn test_search_entries_hits_boundaries() {
        let buf = entry_buf(&[(0, 9), (10, 19), (20, u32::MAX)]);
        assert_eq!(search_entries(&buf, 0, 3, 0), Some((100, 1)));
        assert_eq!(search_entries(&buf, 0, 3, 9), Some((100, 1)));
        assert_eq!(search_entries(&buf, 0, 3, 10), Some((101, 1)));
        assert_eq!(search_entries(&buf, 0, 3, 15), Some((101, 1)));
        assert_eq!(search_entries(&buf, 0, 3, 20), Some((102, 1)));
        assert_eq!(search_entries(&buf, 0, 3, u32::MAX), Some((102, 1)));
    }

    #[test]
    fn test_search_entries_misses_gap() {
        let buf = entry_buf(&[(0, 9), (20, 29)]);
        assert_eq!(search_entries(&buf, 0, 2, 15), None);
        assert_eq!(search_entries(&buf, 0, 2, 30), None);
    }

    #[test]
    fn test_search_entries_empty() {
        assert_eq!(search_entries(&[], 0, 0, 5), None);
    }
}
