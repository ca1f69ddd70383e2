//! Database builder.
//!
//! Consumes an ordered, non-overlapping sequence of IP ranges with their
//! attribution and lays out the complete binary image in one pass: zeroed
//! super block and checkpoint region up front, deduplicated data blocks,
//! the sorted index region, then the back-patched pointers.

use ahash::AHashMap;

use super::format::*;
use crate::record::Region;
use crate::{ip, Error, Result};

/// Database builder.
///
/// Ranges must be added in ascending `start_ip` order without overlaps; the
/// supplier is expected to provide gap-free full coverage of the ordinal
/// space, but only ordering and overlap are enforced here.
///
/// # Example
///
/// ```ignore
/// let mut writer = DbWriter::new();
/// writer.add_range("0.0.0.0", "0.255.255.255", Region::new("CN", "Beijing", "Beijing", "Unicom"))?;
/// writer.add_range("1.0.0.0", "255.255.255.255", Region::default())?;
/// writer.write_to(Path::new("region.db"))?;
/// ```
#[derive(Debug, Default)]
pub struct DbWriter {
    ranges: Vec<(u32, u32, Region)>,
}

impl DbWriter {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ranges added so far.
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Append one range entry.
    ///
    /// Fails with `InvalidIp` on malformed addresses and `RangeOrder` when
    /// the range is inverted or does not sort after the previous one. A gap
    /// between consecutive ranges is the supplier's problem and only logged.
    pub fn add_range(&mut self, start_ip: &str, end_ip: &str, region: Region) -> Result<()> {
        let start = ip::parse(start_ip)?;
        let end = ip::parse(end_ip)?;
        if start > end {
            return Err(Error::RangeOrder {
                start: start_ip.to_string(),
                end: end_ip.to_string(),
            });
        }
        if let Some(&(_, prev_end, _)) = self.ranges.last() {
            if start <= prev_end {
                return Err(Error::RangeOrder {
                    start: start_ip.to_string(),
                    end: end_ip.to_string(),
                });
            }
            if start != prev_end.wrapping_add(1) {
                log::warn!(
                    "coverage gap between {} and {}",
                    ip::format(prev_end),
                    start_ip
                );
            }
        }
        self.ranges.push((start, end, region));
        Ok(())
    }

    /// Build the complete binary image.
    pub fn build(&self) -> Result<Vec<u8>> {
        if self.ranges.is_empty() {
            return Err(Error::EmptyBuild);
        }

        let mut buf = vec![0u8; DATA_REGION_START];
        let mut dedup: AHashMap<String, (u32, u8)> = AHashMap::new();
        let mut index: Vec<IndexEntry> = Vec::with_capacity(self.ranges.len());

        log::info!("writing data blocks for {} ranges", self.ranges.len());
        for (start, end, region) in &self.ranges {
            let (data_ptr, data_len) = match dedup.get(&region.dedup_key()) {
                Some(&block) => block,
                None => {
                    let block = self.append_data_block(&mut buf, region)?;
                    dedup.insert(region.dedup_key(), block);
                    block
                }
            };
            index.push(IndexEntry {
                start_ip: *start,
                end_ip: *end,
                data_ptr,
                data_len,
            });
        }
        log::info!(
            "data region done: {} unique blocks, {} bytes",
            dedup.len(),
            buf.len() - DATA_REGION_START
        );

        let first_index_ptr = buf.len() as u32;
        log::info!("index region starts at {}", first_index_ptr);

        let mut checkpoints = vec![CheckpointEntry {
            start_ip: index[0].start_ip,
            index_ptr: first_index_ptr,
        }];
        let mut counter = 0usize;
        for entry in &index {
            counter += 1;
            if counter >= CHECKPOINT_INTERVAL {
                checkpoints.push(CheckpointEntry {
                    start_ip: entry.start_ip,
                    index_ptr: buf.len() as u32,
                });
                counter = 0;
            }
            buf.extend_from_slice(&entry.to_bytes()?);
        }
        if counter > 0 {
            // Trailing checkpoint closing the final partial page.
            checkpoints.push(CheckpointEntry {
                start_ip: index[index.len() - 1].start_ip,
                index_ptr: buf.len() as u32,
            });
        }
        if checkpoints.len() * CHECKPOINT_ENTRY_LEN > HEADER_CAPACITY {
            return Err(Error::CheckpointOverflow {
                count: checkpoints.len(),
                capacity: HEADER_CAPACITY / CHECKPOINT_ENTRY_LEN,
            });
        }

        let last_index_ptr = buf.len() as u32 - INDEX_ENTRY_LEN as u32;
        log::info!(
            "index region done: {} entries, {} checkpoints, last entry at {}",
            index.len(),
            checkpoints.len(),
            last_index_ptr
        );

        let super_block = SuperBlock {
            first_index_ptr,
            last_index_ptr,
        };
        buf[0..SUPER_BLOCK_LEN].copy_from_slice(&super_block.to_bytes());
        for (i, cp) in checkpoints.iter().enumerate() {
            let offset = SUPER_BLOCK_LEN + i * CHECKPOINT_ENTRY_LEN;
            buf[offset..offset + CHECKPOINT_ENTRY_LEN].copy_from_slice(&cp.to_bytes());
        }

        buf.extend_from_slice(build_signature().as_bytes());

        log::info!("build finished: {} bytes total", buf.len());
        Ok(buf)
    }

    /// Build and write the image to `path`.
    pub fn write_to(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let data = self.build()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn append_data_block(&self, buf: &mut Vec<u8>, region: &Region) -> Result<(u32, u8)> {
        let bytes = region.encode();
        if bytes.len() > MAX_DATA_LEN {
            return Err(Error::RecordTooLarge {
                len: bytes.len(),
                limit: MAX_DATA_LEN,
            });
        }
        let ptr = buf.len() as u64;
        if ptr + bytes.len() as u64 > MAX_DATA_PTR as u64 {
            return Err(Error::DataRegionFull { offset: ptr });
        }
        buf.extend_from_slice(&bytes);
        Ok((ptr as u32, bytes.len() as u8))
    }
}

/// Opaque trailing comment; readers never interpret it.
fn build_signature() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!(
        "Built by ipregion/{} at {}",
        env!("CARGO_PKG_VERSION"),
        now
    )
}
