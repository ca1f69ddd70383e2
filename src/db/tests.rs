//! Round-trip tests for the binary database format.
//!
//! These build real database files and verify the complete write-read cycle
//! across all three lookup strategies, which must stay interchangeable.

use std::sync::Arc;

use tempfile::NamedTempFile;

use super::format::*;
use super::reader::{DbReader, SearchMode};
use super::writer::DbWriter;
use crate::record::Region;
use crate::{ip, Error};

const ALL_MODES: [SearchMode; 3] = [SearchMode::Memory, SearchMode::File, SearchMode::Btree];

/// Build a database file from (start, end, region) triples.
fn build_db(ranges: &[(&str, &str, Region)]) -> NamedTempFile {
    let mut writer = DbWriter::new();
    for (start, end, region) in ranges {
        writer.add_range(start, end, region.clone()).unwrap();
    }
    let file = NamedTempFile::new().unwrap();
    writer.write_to(file.path()).unwrap();
    file
}

fn open_all(file: &NamedTempFile) -> Vec<DbReader> {
    ALL_MODES
        .iter()
        .map(|&mode| DbReader::open(file.path(), mode).unwrap())
        .collect()
}

/// The two-range fixture from the format documentation.
fn beijing_fixture() -> NamedTempFile {
    build_db(&[
        (
            "0.0.0.0",
            "0.255.255.255",
            Region::new("CN", "Beijing", "Beijing", "Unicom"),
        ),
        ("1.0.0.0", "255.255.255.255", Region::default()),
    ])
}

// ============================================================================
// Lookup semantics
// ============================================================================

#[test]
fn test_lookup_basic() {
    let file = beijing_fixture();
    for reader in open_all(&file) {
        let region = reader.lookup("0.1.2.3").unwrap();
        assert_eq!(region.country, "CN");
        assert_eq!(region.province, "Beijing");
        assert_eq!(region.city, "Beijing");
        assert_eq!(region.isp, "Unicom");

        let region = reader.lookup("10.0.0.1").unwrap();
        assert_eq!(region.country, "0");
        assert_eq!(region.province, "0");
        assert_eq!(region.city, "0");
        assert_eq!(region.isp, "0");
    }
}

#[test]
fn test_lookup_malformed_ip_fails_in_every_mode() {
    let file = beijing_fixture();
    for reader in open_all(&file) {
        assert!(matches!(
            reader.lookup("999.1.1.1"),
            Err(Error::InvalidIp(_))
        ));
        assert!(matches!(reader.lookup("1.2.3"), Err(Error::InvalidIp(_))));
        assert!(matches!(reader.lookup(""), Err(Error::InvalidIp(_))));
    }
}

#[test]
fn test_single_range_covers_whole_space() {
    let file = build_db(&[(
        "0.0.0.0",
        "255.255.255.255",
        Region::new("ZZ", "Nowhere", "Nowhere", "None"),
    )]);
    for reader in open_all(&file) {
        for ip_text in ["0.0.0.0", "127.255.255.255", "255.255.255.255"] {
            let region = reader.lookup(ip_text).unwrap();
            assert_eq!(region.country, "ZZ", "mode {:?} ip {}", reader.mode(), ip_text);
        }
    }
}

#[test]
fn test_range_boundaries_are_inclusive() {
    let file = build_db(&[
        ("0.0.0.0", "0.255.255.255", Region::new("A", "", "", "")),
        ("1.0.0.0", "1.255.255.255", Region::new("B", "", "", "")),
        ("2.0.0.0", "255.255.255.255", Region::new("C", "", "", "")),
    ]);
    for reader in open_all(&file) {
        assert_eq!(reader.lookup("0.0.0.0").unwrap().country, "A");
        assert_eq!(reader.lookup("0.255.255.255").unwrap().country, "A");
        assert_eq!(reader.lookup("1.0.0.0").unwrap().country, "B");
        assert_eq!(reader.lookup("1.255.255.255").unwrap().country, "B");
        assert_eq!(reader.lookup("2.0.0.0").unwrap().country, "C");
        assert_eq!(reader.lookup("255.255.255.255").unwrap().country, "C");
    }
}

#[test]
fn test_gap_lookup_is_not_found() {
    // The builder tolerates supplier gaps (logged, not fatal); a lookup
    // falling into one must be a typed miss, not a crash.
    let file = build_db(&[
        ("0.0.0.0", "0.255.255.255", Region::new("A", "", "", "")),
        ("2.0.0.0", "255.255.255.255", Region::new("C", "", "", "")),
    ]);
    for reader in open_all(&file) {
        assert!(matches!(
            reader.lookup("1.2.3.4"),
            Err(Error::NotFound(_))
        ));
        // A miss must not poison the reader.
        assert_eq!(reader.lookup("0.1.2.3").unwrap().country, "A");
    }
}

#[test]
fn test_numeric_codes_survive_round_trip() {
    let mut region = Region::new("CN", "Zhejiang", "Hangzhou", "Telecom");
    region.region_id = 330000;
    region.province_id = 33;
    region.isp_id = 3;
    let file = build_db(&[("0.0.0.0", "255.255.255.255", region.clone())]);
    for reader in open_all(&file) {
        assert_eq!(reader.lookup("8.8.8.8").unwrap(), region);
    }
}

// ============================================================================
// Layout invariants
// ============================================================================

fn parse_index(data: &[u8]) -> (SuperBlock, Vec<IndexEntry>) {
    let sb = SuperBlock::from_bytes(data[0..SUPER_BLOCK_LEN].try_into().unwrap());
    let entries = (0..sb.total_entries() as usize)
        .map(|i| IndexEntry::from_bytes(data, sb.first_index_ptr as usize + i * INDEX_ENTRY_LEN))
        .collect();
    (sb, entries)
}

#[test]
fn test_index_region_layout() {
    let mut writer = DbWriter::new();
    let n = 64u32;
    let stride = u32::MAX / n;
    for i in 0..n {
        let start = i * stride;
        let end = if i == n - 1 { u32::MAX } else { (i + 1) * stride - 1 };
        writer
            .add_range(
                &ip::format(start),
                &ip::format(end),
                Region::new(&format!("C{}", i % 7), "", "", ""),
            )
            .unwrap();
    }
    let data = writer.build().unwrap();

    let (_, entries) = parse_index(&data);
    assert_eq!(entries.len(), n as usize);
    assert_eq!(entries[0].start_ip, 0);
    assert_eq!(entries[entries.len() - 1].end_ip, u32::MAX);
    for pair in entries.windows(2) {
        assert!(pair[0].start_ip < pair[1].start_ip);
        assert_eq!(pair[0].end_ip + 1, pair[1].start_ip);
    }
}

#[test]
fn test_identical_attribution_shares_one_data_block() {
    let shared = Region::new("CN", "Beijing", "Beijing", "Unicom");
    let mut writer = DbWriter::new();
    writer
        .add_range("0.0.0.0", "0.255.255.255", shared.clone())
        .unwrap();
    writer
        .add_range("1.0.0.0", "1.255.255.255", Region::new("US", "", "", ""))
        .unwrap();
    writer
        .add_range("2.0.0.0", "255.255.255.255", shared.clone())
        .unwrap();
    let data = writer.build().unwrap();

    let (sb, entries) = parse_index(&data);
    assert_eq!(entries[0].data_ptr, entries[2].data_ptr);
    assert_eq!(entries[0].data_len, entries[2].data_len);
    assert_ne!(entries[0].data_ptr, entries[1].data_ptr);

    // Exactly one copy of the encoded record in the data region.
    let needle = shared.encode();
    let region_bytes = &data[DATA_REGION_START..sb.first_index_ptr as usize];
    let copies = region_bytes
        .windows(needle.len())
        .filter(|w| *w == needle.as_slice())
        .count();
    assert_eq!(copies, 1);
}

#[test]
fn test_checkpoint_region_is_sparse_and_sorted() {
    let file = beijing_fixture();
    let data = std::fs::read(file.path()).unwrap();

    let mut checkpoints = Vec::new();
    for offset in (SUPER_BLOCK_LEN..DATA_REGION_START).step_by(CHECKPOINT_ENTRY_LEN) {
        let cp = CheckpointEntry::from_bytes(&data, offset);
        if cp.is_sentinel() {
            break;
        }
        checkpoints.push(cp);
    }

    // Two ranges fit one page: the opening checkpoint plus the trailing one.
    assert_eq!(checkpoints.len(), 2);
    let sb = SuperBlock::from_bytes(data[0..SUPER_BLOCK_LEN].try_into().unwrap());
    assert_eq!(checkpoints[0].index_ptr, sb.first_index_ptr);
    assert_eq!(checkpoints[0].start_ip, 0);
    assert_eq!(
        checkpoints[1].index_ptr,
        sb.last_index_ptr + INDEX_ENTRY_LEN as u32
    );
}

// ============================================================================
// Strategy equivalence
// ============================================================================

/// Contiguous full-coverage fixture big enough to span several checkpoint
/// pages, with enough attribute reuse to exercise dedup.
fn large_fixture(n: u32) -> (NamedTempFile, Vec<(u32, u32)>) {
    assert!(n as usize > 2 * CHECKPOINT_INTERVAL);
    let stride = u32::MAX / n;
    let mut writer = DbWriter::new();
    let mut bounds = Vec::with_capacity(n as usize);
    for i in 0..n {
        let start = i * stride;
        let end = if i == n - 1 { u32::MAX } else { (i + 1) * stride - 1 };
        let region = Region::new(
            &format!("C{}", i % 97),
            &format!("P{}", i % 23),
            "City",
            &format!("ISP{}", i % 5),
        );
        writer
            .add_range(&ip::format(start), &ip::format(end), region)
            .unwrap();
        bounds.push((start, end));
    }
    let file = NamedTempFile::new().unwrap();
    writer.write_to(file.path()).unwrap();
    (file, bounds)
}

#[test]
fn test_strategies_agree_on_every_boundary() {
    let (file, bounds) = large_fixture(3000);
    let readers = open_all(&file);

    let mut probes: Vec<(u32, u32)> = bounds.iter().step_by(17).copied().collect();
    probes.push(*bounds.last().unwrap());
    for (start, end) in probes {
        for ordinal in [start, start / 2 + end / 2, end] {
            let text = ip::format(ordinal);
            let expected = readers[0].lookup(&text).unwrap();
            for reader in &readers[1..] {
                assert_eq!(
                    reader.lookup(&text).unwrap(),
                    expected,
                    "mode {:?} diverged at {}",
                    reader.mode(),
                    text
                );
            }
        }
    }
}

#[test]
fn test_btree_crosses_checkpoint_pages() {
    let (file, bounds) = large_fixture(3000);
    let memory = DbReader::open(file.path(), SearchMode::Memory).unwrap();
    let btree = DbReader::open(file.path(), SearchMode::Btree).unwrap();

    // Probe around every page boundary the builder emitted.
    for page in 1..=(bounds.len() / CHECKPOINT_INTERVAL) {
        let idx = page * CHECKPOINT_INTERVAL;
        for probe in idx.saturating_sub(2)..=(idx + 2).min(bounds.len() - 1) {
            let text = ip::format(bounds[probe].0);
            assert_eq!(
                btree.lookup(&text).unwrap(),
                memory.lookup(&text).unwrap(),
                "page boundary {} probe {}",
                page,
                probe
            );
        }
    }

    // First and last entries of the whole index.
    assert_eq!(
        btree.lookup("0.0.0.0").unwrap(),
        memory.lookup("0.0.0.0").unwrap()
    );
    assert_eq!(
        btree.lookup("255.255.255.255").unwrap(),
        memory.lookup("255.255.255.255").unwrap()
    );
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_first_use_populates_cache_once() {
    let file = beijing_fixture();
    for mode in ALL_MODES {
        let reader = Arc::new(DbReader::open(file.path(), mode).unwrap());
        let mut handles = Vec::new();
        for t in 0..8 {
            let reader = Arc::clone(&reader);
            handles.push(std::thread::spawn(move || {
                let ip_text = if t % 2 == 0 { "0.1.2.3" } else { "10.0.0.1" };
                let expected = if t % 2 == 0 { "CN" } else { "0" };
                for _ in 0..50 {
                    let region = reader.lookup(ip_text).unwrap();
                    assert_eq!(region.country, expected);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}

// ============================================================================
// Open failures
// ============================================================================

#[test]
fn test_open_missing_file() {
    let result = DbReader::open("/nonexistent/region.db", SearchMode::Memory);
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_open_truncated_file() {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"abc").unwrap();
    let result = DbReader::open(file.path(), SearchMode::Memory);
    assert!(matches!(result, Err(Error::InvalidSuperBlock(_))));
}

#[test]
fn test_open_garbage_super_block() {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), vec![0xFFu8; 64]).unwrap();
    let result = DbReader::open(file.path(), SearchMode::Btree);
    assert!(matches!(result, Err(Error::InvalidSuperBlock(_))));
}
