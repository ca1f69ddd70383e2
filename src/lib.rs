//! ipregion - a compact binary IPv4 geolocation database.
//!
//! This crate maps an IPv4 address to a geographic/ISP attribution record
//! through a write-once, read-many binary format, and builds that format
//! from a sorted stream of IP-range records.
//!
//! # Features
//!
//! - **Single-pass builder**: deduplicates identical attribution payloads so
//!   each record is stored once no matter how many ranges share it
//! - **Three lookup strategies** over the same file: fully in-memory,
//!   streamed binary search, and two-level sparse-index search
//! - **Thread-safe readers**: one opened instance serves concurrent lookups
//! - **Permissive record decoding**: a lookup always produces a record, even
//!   from legacy data with missing or garbled numeric fields
//!
//! # Quick Start
//!
//! ```ignore
//! use ipregion::{DbReader, DbWriter, Region, SearchMode};
//!
//! // Build once, offline.
//! let mut writer = DbWriter::new();
//! writer.add_range("0.0.0.0", "0.255.255.255",
//!     Region::new("CN", "Beijing", "Beijing", "Unicom"))?;
//! writer.add_range("1.0.0.0", "255.255.255.255", Region::default())?;
//! writer.write_to("region.db")?;
//!
//! // Open and serve repeated point lookups.
//! let reader = DbReader::open("region.db", SearchMode::Btree)?;
//! let region = reader.lookup("0.1.2.3")?;
//! assert_eq!(region.country, "CN");
//! ```
//!
//! # Choosing a strategy
//!
//! | Mode                  | Memory          | Per-lookup I/O            |
//! |-----------------------|-----------------|---------------------------|
//! | [`SearchMode::Memory`]| whole file      | none after the first load |
//! | [`SearchMode::File`]  | none            | log2(n) seeks             |
//! | [`SearchMode::Btree`] | checkpoint array| one page-sized bulk read  |
//!
//! All three return byte-identical records for the same address.

mod error;

pub mod db;
pub mod ip;
pub mod record;

// Re-export core types
pub use db::{DbReader, DbWriter, SearchMode};
pub use error::{Error, Result};
pub use record::Region;
