//! Error types for ipregion.

use thiserror::Error;

/// Error type for ipregion operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed dotted-decimal IPv4 text
    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    /// Range entries supplied out of order or overlapping
    #[error("range {start}-{end} is out of order: ranges must be sorted and non-overlapping")]
    RangeOrder { start: String, end: String },

    /// Encoded attribute record exceeds the 8-bit length field
    #[error("region record too large: {len} bytes (limit {limit})")]
    RecordTooLarge { len: usize, limit: usize },

    /// Data region grew past the 24-bit pointer ceiling
    #[error("data region full: offset {offset} exceeds the 24-bit pointer limit")]
    DataRegionFull { offset: u64 },

    /// More checkpoints than the fixed-capacity header region can hold
    #[error("checkpoint region full: {count} entries exceed capacity {capacity}")]
    CheckpointOverflow { count: usize, capacity: usize },

    /// Build invoked with no range entries
    #[error("no range entries to build")]
    EmptyBuild,

    /// Super block pointers do not describe a valid index region
    #[error("invalid super block: {0}")]
    InvalidSuperBlock(String),

    /// A pointer inside the database falls outside the file
    #[error("corrupt database: {0}")]
    Corrupt(String),

    /// No index entry covers the queried ordinal
    #[error("no region found for IP {0}")]
    NotFound(String),

    /// IO error on the backing file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ipregion operations.
pub type Result<T> = std::result::Result<T, Error>;
