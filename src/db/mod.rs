//! Binary database format: builder and reader.
//!
//! The format maps sorted, non-overlapping IPv4 ranges to deduplicated
//! attribution records and supports three point-lookup strategies.
//!
//! # File Structure
//!
//! ```text
//! +---------------------+
//! |     SUPER BLOCK     |  8 bytes: first/last index entry offsets
//! +---------------------+
//! |  CHECKPOINT REGION  |  16384 bytes fixed, sparse {start_ip, index_ptr}
//! +---------------------+
//! |     DATA REGION     |  variable, deduplicated attribute records
//! +---------------------+
//! |     INDEX REGION    |  12-byte entries {start_ip, end_ip, len<<24|ptr}
//! +---------------------+
//! |      SIGNATURE      |  opaque build comment, ignored by readers
//! +---------------------+
//! ```

mod format;
mod reader;
pub mod writer;

#[cfg(test)]
mod tests;

pub use format::*;
pub use reader::{DbReader, SearchMode};
pub use writer::DbWriter;
