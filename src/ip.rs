//! IPv4 text/ordinal conversion.
//!
//! An ordinal is the unsigned 32-bit value obtained by packing the four
//! octets most-significant-first, so ordering ordinals orders addresses.

use crate::{Error, Result};

/// Parse dotted-decimal IPv4 text into its u32 ordinal.
///
/// Requires exactly four dot-separated decimal octets, each in 0..=255.
/// Anything else is an `Error::InvalidIp`.
pub fn parse(s: &str) -> Result<u32> {
    let mut sum: u32 = 0;
    let mut count = 0;
    for part in s.split('.') {
        if count == 4 {
            return Err(Error::InvalidIp(s.to_string()));
        }
        let octet: u8 = part.parse().map_err(|_| Error::InvalidIp(s.to_string()))?;
        sum = (sum << 8) | octet as u32;
        count += 1;
    }
    if count != 4 {
        return Err(Error::InvalidIp(s.to_string()));
    }
    Ok(sum)
}

/// Format a u32 ordinal as dotted-decimal IPv4 text.
pub fn format(ip: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        ip >> 24,
        (ip >> 16) & 0xFF,
        (ip >> 8) & 0xFF,
        ip & 0xFF
    )
}
