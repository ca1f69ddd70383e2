//! Attribution record codec.
//!
//! A [`Region`] is serialized as its seven fields joined with `|`:
//! `country|province|city|isp|region_id|province_id|isp_id`. Empty text
//! fields are written as the literal `"0"`; this is a format invariant, the
//! data region never stores a blank field.
//!
//! Decoding is deliberately permissive. Records written by older tooling may
//! omit trailing numeric fields, and hand-edited source data occasionally
//! carries garbage in them, so missing fields pad out empty and numeric
//! fields that fail to parse become 0. Decoding never fails.

use std::fmt;

/// Delimiter between record fields.
pub const FIELD_SEPARATOR: char = '|';

/// Placeholder written for empty text fields.
pub const EMPTY_FIELD: &str = "0";

/// Geographic/ISP attribution for one IP range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    pub country: String,
    pub province: String,
    pub city: String,
    pub isp: String,
    pub region_id: i64,
    pub province_id: i64,
    pub isp_id: i64,
}

impl Region {
    /// Create a region from its text fields, with all numeric codes zero.
    pub fn new(country: &str, province: &str, city: &str, isp: &str) -> Self {
        Self {
            country: country.to_string(),
            province: province.to_string(),
            city: city.to_string(),
            isp: isp.to_string(),
            ..Default::default()
        }
    }

    /// Serialize to the delimiter-joined on-disk form.
    pub fn encode(&self) -> Vec<u8> {
        let s = [
            field_or_zero(&self.country),
            field_or_zero(&self.province),
            field_or_zero(&self.city),
            field_or_zero(&self.isp),
        ]
        .join("|");
        format!(
            "{}|{}|{}|{}",
            s, self.region_id, self.province_id, self.isp_id
        )
        .into_bytes()
    }

    /// Deserialize from a data block. Never fails; see module docs.
    pub fn decode(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
        while fields.len() < 7 {
            fields.push("");
        }
        Self {
            country: fields[0].to_string(),
            province: fields[1].to_string(),
            city: fields[2].to_string(),
            isp: fields[3].to_string(),
            region_id: fields[4].parse().unwrap_or(0),
            province_id: fields[5].parse().unwrap_or(0),
            isp_id: fields[6].parse().unwrap_or(0),
        }
    }

    /// Content identity used to share one data block across ranges.
    ///
    /// Only the four text fields participate: the numeric codes are derived
    /// from them upstream, so identical text means an identical block.
    pub fn dedup_key(&self) -> String {
        [
            field_or_zero(&self.country),
            field_or_zero(&self.province),
            field_or_zero(&self.city),
            field_or_zero(&self.isp),
        ]
        .join("|")
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}",
            self.country,
            self.province,
            self.city,
            self.isp,
            self.region_id,
            self.province_id,
            self.isp_id
        )
    }
}

fn field_or_zero(s: &str) -> &str {
    if s.is_empty() {
        EMPTY_FIELD
    } else {
        s
    }
}
