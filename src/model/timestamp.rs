//! Turn timestamps.
//!
//! Hosts stamp every turn with an 18-byte text field, `MM-DD-YYYY` directly
//! followed by `HH:MM:SS` (e.g. `"03-15-200712:00:05"`). The same field
//! appears in the result file's GEN section and in the util-data control
//! record, and it is what ties the two files of one turn together.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Size of the raw timestamp field in bytes.
pub const TIMESTAMP_SIZE: usize = 18;

/// `chrono` layout of the raw field (used for rendering only).
const RAW_FORMAT: &str = "%m-%d-%Y%H:%M:%S";

/// Layout used for display and for persisting in the configuration.
const DISPLAY_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

/// A validated turn timestamp.
///
/// Ordering is chronological, so a turn from December sorts before one from
/// the following January even though the raw text would not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    when: NaiveDateTime,
}

impl Timestamp {
    /// Parse a raw timestamp field.
    ///
    /// Only the first [`TIMESTAMP_SIZE`] bytes are considered. Returns `None`
    /// when the field is short, has the wrong shape, or names a date/time
    /// that does not exist. Callers treat `None` as "invalid timestamp".
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let raw = raw.get(..TIMESTAMP_SIZE)?;
        let shape_ok = raw.iter().enumerate().all(|(i, &b)| match i {
            2 | 5 => b == b'-',
            12 | 15 => b == b':',
            _ => b.is_ascii_digit(),
        });
        if !shape_ok {
            return None;
        }
        let num = |range: std::ops::Range<usize>| {
            raw[range]
                .iter()
                .fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0'))
        };
        let year = i32::try_from(num(6..10)).ok()?;
        let date = NaiveDate::from_ymd_opt(year, num(0..2), num(3..5))?;
        let time = NaiveTime::from_hms_opt(num(10..12), num(13..15), num(16..18))?;
        Some(Self {
            when: NaiveDateTime::new(date, time),
        })
    }

    /// Raw 18-byte representation, as stored in game files.
    pub fn to_raw(&self) -> [u8; TIMESTAMP_SIZE] {
        let text = self.when.format(RAW_FORMAT).to_string();
        let mut raw = [b'0'; TIMESTAMP_SIZE];
        let len = text.len().min(TIMESTAMP_SIZE);
        raw[..len].copy_from_slice(&text.as_bytes()[..len]);
        raw
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.when.format(DISPLAY_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let ts = Timestamp::from_bytes(b"03-15-200712:00:05").unwrap();
        assert_eq!(ts.to_string(), "03-15-2007 12:00:05");
        assert_eq!(&ts.to_raw(), b"03-15-200712:00:05");
    }

    #[test]
    fn test_parse_ignores_trailing_bytes() {
        assert!(Timestamp::from_bytes(b"03-15-200712:00:05\x00\x01garbage").is_some());
    }

    #[test]
    fn test_reject_malformed() {
        assert!(Timestamp::from_bytes(b"03-15-2007").is_none());
        assert!(Timestamp::from_bytes(b"03/15/200712:00:05").is_none());
        assert!(Timestamp::from_bytes(b"                  ").is_none());
        assert!(Timestamp::from_bytes(b"13-15-200712:00:05").is_none());
        assert!(Timestamp::from_bytes(b"02-30-200712:00:05").is_none());
        assert!(Timestamp::from_bytes(b"03-15-200725:00:05").is_none());
    }

    #[test]
    fn test_chronological_order() {
        let december = Timestamp::from_bytes(b"12-31-200623:59:59").unwrap();
        let january = Timestamp::from_bytes(b"01-01-200700:00:00").unwrap();
        let later_same_day = Timestamp::from_bytes(b"01-01-200700:00:01").unwrap();
        assert!(december < january);
        assert!(january < later_same_day);
    }
}
