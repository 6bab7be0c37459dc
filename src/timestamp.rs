//! Minute-resolution timestamps encoded as `YYYYDDDHHMM`.
//!
//! The encoding doubles as the canonical base name of every stored image, so
//! numeric order, lexicographic order of the zero-padded string and
//! chronological order all agree.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::Error;

/// Number of decimal digits in an encoded timestamp.
pub const DIGITS: usize = 11;

/// A UTC minute encoded as `year * 10^7 + day_of_year * 10^4 + hour * 100 + minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Encode `at` (truncated to the minute).
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let year = u64::from(at.year().max(0).unsigned_abs());
        Self(
            year * 10_000_000
                + u64::from(at.ordinal()) * 10_000
                + u64::from(at.hour()) * 100
                + u64::from(at.minute()),
        )
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Canonical file name for this timestamp, e.g. `20232851230.jpg`.
    #[must_use]
    pub fn file_name(self, format: &str) -> String {
        format!("{self}{format}")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = DIGITS)
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedName(s.to_string());
        if s.len() != DIGITS || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let value: u64 = s.parse().map_err(|_| malformed())?;
        let day = (value / 10_000) % 1_000;
        let hour = (value / 100) % 100;
        let minute = value % 100;
        if !(1..=366).contains(&day) || hour > 23 || minute > 59 {
            return Err(malformed());
        }
        Ok(Self(value))
    }
}

/// Timestamp for UTC-now minus `offset_minutes`.
#[must_use]
pub fn encode_now(offset_minutes: u32) -> Timestamp {
    encode_at(Utc::now(), offset_minutes)
}

/// Timestamp for `now` minus `offset_minutes`.
#[must_use]
pub fn encode_at(now: DateTime<Utc>, offset_minutes: u32) -> Timestamp {
    Timestamp::from_datetime(now - Duration::minutes(i64::from(offset_minutes)))
}

/// Decode the timestamp carried by a file name or path.
///
/// Any directory components and the extension are stripped first.
///
/// # Errors
/// Returns [`Error::MalformedName`] if the remaining stem is not an
/// 11-digit `YYYYDDDHHMM` value.
pub fn decode(file_name: impl AsRef<Path>) -> Result<Timestamp, Error> {
    let path = file_name.as_ref();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::MalformedName(path.display().to_string()))?;
    stem.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 42).unwrap()
    }

    #[test]
    fn encodes_day_of_year_and_drops_seconds() {
        let ts = Timestamp::from_datetime(at(2023, 10, 12, 12, 30));
        assert_eq!(ts.to_string(), "20232851230");
        assert_eq!(ts.as_u64(), 20_232_851_230);
    }

    #[test]
    fn zero_pads_early_days_and_hours() {
        let ts = Timestamp::from_datetime(at(2024, 1, 2, 3, 4));
        assert_eq!(ts.to_string(), "20240020304");
    }

    #[test]
    fn decode_strips_directory_and_extension() {
        let ts = decode("/var/data/20232851230.jpg").unwrap();
        assert_eq!(ts.to_string(), "20232851230");
    }

    #[test]
    fn decode_round_trips_encoded_names() {
        let start = at(2023, 12, 31, 22, 0);
        for minutes in (0..2000).step_by(7) {
            let ts = encode_at(start, minutes);
            assert_eq!(decode(ts.file_name(".png")).unwrap(), ts);
        }
    }

    #[test]
    fn string_order_matches_time_order() {
        let now = at(2024, 1, 1, 0, 30);
        let mut prev = encode_at(now, 24 * 60);
        for back in (0..24 * 60).rev() {
            let next = encode_at(now, back);
            assert!(prev <= next);
            assert!(prev.to_string() <= next.to_string());
            prev = next;
        }
    }

    #[test]
    fn offset_crosses_year_boundary() {
        let ts = encode_at(at(2024, 1, 1, 0, 10), 20);
        assert_eq!(ts.to_string(), "20233652350");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in [
            "latest.jpg",
            "2023285123.jpg",
            "202328512300.jpg",
            "20230001230.jpg",
            "20233672400.jpg",
            "20232851260.jpg",
            "2023285123a.jpg",
            "+2023285123.jpg",
        ] {
            assert!(
                matches!(decode(bad), Err(Error::MalformedName(_))),
                "{bad} should be rejected"
            );
        }
    }
}
