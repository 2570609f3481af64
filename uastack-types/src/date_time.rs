// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `DateTime`.

use std::{
    fmt,
    io::{Read, Write},
    ops::{Add, Sub},
};

use chrono::{Datelike, Duration, TimeZone, Timelike, Utc};

use crate::{
    encoding::{read_i64, write_i64, EncodingResult},
    DecodingOptions, SimpleBinaryDecodable, SimpleBinaryEncodable,
};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_TICK: i64 = 100;
const TICKS_PER_SECOND: i64 = NANOS_PER_SECOND / NANOS_PER_TICK;

const MIN_YEAR: i32 = 1601;
const MAX_YEAR: i32 = 9999;

/// A date/time value, stored as a count of 100ns ticks since 1601-01-01 00:00:00 UTC.
///
/// The range is clamped to 1601..9999 as the protocol requires; values
/// outside are saturated to the endpoints.
#[derive(PartialEq, PartialOrd, Eq, Ord, Clone, Copy, Hash)]
pub struct DateTime {
    date_time: chrono::DateTime<Utc>,
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date_time.to_rfc3339())
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::null()
    }
}

impl SimpleBinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i64(stream, self.checked_ticks())
    }
}

impl SimpleBinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let ticks = read_i64(stream)?;
        Ok(DateTime::from_ticks(ticks))
    }
}

impl Add<Duration> for DateTime {
    type Output = DateTime;
    fn add(self, rhs: Duration) -> Self::Output {
        DateTime::from(self.date_time + rhs)
    }
}

impl Sub<Duration> for DateTime {
    type Output = DateTime;
    fn sub(self, rhs: Duration) -> Self::Output {
        DateTime::from(self.date_time - rhs)
    }
}

impl Sub<DateTime> for DateTime {
    type Output = Duration;
    fn sub(self, rhs: DateTime) -> Self::Output {
        self.date_time - rhs.date_time
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(date_time: chrono::DateTime<Utc>) -> Self {
        // Clip the nanoseconds to 100ns tick resolution
        let nanos = date_time.nanosecond() - date_time.nanosecond() % NANOS_PER_TICK as u32;
        let date_time = date_time.with_nanosecond(nanos).unwrap_or(date_time);
        DateTime { date_time }
    }
}

impl From<DateTime> for chrono::DateTime<Utc> {
    fn from(value: DateTime) -> Self {
        value.date_time
    }
}

impl DateTime {
    /// The current time in UTC.
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// The null date time, which encodes to a tick count of zero.
    pub fn null() -> DateTime {
        DateTime::from_ticks(0)
    }

    /// Test if this value is the null (epoch) date time.
    pub fn is_null(&self) -> bool {
        self.ticks() == 0
    }

    /// Create a date time from a tick count, 100ns intervals since the
    /// 1601-01-01 epoch.
    pub fn from_ticks(ticks: i64) -> DateTime {
        let secs = ticks / TICKS_PER_SECOND;
        let nanos = (ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
        DateTime {
            date_time: Self::epoch() + Duration::seconds(secs) + Duration::nanoseconds(nanos),
        }
    }

    /// The number of 100ns ticks since the 1601 epoch. May be negative for
    /// dates before the epoch.
    pub fn ticks(&self) -> i64 {
        let duration = self.date_time - Self::epoch();
        duration.num_seconds() * TICKS_PER_SECOND
            + duration.subsec_nanos() as i64 / NANOS_PER_TICK
    }

    /// The tick count clamped to the valid protocol range. Values before 1601
    /// are encoded as 0, values past 9999 as `i64::MAX`, as part 6 requires.
    pub fn checked_ticks(&self) -> i64 {
        let nanos = self.ticks();
        if nanos < 0 {
            return 0;
        }
        if self.date_time.date_naive().year_ce().1 as i32 > MAX_YEAR {
            return i64::MAX;
        }
        nanos
    }

    /// Get this time as a `std::time::Instant`-compatible offset in
    /// milliseconds from another time; negative if `self` is earlier.
    pub fn delta_ms(&self, other: &DateTime) -> i64 {
        (*self - *other).num_milliseconds()
    }

    fn epoch() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(MIN_YEAR, 1, 1, 0, 0, 0).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn epoch_is_zero() {
        assert_eq!(DateTime::null().ticks(), 0);
        assert!(DateTime::null().is_null());
    }

    #[test]
    fn ticks_round_trip() {
        let now = DateTime::now();
        let ticks = now.ticks();
        assert_eq!(DateTime::from_ticks(ticks), now);

        let bytes = now.encode_to_vec();
        let decoded =
            DateTime::decode(&mut Cursor::new(bytes), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, now);
    }

    #[test]
    fn ordering() {
        let a = DateTime::now();
        let b = a + Duration::milliseconds(500);
        assert!(b > a);
        assert_eq!((b - a).num_milliseconds(), 500);
    }
}
