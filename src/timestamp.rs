//! 64-bit NTP timestamps: 32 bits of seconds since an era epoch followed by a
//! 32-bit binary fraction of a second.
//!
//! The era is carried by a single bit. A seconds field with its top bit set is
//! counted from 1900-01-01 (era 0); one with the top bit clear is counted from
//! 2036-02-07 06:28:16 UTC (era 1). The current wall clock plays no part in
//! the choice.

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, TimeZone, Utc};

use crate::error::RangeError;

/// Era 0 epoch, 1900-01-01T00:00:00Z, in seconds relative to the Unix epoch.
pub const ERA0_EPOCH_UNIX: i64 = -2_208_988_800;
/// Era 1 epoch, 2036-02-07T06:28:16Z, in seconds relative to the Unix epoch.
pub const ERA1_EPOCH_UNIX: i64 = ERA0_EPOCH_UNIX + (1 << 32);
/// Earliest encodable instant, 1968-01-01T00:00:00Z.
pub const FLOOR_UNIX: i64 = -63_158_400;

/// The canonical encoding of an unset timestamp.
pub const NULL_TIMESTAMP: [u8; 8] = [0; 8];

const ERA_BIT: u32 = 0x8000_0000;
const FRACTION_SCALE: f64 = 4_294_967_296.0; // 2^32
const MICROS_PER_SEC: i64 = 1_000_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Era {
    /// Counted from 1900-01-01; selected by a set top bit.
    Zero,
    /// Counted from 2036-02-07 06:28:16 UTC; selected by a clear top bit.
    One,
}

impl Era {
    pub fn from_seconds_field(seconds: u32) -> Era {
        if seconds & ERA_BIT != 0 {
            Era::Zero
        } else {
            Era::One
        }
    }

    /// The era an encoder picks for `instant`.
    pub fn for_instant(instant: &DateTime<Utc>) -> Era {
        if unix_micros(instant) >= ERA1_EPOCH_UNIX * MICROS_PER_SEC {
            Era::One
        } else {
            Era::Zero
        }
    }

    fn epoch_unix(self) -> i64 {
        match self {
            Era::Zero => ERA0_EPOCH_UNIX,
            Era::One => ERA1_EPOCH_UNIX,
        }
    }

    pub fn epoch(self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.epoch_unix() * 1_000_000_000)
    }
}

fn unix_micros(instant: &DateTime<Utc>) -> i64 {
    instant.timestamp() * MICROS_PER_SEC + i64::from(instant.timestamp_subsec_micros())
}

/// Decodes an 8-byte timestamp field.
///
/// Eight zero bytes decode to the era 0 epoch. The fraction is resolved to the
/// nearest microsecond.
pub fn decode(bytes: &[u8; 8]) -> DateTime<Utc> {
    if *bytes == NULL_TIMESTAMP {
        return Era::Zero.epoch();
    }
    let seconds = BigEndian::read_u32(&bytes[..4]);
    let fraction = BigEndian::read_u32(&bytes[4..]);

    let era = Era::from_seconds_field(seconds);
    let sub_micros = (f64::from(fraction) / FRACTION_SCALE * 1e6).round() as i64;
    let micros = (era.epoch_unix() + i64::from(seconds)) * MICROS_PER_SEC + sub_micros;
    Utc.timestamp_nanos(micros * 1_000)
}

/// Decodes a timestamp field, mapping the null encoding to `None`.
pub fn decode_optional(bytes: &[u8; 8]) -> Option<DateTime<Utc>> {
    if *bytes == NULL_TIMESTAMP {
        None
    } else {
        Some(decode(bytes))
    }
}

/// Encodes `instant` into an 8-byte timestamp field.
///
/// The offset from the era epoch is taken as a float number of seconds and its
/// fractional part is scaled by 2^32 and truncated, so the lowest fraction bits
/// of present-day instants come out as zero.
pub fn encode(instant: &DateTime<Utc>) -> Result<[u8; 8], RangeError> {
    let micros = unix_micros(instant);
    if micros < FLOOR_UNIX * MICROS_PER_SEC {
        return Err(RangeError::BeforeFloor(instant.to_rfc3339()));
    }

    let era = Era::for_instant(instant);
    let delta = (micros - era.epoch_unix() * MICROS_PER_SEC) as f64 / 1e6;
    let seconds = delta.trunc();
    if era == Era::One && seconds >= f64::from(ERA_BIT) {
        return Err(RangeError::PastEraWindow(instant.to_rfc3339()));
    }
    let fraction = ((delta - seconds) * FRACTION_SCALE) as u32;

    let mut buf = [0; 8];
    BigEndian::write_u32(&mut buf[..4], seconds as u32);
    BigEndian::write_u32(&mut buf[4..], fraction);
    Ok(buf)
}

/// Encodes an optional instant; `None` becomes [`NULL_TIMESTAMP`].
pub fn encode_optional(instant: Option<&DateTime<Utc>>) -> Result<[u8; 8], RangeError> {
    match instant {
        Some(instant) => encode(instant),
        None => Ok(NULL_TIMESTAMP),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, us: u32) -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_micro_opt(h, mi, s, us))
            .expect("valid date");
        Utc.from_utc_datetime(&naive)
    }

    static TS_2018: [u8; 8] = [0xde, 0x37, 0xa3, 0x48, 0x92, 0xbb, 0x68, 0x20];

    #[test]
    fn test_decode_known_instant() {
        assert_eq!(
            decode(&TS_2018),
            utc(2018, 2, 21, 7, 50, 32, 573_172)
        );
    }

    #[test]
    fn test_encode_known_instant_truncates_fraction() {
        let encoded = encode(&utc(2018, 2, 21, 7, 50, 32, 573_172)).unwrap();
        assert_eq!(encoded, [0xde, 0x37, 0xa3, 0x48, 0x92, 0xbb, 0x68, 0x00]);
    }

    #[test]
    fn test_null_timestamp() {
        assert_eq!(encode_optional(None).unwrap(), NULL_TIMESTAMP);
        assert_eq!(decode(&NULL_TIMESTAMP), utc(1900, 1, 1, 0, 0, 0, 0));
        assert_eq!(decode_optional(&NULL_TIMESTAMP), None);
        assert!(decode_optional(&TS_2018).is_some());
    }

    #[test]
    fn test_epochs() {
        assert_eq!(Era::Zero.epoch(), utc(1900, 1, 1, 0, 0, 0, 0));
        assert_eq!(Era::One.epoch(), utc(2036, 2, 7, 6, 28, 16, 0));
    }

    #[test]
    fn test_era_boundary() {
        let boundary = utc(2036, 2, 7, 6, 28, 16, 0);
        assert_eq!(Era::for_instant(&boundary), Era::One);
        assert_eq!(encode(&boundary).unwrap(), NULL_TIMESTAMP);

        let before = boundary - Duration::microseconds(1);
        assert_eq!(Era::for_instant(&before), Era::Zero);
        let encoded = encode(&before).unwrap();
        assert_eq!(&encoded[..4], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_top_bit_selects_era_zero() {
        let bytes = [0x80, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(Era::from_seconds_field(0x8000_0000), Era::Zero);
        assert_eq!(decode(&bytes), utc(1968, 1, 20, 3, 14, 8, 0));

        let bytes = [0x00, 0, 0, 1, 0, 0, 0, 0];
        assert_eq!(decode(&bytes), utc(2036, 2, 7, 6, 28, 17, 0));
    }

    #[test]
    fn test_round_trip() {
        let instants = [
            utc(1970, 1, 1, 0, 0, 0, 0),
            utc(1999, 12, 31, 23, 59, 59, 999_999),
            utc(2018, 2, 21, 7, 50, 32, 573_172),
            utc(2036, 2, 7, 6, 28, 17, 250_000),
            utc(2050, 6, 15, 12, 0, 0, 1),
            utc(2100, 1, 1, 0, 0, 0, 123_456),
        ];
        for instant in instants.iter() {
            let decoded = decode(&encode(instant).unwrap());
            let error = (decoded - *instant).num_microseconds().unwrap().abs();
            assert!(error <= 1, "{} decoded as {}", instant, decoded);
        }
    }

    #[test]
    fn test_encode_before_floor() {
        let err = encode(&utc(1967, 12, 31, 23, 59, 59, 0)).unwrap_err();
        assert!(matches!(err, RangeError::BeforeFloor(_)));
        assert!(encode(&utc(1968, 1, 1, 0, 0, 0, 0)).is_ok());
    }

    #[test]
    fn test_encode_past_era_window() {
        let last = Era::One.epoch() + Duration::seconds(0x7fff_ffff);
        assert!(encode(&last).is_ok());
        let err = encode(&(last + Duration::seconds(1))).unwrap_err();
        assert!(matches!(err, RangeError::PastEraWindow(_)));
    }
}
