//! Little-endian byte conversions and fixed-width PLC scalar decoders.
//!
//! Everything here is pure: functions take a byte slice (and an offset where
//! it makes sense) and either return the value or a [`DecodeError`].

use byteorder::{ByteOrder, LE};
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::DecodeError;

type Result<T> = std::result::Result<T, DecodeError>;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Return `len` bytes of `bytes` starting at `offset`.
pub fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    bytes.get(offset..).and_then(|rest| rest.get(..len)).ok_or(DecodeError::InsufficientBytes {
        needed: offset.saturating_add(len),
        available: bytes.len(),
    })
}

macro_rules! read_at {
    ($name:ident, $ty:ty, $read:ident) => {
        #[doc = concat!("Read a little-endian `", stringify!($ty), "` at `offset`.")]
        pub fn $name(bytes: &[u8], offset: usize) -> Result<$ty> {
            Ok(LE::$read(slice(bytes, offset, std::mem::size_of::<$ty>())?))
        }
    };
}

read_at!(read_u16, u16, read_u16);
read_at!(read_i16, i16, read_i16);
read_at!(read_u32, u32, read_u32);
read_at!(read_i32, i32, read_i32);
read_at!(read_u64, u64, read_u64);
read_at!(read_i64, i64, read_i64);

/// Read a 32-bit length field that must not be negative when taken as signed.
pub fn read_length(bytes: &[u8], offset: usize) -> Result<usize> {
    let len = read_i32(bytes, offset)?;
    if len < 0 {
        return Err(DecodeError::NegativeLength(len));
    }
    Ok(len as usize)
}

pub fn encode_i16(value: i16) -> [u8; 2] {
    value.to_le_bytes()
}

pub fn encode_i32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Any nonzero first byte is true.
pub fn decode_bool(bytes: &[u8]) -> Result<bool> {
    Ok(slice(bytes, 0, 1)?[0] != 0)
}

pub fn decode_real(bytes: &[u8]) -> Result<f32> {
    Ok(LE::read_f32(slice(bytes, 0, 4)?))
}

pub fn decode_lreal(bytes: &[u8]) -> Result<f64> {
    Ok(LE::read_f64(slice(bytes, 0, 8)?))
}

/// Decode a `STRING` field: single-byte characters up to the first NUL, or
/// the whole field if there is none.
pub fn decode_string(bytes: &[u8]) -> String {
    // Technically Windows-1252, but in practice no non-ASCII occurs.
    bytes.iter().take_while(|&&ch| ch > 0).map(|&ch| ch as char).collect()
}

/// Decode a `WSTRING` field: UTF-16LE code units up to the first NUL unit,
/// reading at most `budget` bytes.
pub fn decode_wstring(bytes: &[u8], budget: usize) -> String {
    let units = bytes[..budget.min(bytes.len())]
        .chunks_exact(2)
        .map(LE::read_u16)
        .take_while(|&unit| unit != 0)
        .collect::<Vec<_>>();
    String::from_utf16_lossy(&units)
}

/// `TIME`: milliseconds, rendered as an ISO-8601 duration.
pub fn decode_time(bytes: &[u8]) -> Result<String> {
    let millis = read_u32(bytes, 0)?;
    Ok(iso8601_duration(i128::from(millis) * 1_000_000))
}

/// `LTIME`: nanoseconds, rendered as an ISO-8601 duration.
pub fn decode_ltime(bytes: &[u8]) -> Result<String> {
    Ok(iso8601_duration(i128::from(read_u64(bytes, 0)?)))
}

fn instant(secs: i64, nanos: u32) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, nanos).ok_or(DecodeError::InvalidTimestamp(secs))
}

/// `DATE`: seconds since the epoch, reduced to the UTC date.
pub fn decode_date(bytes: &[u8]) -> Result<NaiveDate> {
    Ok(decode_date_and_time(bytes)?.date_naive())
}

/// `DATE_AND_TIME`: seconds since the epoch as a UTC instant.
pub fn decode_date_and_time(bytes: &[u8]) -> Result<DateTime<Utc>> {
    instant(i64::from(read_u32(bytes, 0)?), 0)
}

/// `TIME_OF_DAY`: seconds since the epoch as a UTC instant.
pub fn decode_time_of_day(bytes: &[u8]) -> Result<DateTime<Utc>> {
    decode_date_and_time(bytes)
}

/// `LDATE_AND_TIME`: nanoseconds since the epoch, split into seconds and
/// nanoseconds.
pub fn decode_ldate_time(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let nanos = read_u64(bytes, 0)?;
    instant((nanos / NANOS_PER_SEC) as i64, (nanos % NANOS_PER_SEC) as u32)
}

/// Format a signed nanosecond count as an ISO-8601 duration (`PT1H2M3.5S`).
///
/// Hours are not folded into days.  Fractional seconds are printed in groups
/// of three digits, zero is `PT0S`.
pub fn iso8601_duration(nanos: i128) -> String {
    let mut out = String::from(if nanos < 0 { "-PT" } else { "PT" });
    let abs = nanos.unsigned_abs();
    let total_secs = abs / u128::from(NANOS_PER_SEC);
    let frac = (abs % u128::from(NANOS_PER_SEC)) as u32;
    let (hours, minutes, seconds) = (total_secs / 3600, total_secs / 60 % 60, total_secs % 60);

    let has_hours = hours != 0;
    let has_seconds = seconds != 0 || frac != 0;
    let has_minutes = minutes != 0 || (has_seconds && has_hours);
    if has_hours {
        out.push_str(&format!("{}H", hours));
    }
    if has_minutes {
        out.push_str(&format!("{}M", minutes));
    }
    if has_seconds || (!has_hours && !has_minutes) {
        out.push_str(&seconds.to_string());
        if frac != 0 {
            let digits = format!("{:09}", frac);
            let significant = digits.trim_end_matches('0').len();
            out.push('.');
            out.push_str(&digits[..(significant + 2) / 3 * 3]);
        }
        out.push('S');
    }
    out
}
