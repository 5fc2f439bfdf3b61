// Tests for the byte codec.

use chrono::{NaiveDate, TimeZone, Utc};

use crate::codec::*;
use crate::errors::DecodeError;

#[test]
fn test_integers() {
    let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x88];
    assert_eq!(read_u16(&bytes, 0).unwrap(), 0x0201);
    assert_eq!(read_i16(&bytes, 6).unwrap(), 0x8807u16 as i16);
    assert_eq!(read_u32(&bytes, 1).unwrap(), 0x05040302);
    assert_eq!(read_i32(&bytes, 4).unwrap(), 0x88070605u32 as i32);
    assert_eq!(read_u64(&bytes, 0).unwrap(), 0x8807060504030201);
    assert_eq!(read_i64(&bytes, 0).unwrap(), 0x8807060504030201u64 as i64);

    assert_eq!(read_u32(&bytes, 6),
               Err(DecodeError::InsufficientBytes { needed: 10, available: 8 }));
    assert_eq!(read_u16(&bytes, usize::MAX),
               Err(DecodeError::InsufficientBytes { needed: usize::MAX, available: 8 }));

    assert_eq!(encode_i16(-2), [0xFE, 0xFF]);
    assert_eq!(encode_i32(0x01020304), [4, 3, 2, 1]);
}

#[test]
fn test_length() {
    assert_eq!(read_length(&[0x10, 0, 0, 0], 0).unwrap(), 16);
    assert_eq!(read_length(&[0xFF, 0xFF, 0xFF, 0xFF], 0), Err(DecodeError::NegativeLength(-1)));
}

#[test]
fn test_scalars() {
    assert!(decode_bool(&[1]).unwrap());
    assert!(decode_bool(&[0x80]).unwrap());
    assert!(!decode_bool(&[0]).unwrap());
    assert!(decode_bool(&[]).is_err());

    assert_eq!(decode_real(&1.5f32.to_le_bytes()).unwrap(), 1.5);
    assert_eq!(decode_lreal(&(-2.25f64).to_le_bytes()).unwrap(), -2.25);
    assert!(decode_lreal(&[0; 4]).is_err());
}

#[test]
fn test_strings() {
    assert_eq!(decode_string(b"hello\0world"), "hello");
    assert_eq!(decode_string(b"full"), "full");
    assert_eq!(decode_string(b""), "");

    let wide = "Grüße".encode_utf16().flat_map(|u| u.to_le_bytes()).chain(vec![0, 0, 0x41, 0]);
    let wide = wide.collect::<Vec<_>>();
    assert_eq!(decode_wstring(&wide, wide.len()), "Grüße");
    // The budget cuts the string short.
    assert_eq!(decode_wstring(&wide, 4), "Gr");
    assert_eq!(decode_wstring(&wide, 1000), "Grüße");
}

#[test]
fn test_durations() {
    assert_eq!(iso8601_duration(0), "PT0S");
    assert_eq!(iso8601_duration(1_500_000_000), "PT1.500S");
    assert_eq!(iso8601_duration(3_600_000_000_000), "PT1H");
    assert_eq!(iso8601_duration(3_601_000_000_000), "PT1H0M1S");
    assert_eq!(iso8601_duration(90_000_000_000), "PT1M30S");
    assert_eq!(iso8601_duration(90_000_000_000_000), "PT25H");
    assert_eq!(iso8601_duration(1_500_000), "PT0.001500S");
    assert_eq!(iso8601_duration(1), "PT0.000000001S");
    assert_eq!(iso8601_duration(-2_000_000_000), "-PT2S");

    assert_eq!(decode_time(&90_000u32.to_le_bytes()).unwrap(), "PT1M30S");
    assert_eq!(decode_ltime(&1_500_000_000u64.to_le_bytes()).unwrap(), "PT1.500S");
    assert!(decode_time(&[0; 2]).is_err());
}

#[test]
fn test_dates() {
    let secs = 365 * 86400 + 3600u32;
    assert_eq!(decode_date(&secs.to_le_bytes()).unwrap(), NaiveDate::from_ymd_opt(1971, 1, 1).unwrap());
    assert_eq!(decode_date_and_time(&secs.to_le_bytes()).unwrap(),
               Utc.with_ymd_and_hms(1971, 1, 1, 1, 0, 0).unwrap());
    assert_eq!(decode_time_of_day(&3661u32.to_le_bytes()).unwrap(),
               Utc.with_ymd_and_hms(1970, 1, 1, 1, 1, 1).unwrap());

    let ldt = decode_ldate_time(&1_500_000_000u64.to_le_bytes()).unwrap();
    assert_eq!(ldt.timestamp(), 1);
    assert_eq!(ldt.timestamp_subsec_nanos(), 500_000_000);
    assert!(decode_ldate_time(&[0; 7]).is_err());
}
