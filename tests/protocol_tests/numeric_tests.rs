//! Numeric Codec Tests

use bytes::BytesMut;
use kvwire::protocol::numeric::{self, CACHE_LIMIT};
use kvwire::KvError;

// =============================================================================
// Inverse Law
// =============================================================================

#[test]
fn test_cached_range_round_trips() {
    let limit = CACHE_LIMIT as i64;
    for n in -limit..=limit {
        let encoded = numeric::encode(n);
        assert_eq!(encoded, n.to_string().as_bytes(), "encode({})", n);
        assert_eq!(numeric::decode_i64(&encoded).unwrap(), n);
    }
}

#[test]
fn test_out_of_range_sample_round_trips() {
    let mut sample = vec![
        65536,
        -65536,
        100_000,
        -100_000,
        i32::MAX as i64,
        i32::MIN as i64,
        i64::MAX,
        i64::MIN,
        i64::MAX - 1,
        i64::MIN + 1,
    ];
    // Powers of ten and their neighbours
    let mut p: i64 = 100_000;
    while let Some(next) = p.checked_mul(10) {
        sample.extend_from_slice(&[p - 1, p, p + 1, -p]);
        p = next;
    }

    for n in sample {
        let encoded = numeric::encode(n);
        assert_eq!(encoded, n.to_string().as_bytes(), "encode({})", n);
        assert_eq!(numeric::decode_i64(&encoded).unwrap(), n);
    }
}

#[test]
fn test_encode_into_appends() {
    let mut out = BytesMut::from(&b"len="[..]);
    numeric::encode_into(-42, &mut out);
    numeric::encode_into(1_000_000, &mut out);
    assert_eq!(&out[..], b"len=-421000000");
}

// =============================================================================
// Decode Validation
// =============================================================================

#[test]
fn test_decode_accepts_signs_and_leading_zeros() {
    assert_eq!(numeric::decode_i64(b"+42").unwrap(), 42);
    assert_eq!(numeric::decode_i64(b"-0").unwrap(), 0);
    assert_eq!(numeric::decode_i64(b"007").unwrap(), 7);
}

#[test]
fn test_decode_rejects_malformed_input() {
    let cases: &[&[u8]] = &[
        b"", b"-", b"+", b"12a", b"1 2", b" 1", b"1\r", b"--1", b"+-1", b"0x10", b"1.5",
    ];
    for case in cases {
        let err = numeric::decode_i64(case).unwrap_err();
        assert!(
            matches!(err, KvError::Argument(_)),
            "{:?} gave {:?}",
            String::from_utf8_lossy(case),
            err
        );
    }
}

#[test]
fn test_decode_rejects_too_many_digits() {
    // 20 digits never fit an i64, even with leading zeros
    assert!(numeric::decode_i64(b"00000000000000000001").is_err());
    assert!(numeric::decode_i64(b"9223372036854775808").is_err());
    assert!(numeric::decode_i64(b"-9223372036854775809").is_err());
}

#[test]
fn test_decode_i32_width() {
    assert_eq!(numeric::decode_i32(b"2147483647").unwrap(), i32::MAX);
    assert_eq!(numeric::decode_i32(b"-2147483648").unwrap(), i32::MIN);
    assert!(numeric::decode_i32(b"2147483648").is_err());
    assert!(numeric::decode_i32(b"12345678901").is_err());
}

#[test]
fn test_validate_score() {
    assert!(numeric::validate_score(b"1.5").is_ok());
    assert!(numeric::validate_score(b"-3").is_ok());
    assert!(numeric::validate_score(b"2e10").is_ok());
    assert!(numeric::validate_score(b"abc").is_err());
    assert!(numeric::validate_score(b"inf").is_err());
    assert!(numeric::validate_score(b"NaN").is_err());
    assert!(numeric::validate_score(b"").is_err());
}
