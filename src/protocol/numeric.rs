//! Fast numeric codec
//!
//! Integer <-> decimal ASCII conversion for request arguments and reply
//! lines. Magnitudes up to [`CACHE_LIMIT`] are served from a table built
//! once on first use; larger values fall back to general formatting.

use std::sync::OnceLock;

use bytes::{BufMut, BytesMut};

use crate::error::{KvError, Result};

/// Largest magnitude served from the digit cache
pub const CACHE_LIMIT: u32 = 65535;

/// Bytes reserved per cached entry ("65535" is five digits)
const SLOT_WIDTH: usize = 5;

/// Digits of every value in `0..=CACHE_LIMIT`, right-aligned in fixed slots.
struct DigitCache {
    digits: Box<[u8]>,
    lengths: Box<[u8]>,
}

impl DigitCache {
    fn build() -> Self {
        let count = CACHE_LIMIT as usize + 1;
        let mut digits = vec![b'0'; count * SLOT_WIDTH].into_boxed_slice();
        let mut lengths = vec![0u8; count].into_boxed_slice();

        for value in 0..count {
            let slot = &mut digits[value * SLOT_WIDTH..(value + 1) * SLOT_WIDTH];
            let mut n = value;
            let mut len = 0;
            loop {
                slot[SLOT_WIDTH - 1 - len] = b'0' + (n % 10) as u8;
                len += 1;
                n /= 10;
                if n == 0 {
                    break;
                }
            }
            lengths[value] = len as u8;
        }

        Self { digits, lengths }
    }

    fn get(&self, value: u32) -> &[u8] {
        let index = value as usize;
        let len = self.lengths[index] as usize;
        let end = (index + 1) * SLOT_WIDTH;
        &self.digits[end - len..end]
    }
}

static CACHE: OnceLock<DigitCache> = OnceLock::new();

fn cache() -> &'static DigitCache {
    CACHE.get_or_init(DigitCache::build)
}

/// Cached digits for a magnitude within `0..=CACHE_LIMIT`
pub fn cached_digits(magnitude: u32) -> Option<&'static [u8]> {
    if magnitude <= CACHE_LIMIT {
        Some(cache().get(magnitude))
    } else {
        None
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Append the decimal ASCII form of `n` to `out`
pub fn encode_into(n: i64, out: &mut BytesMut) {
    let magnitude = n.unsigned_abs();
    if magnitude <= CACHE_LIMIT as u64 {
        if n < 0 {
            out.put_u8(b'-');
        }
        out.put_slice(cache().get(magnitude as u32));
    } else {
        out.put_slice(n.to_string().as_bytes());
    }
}

/// Decimal ASCII form of `n`
pub fn encode(n: i64) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(20);
    encode_into(n, &mut out);
    out.to_vec()
}

// =============================================================================
// Decoding
// =============================================================================

/// Split an optional sign and validate that the rest is `1..=max_digits`
/// ASCII digits
fn split_digits(bytes: &[u8], max_digits: usize) -> Result<(bool, &[u8])> {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    if digits.is_empty() {
        return Err(KvError::argument(format!(
            "not a number: {:?}",
            String::from_utf8_lossy(bytes)
        )));
    }
    if let Some(bad) = digits.iter().find(|b| !b.is_ascii_digit()) {
        return Err(KvError::argument(format!(
            "invalid digit 0x{:02x} in {:?}",
            bad,
            String::from_utf8_lossy(bytes)
        )));
    }
    if digits.len() > max_digits {
        return Err(KvError::argument(format!(
            "too many digits ({}, max {}) in {:?}",
            digits.len(),
            max_digits,
            String::from_utf8_lossy(bytes)
        )));
    }

    Ok((negative, digits))
}

/// Parse a signed 64-bit decimal
pub fn decode_i64(bytes: &[u8]) -> Result<i64> {
    let (negative, digits) = split_digits(bytes, 19)?;

    // Accumulate toward the sign so that i64::MIN parses
    let mut value: i64 = 0;
    for &d in digits {
        let digit = (d - b'0') as i64;
        value = value
            .checked_mul(10)
            .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
            .ok_or_else(|| {
                KvError::argument(format!(
                    "number out of range: {}",
                    String::from_utf8_lossy(bytes)
                ))
            })?;
    }
    Ok(value)
}

/// Parse a signed 32-bit decimal
pub fn decode_i32(bytes: &[u8]) -> Result<i32> {
    split_digits(bytes, 10)?;
    let value = decode_i64(bytes)?;
    i32::try_from(value).map_err(|_| {
        KvError::argument(format!("number out of range for i32: {}", value))
    })
}

/// Validate a floating-point score token (sorted-set scores)
pub fn validate_score(bytes: &[u8]) -> Result<()> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| KvError::argument("score is not valid UTF-8"))?;
    match text.parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(()),
        _ => Err(KvError::argument(format!("invalid score: {:?}", text))),
    }
}
