//! Base64 variable-length quantities.
//!
//! Each base64 digit carries five value bits and a continuation bit (`0x20`).
//! Digits are little-endian: the first digit holds the lowest five bits. The
//! lowest bit of the assembled value is the sign.

use crate::error::SourceMapError;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_CONTINUATION_BIT: u8 = 1 << VLQ_BASE_SHIFT;
const VLQ_BASE_MASK: u8 = VLQ_CONTINUATION_BIT - 1;

/// Values wider than this are rejected rather than silently wrapped.
const MAX_VALUE_BITS: u32 = 32;

fn base64_value(digit: u8) -> Option<u8> {
    match digit {
        b'A'..=b'Z' => Some(digit - b'A'),
        b'a'..=b'z' => Some(digit - b'a' + 26),
        b'0'..=b'9' => Some(digit - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decode every value in one comma-delimited mapping segment.
pub fn decode_segment(segment: &str) -> Result<Vec<i64>, SourceMapError> {
    let mut values = Vec::with_capacity(5);
    let mut bytes = segment.bytes();

    while let Some(first) = bytes.next() {
        let mut accumulated: u64 = 0;
        let mut shift = 0;
        let mut digit = first;
        loop {
            let value = base64_value(digit).ok_or(SourceMapError::InvalidBase64(digit as char))?;
            if shift >= MAX_VALUE_BITS + 1 {
                return Err(SourceMapError::Decoding(format!(
                    "value in segment {segment:?} exceeds {MAX_VALUE_BITS} bits"
                )));
            }
            accumulated |= u64::from(value & VLQ_BASE_MASK) << shift;
            shift += VLQ_BASE_SHIFT;

            if value & VLQ_CONTINUATION_BIT == 0 {
                break;
            }
            digit = bytes.next().ok_or_else(|| {
                SourceMapError::Decoding(format!("truncated value in segment {segment:?}"))
            })?;
        }

        let magnitude = (accumulated >> 1) as i64;
        values.push(if accumulated & 1 == 1 {
            -magnitude
        } else {
            magnitude
        });
    }

    Ok(values)
}

/// Append the VLQ encoding of `value` to `out`.
pub fn encode(value: i64, out: &mut String) {
    let mut remaining = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        value.unsigned_abs() << 1
    };
    loop {
        let mut digit = (remaining & u64::from(VLQ_BASE_MASK)) as u8;
        remaining >>= VLQ_BASE_SHIFT;
        if remaining > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        out.push(BASE64_ALPHABET[digit as usize] as char);
        if remaining == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_digits() {
        assert_eq!(decode_segment("A").unwrap(), vec![0]);
        assert_eq!(decode_segment("C").unwrap(), vec![1]);
        assert_eq!(decode_segment("D").unwrap(), vec![-1]);
        assert_eq!(decode_segment("Q").unwrap(), vec![8]);
        assert_eq!(decode_segment("P").unwrap(), vec![-7]);
    }

    #[test]
    fn continuation() {
        // 16 shifts to 32: low five bits zero with continuation, then 1
        assert_eq!(decode_segment("gB").unwrap(), vec![16]);
        assert_eq!(decode_segment("AAgBC").unwrap(), vec![0, 0, 16, 1]);
    }

    #[test]
    fn encode_matches_decode() {
        let values = [0, 1, -1, 15, 16, -16, 1000, -123456, i32::MAX as i64];
        let mut encoded = String::new();
        for value in values {
            encode(value, &mut encoded);
        }
        assert_eq!(decode_segment(&encoded).unwrap(), values);
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        assert!(matches!(
            decode_segment("AA*A"),
            Err(SourceMapError::InvalidBase64('*'))
        ));
    }

    #[test]
    fn rejects_truncated_value() {
        assert!(matches!(
            decode_segment("Ag"),
            Err(SourceMapError::Decoding(_))
        ));
    }

    #[test]
    fn rejects_overlong_value() {
        assert!(matches!(
            decode_segment("gggggggggB"),
            Err(SourceMapError::Decoding(_))
        ));
    }
}
