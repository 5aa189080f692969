//! Base64 VLQ codec used by the `mappings` field of a source map.

use thiserror::Error;

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE: i64 = 1 << VLQ_BASE_SHIFT;
const VLQ_BASE_MASK: i64 = VLQ_BASE - 1;
const VLQ_CONTINUATION_BIT: i64 = VLQ_BASE;

/// Error decoding a VLQ sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VlqError {
    /// A character outside the base64 alphabet
    #[error("invalid base64 digit '{0}'")]
    InvalidDigit(char),
    /// The input ended in the middle of a value
    #[error("unterminated VLQ value")]
    Unterminated,
    /// The decoded value does not fit into 32 bits
    #[error("VLQ value overflows")]
    Overflow,
}

/// Append the VLQ encoding of `value` to `out`.
///
/// ```
/// use percolate::sourcemap::vlq::encode;
///
/// let mut out = String::new();
/// encode(123, &mut out);
/// assert_eq!(out, "2H");
/// ```
pub fn encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 { ((-value) << 1) | 1 } else { value << 1 };

    loop {
        let mut digit = vlq & VLQ_BASE_MASK;
        vlq >>= VLQ_BASE_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        out.push(BASE64_CHARS[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn decode_digit(c: char) -> Result<i64, VlqError> {
    let value = match c {
        'A'..='Z' => c as i64 - 'A' as i64,
        'a'..='z' => c as i64 - 'a' as i64 + 26,
        '0'..='9' => c as i64 - '0' as i64 + 52,
        '+' => 62,
        '/' => 63,
        _ => return Err(VlqError::InvalidDigit(c)),
    };
    Ok(value)
}

/// Decode every value in a single segment (e.g. `"AAgBC"`).
pub fn decode(segment: &str) -> Result<Vec<i64>, VlqError> {
    let mut values = Vec::new();
    let mut accumulator: i64 = 0;
    let mut shift: u32 = 0;
    let mut in_value = false;

    for c in segment.chars() {
        let digit = decode_digit(c)?;
        in_value = true;

        if shift > 32 {
            return Err(VlqError::Overflow);
        }
        accumulator += (digit & VLQ_BASE_MASK) << shift;

        if digit & VLQ_CONTINUATION_BIT != 0 {
            shift += VLQ_BASE_SHIFT;
            continue;
        }

        let negative = accumulator & 1 == 1;
        let magnitude = accumulator >> 1;
        values.push(if negative { -magnitude } else { magnitude });

        accumulator = 0;
        shift = 0;
        in_value = false;
    }

    if in_value {
        return Err(VlqError::Unterminated);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: i64) -> String {
        let mut out = String::new();
        encode(value, &mut out);
        out
    }

    #[test]
    fn test_encode_small_values() {
        assert_eq!(encoded(0), "A");
        assert_eq!(encoded(1), "C");
        assert_eq!(encoded(-1), "D");
        assert_eq!(encoded(15), "e");
    }

    #[test]
    fn test_encode_multi_digit() {
        assert_eq!(encoded(16), "gB");
        assert_eq!(encoded(-16), "hB");
        assert_eq!(encoded(123), "2H");
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode("AAAA").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode("CADgB").unwrap(), vec![1, 0, -1, 16]);
        assert_eq!(decode("2H").unwrap(), vec![123]);
    }

    #[test]
    fn test_decode_invalid_digit() {
        assert_eq!(decode("A*"), Err(VlqError::InvalidDigit('*')));
    }

    #[test]
    fn test_decode_unterminated() {
        assert_eq!(decode("g"), Err(VlqError::Unterminated));
    }

    #[test]
    fn test_large_values_survive() {
        for value in [1_000, -1_000, 65_535, -65_536, 1 << 30] {
            let text = encoded(value);
            assert_eq!(decode(&text).unwrap(), vec![value]);
        }
    }
}
