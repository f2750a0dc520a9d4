//! Integer and text conversions for bit sequences.
//!
//! Negative integers use two's complement, built the textbook way:
//! encode the magnitude, pad it to the target width, complement every bit
//! and add one.

use crate::bits::{alu, Byte};
use thiserror::Error;

/// Encode a signed integer as a two's-complement byte of `width` bits.
///
/// A magnitude that needs more than `width` bits yields a longer byte; the
/// caller decides whether that is an error. `-2^(width-1)` encodes as
/// `1` followed by zeros.
pub fn int_to_bits(value: i64, width: usize) -> Byte {
    let magnitude = value.unsigned_abs();
    let magnitude = Byte::from_u64(magnitude, necessary_bit_count(magnitude)).padded(width);

    if value >= 0 {
        return magnitude;
    }

    let complement: Vec<bool> = magnitude.bits().iter().map(|&b| !b).collect();
    let negated = alu::increment(&Byte::from_bits(complement));
    // A non-zero magnitude never carries out of the complement, so the
    // length is unchanged. Redundant leading zeros only appear when the
    // magnitude was wider than `width`.
    let negated = negated.low_bits(magnitude.width());
    strip_leading_zeros(negated, width)
}

/// Decode a two's-complement byte.
///
/// The first bit is the sign. A negative value is the unsigned value of the
/// remaining bits minus `2^(width-1)`, computed without wrapping. Bytes
/// wider than 64 bits are read through their low 64 bits.
pub fn bits_to_int(byte: &Byte) -> i64 {
    let byte = if byte.width() > 64 { byte.low_bits(64) } else { byte.clone() };
    let width = byte.width();
    if width == 0 {
        return 0;
    }

    let rest = Byte::from_slice(&byte.bits()[1..]).to_u64() as i128;
    if !byte.msb() {
        return rest as i64;
    }

    let weight = 1i128 << (width - 1);
    (rest - weight) as i64
}

/// Render as a plain `0`/`1` string, MSB first.
pub fn bits_to_binary_string(byte: &Byte) -> String {
    byte.to_string()
}

/// Parse a `0`/`1` string. Whitespace and `_` separators are ignored.
pub fn binary_string_to_bits(text: &str) -> Result<Byte, CodecError> {
    let mut bits = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '0' => bits.push(false),
            '1' => bits.push(true),
            c if c.is_whitespace() || c == '_' => {}
            c => return Err(CodecError::InvalidDigit { digit: c, radix: 2 }),
        }
    }
    Ok(Byte::from_bits(bits))
}

/// Render as lowercase hex, one digit per nibble.
///
/// The byte is left-padded to a multiple of four bits first, so an 8-bit
/// byte gives two digits and a 10-bit byte gives three.
pub fn bits_to_hex(byte: &Byte) -> String {
    let width = byte.width().div_ceil(4) * 4;
    let padded = byte.padded(width);
    padded
        .bits()
        .chunks(4)
        .map(|nibble| {
            let value = nibble.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32);
            char::from_digit(value, 16).unwrap_or('0')
        })
        .collect()
}

/// Parse hex digits into a byte of exactly `width` bits.
///
/// Whitespace, `_` and an optional `0x`/`$` prefix are accepted. Set bits
/// that do not fit into `width` are an error.
pub fn hex_to_bits(text: &str, width: usize) -> Result<Byte, CodecError> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix('$'))
        .unwrap_or(text);

    let mut bits = Vec::with_capacity(text.len() * 4);
    for c in text.chars() {
        if c.is_whitespace() || c == '_' {
            continue;
        }
        let value = c
            .to_digit(16)
            .ok_or(CodecError::InvalidDigit { digit: c, radix: 16 })?;
        bits.extend((0..4).rev().map(|i| (value >> i) & 1 == 1));
    }

    let byte = Byte::from_bits(bits);
    if byte.exceeds(width) {
        return Err(CodecError::TooWide { width });
    }
    Ok(byte.low_bits(width))
}

/// Minimum number of bits needed to write `n` in unsigned binary.
///
/// Zero still takes one bit.
pub fn necessary_bit_count(n: u64) -> usize {
    if n == 0 {
        return 1;
    }
    (64 - n.leading_zeros()) as usize
}

fn strip_leading_zeros(byte: Byte, width: usize) -> Byte {
    let bits = byte.bits();
    let excess = bits.len().saturating_sub(width);
    let skip = bits[..excess].iter().take_while(|&&b| !b).count();
    Byte::from_slice(&bits[skip..])
}

/// Errors that can occur when parsing textual bit representations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid base-{radix} digit: '{digit}'")]
    InvalidDigit { digit: char, radix: u32 },

    #[error("value does not fit in {width} bits")]
    TooWide { width: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_int_to_bits_positive() {
        assert_eq!(int_to_bits(5, 8).to_string(), "00000101");
        assert_eq!(int_to_bits(0, 4).to_string(), "0000");
        assert_eq!(int_to_bits(127, 8).to_string(), "01111111");
    }

    #[test]
    fn test_int_to_bits_negative() {
        assert_eq!(int_to_bits(-1, 8).to_string(), "11111111");
        assert_eq!(int_to_bits(-3, 8).to_string(), "11111101");
        assert_eq!(int_to_bits(-1, 1).to_string(), "1");
    }

    #[test]
    fn test_most_negative_value() {
        let min = int_to_bits(-128, 8);
        assert_eq!(min.to_string(), "10000000");
        assert_eq!(bits_to_int(&min), -128);

        let min4 = int_to_bits(-8, 4);
        assert_eq!(min4.to_string(), "1000");
        assert_eq!(bits_to_int(&min4), -8);
    }

    #[test]
    fn test_int_to_bits_overwide() {
        // Positive overflow keeps every magnitude bit.
        assert_eq!(int_to_bits(300, 8).to_string(), "100101100");
        // Negative overflow collapses to the value mod 2^8.
        assert_eq!(int_to_bits(-200, 8).to_string(), "00111000");
    }

    #[test]
    fn test_bits_to_int_wide_sign() {
        // The sign weight is computed without wrapping, even at 32 and 64 bits.
        assert_eq!(bits_to_int(&int_to_bits(-1, 32)), -1);
        assert_eq!(bits_to_int(&int_to_bits(i32::MIN as i64, 32)), i32::MIN as i64);
        assert_eq!(bits_to_int(&int_to_bits(i64::MIN, 64)), i64::MIN);
        assert_eq!(bits_to_int(&int_to_bits(i64::MAX, 64)), i64::MAX);
    }

    #[test]
    fn test_binary_string_roundtrip() {
        let b = binary_string_to_bits("0010 1101").unwrap();
        assert_eq!(b.width(), 8);
        assert_eq!(bits_to_binary_string(&b), "00101101");
        assert!(binary_string_to_bits("0102").is_err());
    }

    #[test]
    fn test_hex() {
        let b = int_to_bits(0x2d, 8);
        assert_eq!(bits_to_hex(&b), "2d");
        assert_eq!(hex_to_bits("2d", 8).unwrap(), b);
        assert_eq!(hex_to_bits("$ff", 8).unwrap().to_string(), "11111111");
        assert_eq!(bits_to_hex(&int_to_bits(-1, 10)), "3ff");
        assert_eq!(hex_to_bits("3ff", 10).unwrap(), int_to_bits(-1, 10));
        assert_eq!(hex_to_bits("1ff", 8), Err(CodecError::TooWide { width: 8 }));
        assert!(matches!(hex_to_bits("zz", 8), Err(CodecError::InvalidDigit { digit: 'z', .. })));
    }

    #[test]
    fn test_necessary_bit_count() {
        assert_eq!(necessary_bit_count(0), 1);
        assert_eq!(necessary_bit_count(1), 1);
        assert_eq!(necessary_bit_count(2), 2);
        assert_eq!(necessary_bit_count(255), 8);
        assert_eq!(necessary_bit_count(256), 9);
        assert_eq!(necessary_bit_count(u64::MAX), 64);
    }

    proptest! {
        #[test]
        fn prop_int_roundtrip(width in 1usize..=64, raw in any::<i64>()) {
            let shift = 64 - width as u32;
            // Sign-truncate `raw` into the representable range for `width`.
            let value = (raw << shift) >> shift;
            let byte = int_to_bits(value, width);
            prop_assert_eq!(byte.width(), width);
            prop_assert_eq!(bits_to_int(&byte), value);
        }

        #[test]
        fn prop_hex_roundtrip(width in 1usize..=64, raw in any::<u64>()) {
            let byte = Byte::from_u64(raw, width);
            prop_assert_eq!(hex_to_bits(&bits_to_hex(&byte), width).unwrap(), byte);
        }
    }
}
