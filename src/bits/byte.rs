//! Variable-width bit sequences.
//!
//! A [`Byte`] is an ordered sequence of bits, most significant bit first.
//! Memory cells and registers always hold bytes of exactly the configured
//! architecture width; ALU results may be longer (a carry extends the
//! result by one bit, products can be twice as wide) and are truncated by
//! the CPU layer.

use std::fmt;
use serde::{Serialize, Deserialize};

/// An ordered bit sequence, most significant bit first.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Byte {
    bits: Vec<bool>,
}

impl Byte {
    /// An all-zero byte of the given width.
    #[inline]
    pub fn zero(width: usize) -> Self {
        Self { bits: vec![false; width] }
    }

    /// Wrap a bit vector (MSB first) as-is.
    #[inline]
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Copy a bit slice (MSB first).
    #[inline]
    pub fn from_slice(bits: &[bool]) -> Self {
        Self { bits: bits.to_vec() }
    }

    /// The single-bit byte `1`.
    #[inline]
    pub fn one() -> Self {
        Self { bits: vec![true] }
    }

    /// Unsigned value as a byte of exactly `width` bits.
    ///
    /// Bits of `value` above `width` are discarded.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let bits = (0..width)
            .rev()
            .map(|i| i < 64 && (value >> i) & 1 == 1)
            .collect();
        Self { bits }
    }

    /// Number of bits.
    #[inline]
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// True for the empty sequence.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// The underlying bits, MSB first.
    #[inline]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Consume into the underlying bit vector.
    #[inline]
    pub fn into_bits(self) -> Vec<bool> {
        self.bits
    }

    /// Bit at `index` counted from the most significant end.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        self.bits[index]
    }

    /// The most significant bit (the sign bit in two's complement).
    ///
    /// The empty byte has no sign and reports `false`.
    #[inline]
    pub fn msb(&self) -> bool {
        self.bits.first().copied().unwrap_or(false)
    }

    /// True if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.bits.iter().all(|b| !b)
    }

    /// Left-pad with zeros up to `width`. Longer bytes are returned unchanged.
    pub fn padded(&self, width: usize) -> Self {
        if self.bits.len() >= width {
            return self.clone();
        }
        let mut bits = vec![false; width - self.bits.len()];
        bits.extend_from_slice(&self.bits);
        Self { bits }
    }

    /// The low `width` bits, zero-padded if the byte is shorter.
    pub fn low_bits(&self, width: usize) -> Self {
        if self.bits.len() <= width {
            return self.padded(width);
        }
        Self { bits: self.bits[self.bits.len() - width..].to_vec() }
    }

    /// Unsigned value of the low 64 bits.
    pub fn to_u64(&self) -> u64 {
        let start = self.bits.len().saturating_sub(64);
        self.bits[start..]
            .iter()
            .fold(0u64, |acc, &bit| (acc << 1) | bit as u64)
    }

    /// True if any bit above the low `width` bits is set.
    pub fn exceeds(&self, width: usize) -> bool {
        self.bits.len() > width
            && self.bits[..self.bits.len() - width].iter().any(|&b| b)
    }

    /// Signed two's-complement value. See [`crate::bits::codec::bits_to_int`].
    #[inline]
    pub fn to_i64(&self) -> i64 {
        crate::bits::codec::bits_to_int(self)
    }
}

impl fmt::Debug for Byte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Byte(0b{} = {})", self, self.to_i64())
    }
}

impl fmt::Display for Byte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            write!(f, "{}", if bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl From<Vec<bool>> for Byte {
    fn from(bits: Vec<bool>) -> Self {
        Byte::from_bits(bits)
    }
}

impl From<&[bool]> for Byte {
    fn from(bits: &[bool]) -> Self {
        Byte::from_slice(bits)
    }
}

impl AsRef<[bool]> for Byte {
    fn as_ref(&self) -> &[bool] {
        &self.bits
    }
}
