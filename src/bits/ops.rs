//! Bitwise logic trait.
//!
//! Defines the logic gates that apply to single bits and, bit by bit, to
//! whole bytes.

use crate::bits::Byte;

/// Trait for types that support bitwise logic.
pub trait BitOps {
    /// The output type of every gate.
    type Output;

    /// Logical NOT.
    fn bit_not(&self) -> Self::Output;

    /// Logical AND.
    fn bit_and(&self, other: &Self) -> Self::Output;

    /// Logical OR.
    fn bit_or(&self, other: &Self) -> Self::Output;

    /// NOT of AND.
    fn bit_nand(&self, other: &Self) -> Self::Output;

    /// NOT of OR.
    fn bit_nor(&self, other: &Self) -> Self::Output;

    /// Exclusive OR, built as `(a || b) && !(a && b)`.
    fn bit_xor(&self, other: &Self) -> Self::Output;
}

impl BitOps for bool {
    type Output = bool;

    #[inline]
    fn bit_not(&self) -> bool {
        !*self
    }

    #[inline]
    fn bit_and(&self, other: &Self) -> bool {
        *self && *other
    }

    #[inline]
    fn bit_or(&self, other: &Self) -> bool {
        *self || *other
    }

    #[inline]
    fn bit_nand(&self, other: &Self) -> bool {
        !(*self && *other)
    }

    #[inline]
    fn bit_nor(&self, other: &Self) -> bool {
        !(*self || *other)
    }

    #[inline]
    fn bit_xor(&self, other: &Self) -> bool {
        (*self || *other) && !(*self && *other)
    }
}

/// Apply a two-input gate bit by bit after zero-padding both bytes to the
/// wider of the two widths.
fn zip_with(a: &Byte, b: &Byte, gate: impl Fn(&bool, &bool) -> bool) -> Byte {
    let width = a.width().max(b.width());
    let a = a.padded(width);
    let b = b.padded(width);
    let bits = a
        .bits()
        .iter()
        .zip(b.bits())
        .map(|(x, y)| gate(x, y))
        .collect();
    Byte::from_bits(bits)
}

impl BitOps for Byte {
    type Output = Byte;

    fn bit_not(&self) -> Byte {
        Byte::from_bits(self.bits().iter().map(|b| !b).collect())
    }

    fn bit_and(&self, other: &Self) -> Byte {
        zip_with(self, other, |x, y| x.bit_and(y))
    }

    fn bit_or(&self, other: &Self) -> Byte {
        zip_with(self, other, |x, y| x.bit_or(y))
    }

    fn bit_nand(&self, other: &Self) -> Byte {
        zip_with(self, other, |x, y| x.bit_nand(y))
    }

    fn bit_nor(&self, other: &Self) -> Byte {
        zip_with(self, other, |x, y| x.bit_nor(y))
    }

    fn bit_xor(&self, other: &Self) -> Byte {
        zip_with(self, other, |x, y| x.bit_xor(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIRS: [(bool, bool); 4] = [(false, false), (false, true), (true, false), (true, true)];

    #[test]
    fn test_truth_tables() {
        for (a, b) in PAIRS {
            assert_eq!(a.bit_and(&b), a && b);
            assert_eq!(a.bit_or(&b), a || b);
            assert_eq!(a.bit_nand(&b), !(a && b));
            assert_eq!(a.bit_nor(&b), !(a || b));
            assert_eq!(a.bit_xor(&b), a != b);
        }
        assert!(false.bit_not());
        assert!(!true.bit_not());
    }

    #[test]
    fn test_byte_gates() {
        let a = Byte::from_u64(0b1100, 4);
        let b = Byte::from_u64(0b1010, 4);

        assert_eq!(a.bit_and(&b).to_u64(), 0b1000);
        assert_eq!(a.bit_or(&b).to_u64(), 0b1110);
        assert_eq!(a.bit_xor(&b).to_u64(), 0b0110);
        assert_eq!(a.bit_nand(&b).to_u64(), 0b0111);
        assert_eq!(a.bit_nor(&b).to_u64(), 0b0001);
        assert_eq!(a.bit_not().to_u64(), 0b0011);
    }

    #[test]
    fn test_byte_gates_pad_shorter_operand() {
        let a = Byte::from_u64(0b1111, 4);
        let b = Byte::from_u64(0b01, 2);
        let result = a.bit_and(&b);
        assert_eq!(result.width(), 4);
        assert_eq!(result.to_u64(), 0b0001);
    }
}
