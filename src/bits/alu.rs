//! Bit-level arithmetic.
//!
//! Every operation is a pure function over [`Byte`]s. Operands of different
//! widths are zero-extended to the wider one. Results are *not* truncated:
//! a carry out of the top bit extends the sum by one bit, products grow as
//! wide as they need. The CPU layer captures flags from these raw results
//! and truncates to the architecture width.
//!
//! Comparisons are unsigned magnitude comparisons. Callers that need
//! signed ordering must look at the sign bit themselves.

use crate::bits::{BitOps, Byte};

/// One-bit full adder, returning `(sum, carry_out)`.
#[inline]
pub fn full_adder(a: bool, b: bool, carry: bool) -> (bool, bool) {
    let a_xor_b = a.bit_xor(&b);
    let sum = a_xor_b.bit_xor(&carry);
    let carry_out = (a_xor_b && carry) || (a && b);
    (sum, carry_out)
}

/// Ripple-carry addition from the least significant bit up.
///
/// A carry out of the top bit extends the result by one bit.
pub fn add(a: &Byte, b: &Byte) -> Byte {
    let width = a.width().max(b.width());
    let a = a.padded(width);
    let b = b.padded(width);

    let mut sum = vec![false; width];
    let mut carry = false;

    for i in (0..width).rev() {
        let (bit, next) = full_adder(a.get(i), b.get(i), carry);
        sum[i] = bit;
        carry = next;
    }

    if carry {
        sum.insert(0, true);
    }

    Byte::from_bits(sum)
}

/// Add one.
#[inline]
pub fn increment(a: &Byte) -> Byte {
    add(a, &Byte::one())
}

/// Bitwise complement of `a` after zero-padding it to `width`.
pub fn complement(a: &Byte, width: usize) -> Byte {
    a.padded(width).bit_not()
}

/// Two's-complement negation: complement of `a` padded to `width`, plus one.
///
/// The result is raw: negating zero gives `1` followed by `width` zeros.
/// Take the low `width` bits for the value modulo `2^width`.
pub fn negate(a: &Byte, width: usize) -> Byte {
    increment(&complement(a, width))
}

/// `a - b` as `a + negate(b)`, untruncated.
pub fn subtract(a: &Byte, b: &Byte, width: usize) -> Byte {
    add(a, &negate(b, width))
}

/// Shift-and-add multiplication of unsigned magnitudes.
///
/// Walks the multiplier from its least significant bit, adding the running
/// multiplicand to the accumulator for every set bit and shifting the
/// multiplicand left by one position at each step.
pub fn multiply(a: &Byte, b: &Byte) -> Byte {
    let width = a.width().max(b.width());
    let multiplier = b.padded(width);
    let mut multiplicand = a.padded(width);
    let mut sum = Byte::zero(1);

    for i in (0..width).rev() {
        if multiplier.get(i) {
            sum = add(&sum, &multiplicand);
        }
        multiplicand = shift_left(&multiplicand);
    }

    sum
}

/// Append a zero bit (multiply by two, growing by one bit).
pub fn shift_left(a: &Byte) -> Byte {
    let mut bits = a.bits().to_vec();
    bits.push(false);
    Byte::from_bits(bits)
}

/// Drop the lowest bit and prepend a zero (width preserved).
pub fn shift_right(a: &Byte) -> Byte {
    let mut bits = a.bits().to_vec();
    bits.pop();
    bits.insert(0, false);
    Byte::from_bits(bits)
}

/// AND every bit of `a` with the matching bit of `mask`.
pub fn and_mask(a: &Byte, mask: &Byte) -> Byte {
    a.bit_and(mask)
}

// ============================================================================
// Unsigned comparisons
// ============================================================================

/// Compare two magnitudes MSB first after zero-padding to equal width.
fn compare(a: &Byte, b: &Byte) -> std::cmp::Ordering {
    let width = a.width().max(b.width());
    let a = a.padded(width);
    let b = b.padded(width);
    a.bits().cmp(b.bits())
}

/// `a < b`, unsigned.
pub fn less_than(a: &Byte, b: &Byte) -> bool {
    compare(a, b).is_lt()
}

/// `a <= b`, unsigned.
pub fn less_or_equal(a: &Byte, b: &Byte) -> bool {
    compare(a, b).is_le()
}

/// `a >= b`, unsigned.
pub fn greater_or_equal(a: &Byte, b: &Byte) -> bool {
    !less_than(a, b)
}

/// `a > b`, unsigned.
pub fn greater_than(a: &Byte, b: &Byte) -> bool {
    !less_or_equal(a, b)
}

/// `a == b` as magnitudes (leading zeros do not matter).
pub fn equal(a: &Byte, b: &Byte) -> bool {
    compare(a, b).is_eq()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::codec::{bits_to_int, int_to_bits};
    use proptest::prelude::*;

    fn byte(value: u64, width: usize) -> Byte {
        Byte::from_u64(value, width)
    }

    #[test]
    fn test_full_adder() {
        assert_eq!(full_adder(false, false, false), (false, false));
        assert_eq!(full_adder(true, false, false), (true, false));
        assert_eq!(full_adder(true, true, false), (false, true));
        assert_eq!(full_adder(true, true, true), (true, true));
        assert_eq!(full_adder(false, true, true), (false, true));
    }

    #[test]
    fn test_add_basic() {
        let result = add(&byte(100, 8), &byte(50, 8));
        assert_eq!(result.width(), 8);
        assert_eq!(result.to_u64(), 150);
    }

    #[test]
    fn test_add_carry_extends() {
        let result = add(&byte(200, 8), &byte(100, 8));
        assert_eq!(result.width(), 9);
        assert_eq!(result.to_u64(), 300);
    }

    #[test]
    fn test_add_mixed_widths() {
        let result = add(&byte(5, 8), &Byte::one());
        assert_eq!(result.width(), 8);
        assert_eq!(result.to_u64(), 6);
    }

    #[test]
    fn test_negate_zero_is_raw() {
        let result = negate(&byte(0, 8), 8);
        assert_eq!(result.width(), 9);
        assert!(result.low_bits(8).is_zero());
    }

    #[test]
    fn test_negate_most_negative() {
        let min = int_to_bits(-128, 8);
        assert_eq!(negate(&min, 8).low_bits(8), min);
    }

    #[test]
    fn test_subtract() {
        let result = subtract(&byte(100, 8), &byte(30, 8), 8).low_bits(8);
        assert_eq!(result.to_u64(), 70);

        let result = subtract(&byte(3, 8), &byte(5, 8), 8).low_bits(8);
        assert_eq!(bits_to_int(&result), -2);
    }

    #[test]
    fn test_multiply() {
        assert_eq!(multiply(&byte(6, 8), &byte(7, 8)).to_u64(), 42);
        assert_eq!(multiply(&byte(0, 8), &byte(7, 8)).to_u64(), 0);
        assert_eq!(multiply(&byte(255, 8), &byte(255, 8)).to_u64(), 65025);
        assert_eq!(multiply(&byte(3, 2), &byte(5, 4)).to_u64(), 15);
    }

    #[test]
    fn test_shifts() {
        let a = byte(0b0101, 4);
        assert_eq!(shift_left(&a).to_string(), "01010");
        assert_eq!(shift_right(&a).to_string(), "0010");
    }

    #[test]
    fn test_comparisons_are_unsigned() {
        let minus_one = int_to_bits(-1, 8);
        let one = byte(1, 8);

        // 0b11111111 is 255 as a magnitude.
        assert!(greater_than(&minus_one, &one));
        assert!(less_than(&one, &minus_one));
        assert!(less_or_equal(&one, &one));
        assert!(greater_or_equal(&one, &one));
        assert!(!less_than(&one, &one));
        assert!(!greater_than(&one, &one));
    }

    #[test]
    fn test_equal_ignores_leading_zeros() {
        assert!(equal(&byte(5, 8), &byte(5, 3)));
        assert!(equal(&Byte::zero(8), &Byte::zero(1)));
        assert!(!equal(&byte(5, 8), &byte(4, 8)));
    }

    #[test]
    fn test_and_mask() {
        assert_eq!(and_mask(&byte(0b1011_0110, 8), &byte(0b1111, 4)).to_u64(), 0b0110);
    }

    proptest! {
        #[test]
        fn prop_add_without_overflow(width in 1usize..=32, a in any::<u64>(), b in any::<u64>()) {
            let limit = 1u64 << width;
            let a = a % limit;
            let b = b % (limit - a);
            let sum = add(&byte(a, width), &byte(b, width));
            // No carry out: the result keeps the operand width.
            prop_assert_eq!(sum.width(), width);
            prop_assert_eq!(sum.to_u64(), a + b);
        }

        #[test]
        fn prop_double_negation(width in 1usize..=32, raw in any::<u64>()) {
            let x = byte(raw, width);
            let once = negate(&x, width).low_bits(width);
            let twice = negate(&once, width).low_bits(width);
            prop_assert_eq!(twice, x);
        }

        #[test]
        fn prop_multiply_matches_integers(a in 0u64..65536, b in 0u64..65536) {
            prop_assert_eq!(multiply(&byte(a, 16), &byte(b, 16)).to_u64(), a * b);
        }

        #[test]
        fn prop_compare_matches_integers(a in any::<u16>(), b in any::<u16>()) {
            let (x, y) = (byte(a as u64, 16), byte(b as u64, 16));
            prop_assert_eq!(less_than(&x, &y), a < b);
            prop_assert_eq!(less_or_equal(&x, &y), a <= b);
            prop_assert_eq!(greater_than(&x, &y), a > b);
            prop_assert_eq!(greater_or_equal(&x, &y), a >= b);
            prop_assert_eq!(equal(&x, &y), a == b);
        }
    }
}
