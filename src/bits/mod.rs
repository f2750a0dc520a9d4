//! Two's-complement binary primitives.
//!
//! This module provides the core types for working with bit sequences:
//! - [`Byte`] - an ordered bit sequence, most significant bit first
//! - [`BitOps`] - logic gates over single bits and whole bytes
//! - [`codec`] - integer and text conversions
//! - [`alu`] - ripple-carry arithmetic and unsigned comparisons

mod byte;
mod ops;
pub mod alu;
pub mod codec;

pub use byte::Byte;
pub use ops::BitOps;
pub use codec::{int_to_bits, bits_to_int, necessary_bit_count, CodecError};
