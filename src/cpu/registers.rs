//! Special-purpose CPU registers.
//!
//! The general-purpose registers live in a [`Memory`](crate::cpu::Memory)
//! named `"register"`. This module holds the rest of the processor state:
//! - PC: address of the current instruction
//! - IR: opcode byte of the current instruction
//! - Status flags: CARRY, ZERO, SIGN

use crate::bits::Byte;
use serde::{Serialize, Deserialize};

/// The status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// The raw result did not fit in the byte width.
    pub carry: bool,
    /// The truncated result is all zeros.
    pub zero: bool,
    /// The truncated result has its most significant bit set.
    pub sign: bool,
}

impl Flags {
    /// Clear every flag.
    pub fn reset(&mut self) {
        *self = Flags::default();
    }

    /// Set all three flags from an untruncated ALU result.
    ///
    /// CARRY comes from the raw width; ZERO and SIGN from the low `width` bits,
    /// which are returned.
    pub fn update(&mut self, raw: &Byte, width: usize) -> Byte {
        let result = raw.low_bits(width);
        self.carry = raw.width() > width;
        self.zero = result.is_zero();
        self.sign = result.msb();
        result
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.carry { 'C' } else { '-' },
            if self.zero { 'Z' } else { '-' },
            if self.sign { 'S' } else { '-' },
        )
    }
}

/// Program counter, instruction register and status flags.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// PC: address of the instruction being executed.
    pub pc: Byte,
    /// IR: opcode byte of the instruction being executed.
    pub ir: Byte,
    /// Status flags.
    pub flags: Flags,
    width: usize,
}

impl Registers {
    /// Zeroed registers for a `width`-bit machine.
    pub fn new(width: usize) -> Self {
        Self {
            pc: Byte::zero(width),
            ir: Byte::zero(width),
            flags: Flags::default(),
            width,
        }
    }

    /// Zero PC and IR and clear the flags.
    pub fn reset(&mut self) {
        self.pc = Byte::zero(self.width);
        self.ir = Byte::zero(self.width);
        self.flags.reset();
    }

    /// Set PC to an absolute address, truncated to the byte width.
    pub fn jump(&mut self, addr: &Byte) {
        self.pc = addr.low_bits(self.width);
    }
}
