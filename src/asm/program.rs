//! Assembled program container.

use crate::bits::Byte;
use crate::cpu::decode::{self, Instruction, InstructionError, INSTRUCTION_BYTES};
use serde::{Serialize, Deserialize};

/// A flat, MSB-first bit stream of three-byte instructions, plus the byte
/// width it was encoded for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    width: usize,
    bits: Vec<bool>,
}

impl Program {
    /// An empty program for `width`-bit bytes.
    pub fn new(width: usize) -> Self {
        Self { width, bits: Vec::new() }
    }

    /// Wrap an existing bit stream.
    pub fn from_bits(width: usize, bits: Vec<bool>) -> Self {
        Self { width, bits }
    }

    /// Byte width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The raw bit stream.
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn into_bits(self) -> Vec<bool> {
        self.bits
    }

    /// Number of whole instructions.
    pub fn len(&self) -> usize {
        match self.instruction_bits() {
            0 => 0,
            n => self.bits.len() / n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Encode and append one instruction.
    pub fn push(&mut self, instr: &Instruction) -> Result<(), InstructionError> {
        let bits = decode::encode(instr, self.width)?;
        self.bits.extend(bits);
        Ok(())
    }

    /// Append three zero bytes (an `HLT`).
    pub fn push_placeholder(&mut self) {
        let n = self.instruction_bits();
        self.bits.extend(std::iter::repeat(false).take(n));
    }

    /// Iterate over the program one byte at a time.
    pub fn bytes(&self) -> impl Iterator<Item = Byte> + '_ {
        self.bits.chunks(self.width.max(1)).map(Byte::from_slice)
    }

    /// Iterate over the program one instruction at a time.
    pub fn instructions(&self) -> impl Iterator<Item = &[bool]> + '_ {
        self.bits.chunks(self.instruction_bits().max(1))
    }

    fn instruction_bits(&self) -> usize {
        self.width * INSTRUCTION_BYTES as usize
    }
}
