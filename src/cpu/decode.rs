//! Instruction set and decoder.
//!
//! Every instruction is three bytes wide: an opcode byte followed by two
//! operand bytes. Each opcode fixes the addressing mode of every operand,
//! so `ADD %0, %1` and `ADD %0, #1` are distinct opcodes.
//!
//! Some mnemonics are synonyms and share one opcode (`JEQ` = `JZ`,
//! `JNE` = `JNZ`, `JNGTR` = `JLSS`).

use crate::bits::Byte;
use crate::cpu::registers::Flags;
use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

/// Number of bytes per encoded instruction.
pub const INSTRUCTION_BYTES: u64 = 3;

/// Operand addressing mode, written as a one-character sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// `%` register index. Also marks the absolute form of jumps.
    Register,
    /// `@` memory address.
    Direct,
    /// `#` literal value.
    Immediate,
    /// `!` signed displacement in instructions.
    Relative,
}

impl Mode {
    /// Every mode, in sigil order `% @ # !`.
    pub const ALL: [Mode; 4] = [Mode::Register, Mode::Direct, Mode::Immediate, Mode::Relative];

    /// Parse a sigil character.
    pub fn from_sigil(c: char) -> Option<Self> {
        match c {
            '%' => Some(Mode::Register),
            '@' => Some(Mode::Direct),
            '#' => Some(Mode::Immediate),
            '!' => Some(Mode::Relative),
            _ => None,
        }
    }

    /// The sigil character.
    pub const fn sigil(self) -> char {
        match self {
            Mode::Register => '%',
            Mode::Direct => '@',
            Mode::Immediate => '#',
            Mode::Relative => '!',
        }
    }

    /// Whether operands in this mode read as signed numbers.
    pub const fn is_signed(self) -> bool {
        matches!(self, Mode::Immediate | Mode::Relative)
    }
}

/// Branch conditions over the status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Always,
    Carry,
    NotCarry,
    Zero,
    NotZero,
    /// Taken when SIGN is clear.
    NotSign,
    /// Taken when SIGN is set.
    Sign,
}

impl Condition {
    /// Evaluate against the current flags.
    pub fn holds(self, flags: &Flags) -> bool {
        match self {
            Condition::Always => true,
            Condition::Carry => flags.carry,
            Condition::NotCarry => !flags.carry,
            Condition::Zero => flags.zero,
            Condition::NotZero => !flags.zero,
            Condition::NotSign => !flags.sign,
            Condition::Sign => flags.sign,
        }
    }
}

/// What an opcode does, independent of its addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Halt,
    Nop,
    Move,
    Out,
    Add,
    Sub,
    Mul,
    Inc,
    Dec,
    Cmp,
    Jump(Condition),
}

/// Every (mnemonic, addressing modes) instruction variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Hlt,
    MovRegImm,
    MovRegMem,
    MovMemImm,
    MovMemReg,
    MovRegReg,
    OutReg,
    OutMem,
    AddRegReg,
    AddRegMem,
    AddRegImm,
    SubRegReg,
    SubRegMem,
    SubRegImm,
    IncReg,
    CmpRegReg,
    CmpRegMem,
    CmpRegImm,
    JmpAbs,
    JmpRel,
    JcAbs,
    JcRel,
    JncAbs,
    JncRel,
    JzAbs,
    JzRel,
    JnzAbs,
    JnzRel,
    DecReg,
    JgtrAbs,
    JgtrRel,
    JlssAbs,
    JlssRel,
    MulRegReg,
    MulRegMem,
    MulRegImm,
    Nop,
}

use Mode::{Direct as M, Immediate as I, Register as R, Relative as L};

impl Opcode {
    /// Every opcode, in numeric order.
    pub const ALL: [Opcode; 37] = [
        Opcode::Hlt,
        Opcode::MovRegImm,
        Opcode::MovRegMem,
        Opcode::MovMemImm,
        Opcode::MovMemReg,
        Opcode::MovRegReg,
        Opcode::OutReg,
        Opcode::OutMem,
        Opcode::AddRegReg,
        Opcode::AddRegMem,
        Opcode::AddRegImm,
        Opcode::SubRegReg,
        Opcode::SubRegMem,
        Opcode::SubRegImm,
        Opcode::IncReg,
        Opcode::CmpRegReg,
        Opcode::CmpRegMem,
        Opcode::CmpRegImm,
        Opcode::JmpAbs,
        Opcode::JmpRel,
        Opcode::JcAbs,
        Opcode::JcRel,
        Opcode::JncAbs,
        Opcode::JncRel,
        Opcode::JzAbs,
        Opcode::JzRel,
        Opcode::JnzAbs,
        Opcode::JnzRel,
        Opcode::DecReg,
        Opcode::JgtrAbs,
        Opcode::JgtrRel,
        Opcode::JlssAbs,
        Opcode::JlssRel,
        Opcode::MulRegReg,
        Opcode::MulRegMem,
        Opcode::MulRegImm,
        Opcode::Nop,
    ];

    /// Numeric opcode. Code 28 is unassigned.
    pub const fn code(self) -> u8 {
        match self {
            Opcode::Hlt => 0,
            Opcode::MovRegImm => 1,
            Opcode::MovRegMem => 2,
            Opcode::MovMemImm => 3,
            Opcode::MovMemReg => 4,
            Opcode::MovRegReg => 5,
            Opcode::OutReg => 6,
            Opcode::OutMem => 7,
            Opcode::AddRegReg => 8,
            Opcode::AddRegMem => 9,
            Opcode::AddRegImm => 10,
            Opcode::SubRegReg => 11,
            Opcode::SubRegMem => 12,
            Opcode::SubRegImm => 13,
            Opcode::IncReg => 14,
            Opcode::CmpRegReg => 15,
            Opcode::CmpRegMem => 16,
            Opcode::CmpRegImm => 17,
            Opcode::JmpAbs => 18,
            Opcode::JmpRel => 19,
            Opcode::JcAbs => 20,
            Opcode::JcRel => 21,
            Opcode::JncAbs => 22,
            Opcode::JncRel => 23,
            Opcode::JzAbs => 24,
            Opcode::JzRel => 25,
            Opcode::JnzAbs => 26,
            Opcode::JnzRel => 27,
            Opcode::DecReg => 29,
            Opcode::JgtrAbs => 30,
            Opcode::JgtrRel => 31,
            Opcode::JlssAbs => 32,
            Opcode::JlssRel => 33,
            Opcode::MulRegReg => 34,
            Opcode::MulRegMem => 35,
            Opcode::MulRegImm => 36,
            Opcode::Nop => 37,
        }
    }

    /// Look up an opcode by its numeric value.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.code() as u64 == code)
    }

    /// Canonical mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Nop => "NOP",
            Opcode::MovRegImm | Opcode::MovRegMem | Opcode::MovMemImm
            | Opcode::MovMemReg | Opcode::MovRegReg => "MOV",
            Opcode::OutReg | Opcode::OutMem => "OUT",
            Opcode::AddRegReg | Opcode::AddRegMem | Opcode::AddRegImm => "ADD",
            Opcode::SubRegReg | Opcode::SubRegMem | Opcode::SubRegImm => "SUB",
            Opcode::MulRegReg | Opcode::MulRegMem | Opcode::MulRegImm => "MUL",
            Opcode::CmpRegReg | Opcode::CmpRegMem | Opcode::CmpRegImm => "CMP",
            Opcode::IncReg => "INC",
            Opcode::DecReg => "DEC",
            Opcode::JmpAbs | Opcode::JmpRel => "JMP",
            Opcode::JcAbs | Opcode::JcRel => "JC",
            Opcode::JncAbs | Opcode::JncRel => "JNC",
            Opcode::JzAbs | Opcode::JzRel => "JZ",
            Opcode::JnzAbs | Opcode::JnzRel => "JNZ",
            Opcode::JgtrAbs | Opcode::JgtrRel => "JGTR",
            Opcode::JlssAbs | Opcode::JlssRel => "JLSS",
        }
    }

    /// Addressing mode of each operand, in order.
    pub const fn modes(self) -> &'static [Mode] {
        match self {
            Opcode::Hlt | Opcode::Nop => &[],
            Opcode::MovRegImm => &[R, I],
            Opcode::MovRegMem => &[R, M],
            Opcode::MovMemImm => &[M, I],
            Opcode::MovMemReg => &[M, R],
            Opcode::MovRegReg => &[R, R],
            Opcode::OutReg => &[R],
            Opcode::OutMem => &[M],
            Opcode::AddRegReg | Opcode::SubRegReg | Opcode::MulRegReg | Opcode::CmpRegReg => &[R, R],
            Opcode::AddRegMem | Opcode::SubRegMem | Opcode::MulRegMem | Opcode::CmpRegMem => &[R, M],
            Opcode::AddRegImm | Opcode::SubRegImm | Opcode::MulRegImm | Opcode::CmpRegImm => &[R, I],
            Opcode::IncReg | Opcode::DecReg => &[R],
            Opcode::JmpAbs | Opcode::JcAbs | Opcode::JncAbs | Opcode::JzAbs
            | Opcode::JnzAbs | Opcode::JgtrAbs | Opcode::JlssAbs => &[R],
            Opcode::JmpRel | Opcode::JcRel | Opcode::JncRel | Opcode::JzRel
            | Opcode::JnzRel | Opcode::JgtrRel | Opcode::JlssRel => &[L],
        }
    }

    /// The operation this opcode performs.
    pub const fn operation(self) -> Operation {
        match self {
            Opcode::Hlt => Operation::Halt,
            Opcode::Nop => Operation::Nop,
            Opcode::MovRegImm | Opcode::MovRegMem | Opcode::MovMemImm
            | Opcode::MovMemReg | Opcode::MovRegReg => Operation::Move,
            Opcode::OutReg | Opcode::OutMem => Operation::Out,
            Opcode::AddRegReg | Opcode::AddRegMem | Opcode::AddRegImm => Operation::Add,
            Opcode::SubRegReg | Opcode::SubRegMem | Opcode::SubRegImm => Operation::Sub,
            Opcode::MulRegReg | Opcode::MulRegMem | Opcode::MulRegImm => Operation::Mul,
            Opcode::CmpRegReg | Opcode::CmpRegMem | Opcode::CmpRegImm => Operation::Cmp,
            Opcode::IncReg => Operation::Inc,
            Opcode::DecReg => Operation::Dec,
            Opcode::JmpAbs | Opcode::JmpRel => Operation::Jump(Condition::Always),
            Opcode::JcAbs | Opcode::JcRel => Operation::Jump(Condition::Carry),
            Opcode::JncAbs | Opcode::JncRel => Operation::Jump(Condition::NotCarry),
            Opcode::JzAbs | Opcode::JzRel => Operation::Jump(Condition::Zero),
            Opcode::JnzAbs | Opcode::JnzRel => Operation::Jump(Condition::NotZero),
            Opcode::JgtrAbs | Opcode::JgtrRel => Operation::Jump(Condition::NotSign),
            Opcode::JlssAbs | Opcode::JlssRel => Operation::Jump(Condition::Sign),
        }
    }

    /// Table key such as `ADD%#`.
    pub fn key(self) -> String {
        let mut key = self.mnemonic().to_string();
        key.extend(self.modes().iter().map(|m| m.sigil()));
        key
    }
}

/// Assembler lookup table: every accepted (mnemonic, modes) spelling.
///
/// Synonyms map to the same opcode.
pub const OPCODE_TABLE: &[(&str, &[Mode], Opcode)] = &[
    ("HLT", &[], Opcode::Hlt),
    ("NOP", &[], Opcode::Nop),
    ("MOV", &[R, I], Opcode::MovRegImm),
    ("MOV", &[R, M], Opcode::MovRegMem),
    ("MOV", &[M, I], Opcode::MovMemImm),
    ("MOV", &[M, R], Opcode::MovMemReg),
    ("MOV", &[R, R], Opcode::MovRegReg),
    ("OUT", &[R], Opcode::OutReg),
    ("OUT", &[M], Opcode::OutMem),
    ("ADD", &[R, R], Opcode::AddRegReg),
    ("ADD", &[R, M], Opcode::AddRegMem),
    ("ADD", &[R, I], Opcode::AddRegImm),
    ("SUB", &[R, R], Opcode::SubRegReg),
    ("SUB", &[R, M], Opcode::SubRegMem),
    ("SUB", &[R, I], Opcode::SubRegImm),
    ("MUL", &[R, R], Opcode::MulRegReg),
    ("MUL", &[R, M], Opcode::MulRegMem),
    ("MUL", &[R, I], Opcode::MulRegImm),
    ("INC", &[R], Opcode::IncReg),
    ("DEC", &[R], Opcode::DecReg),
    ("CMP", &[R, R], Opcode::CmpRegReg),
    ("CMP", &[R, M], Opcode::CmpRegMem),
    ("CMP", &[R, I], Opcode::CmpRegImm),
    ("JMP", &[R], Opcode::JmpAbs),
    ("JMP", &[L], Opcode::JmpRel),
    ("JC", &[R], Opcode::JcAbs),
    ("JC", &[L], Opcode::JcRel),
    ("JNC", &[R], Opcode::JncAbs),
    ("JNC", &[L], Opcode::JncRel),
    ("JZ", &[R], Opcode::JzAbs),
    ("JZ", &[L], Opcode::JzRel),
    ("JEQ", &[R], Opcode::JzAbs),
    ("JEQ", &[L], Opcode::JzRel),
    ("JNZ", &[R], Opcode::JnzAbs),
    ("JNZ", &[L], Opcode::JnzRel),
    ("JNE", &[R], Opcode::JnzAbs),
    ("JNE", &[L], Opcode::JnzRel),
    ("JGTR", &[R], Opcode::JgtrAbs),
    ("JGTR", &[L], Opcode::JgtrRel),
    ("JLSS", &[R], Opcode::JlssAbs),
    ("JLSS", &[L], Opcode::JlssRel),
    ("JNGTR", &[R], Opcode::JlssAbs),
    ("JNGTR", &[L], Opcode::JlssRel),
];

/// Find the opcode for an upper-case mnemonic and its operand modes.
pub fn lookup(mnemonic: &str, modes: &[Mode]) -> Option<Opcode> {
    OPCODE_TABLE
        .iter()
        .find(|(name, table_modes, _)| *name == mnemonic && *table_modes == modes)
        .map(|&(_, _, opcode)| opcode)
}

/// A decoded instruction: opcode plus both operand bytes.
///
/// Operands an opcode does not use are zero bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: [Byte; 2],
}

impl Instruction {
    /// Build an instruction from operand bytes.
    pub fn new(opcode: Opcode, first: Byte, second: Byte) -> Self {
        Self { opcode, operands: [first, second] }
    }

    /// An instruction with no operands, zero-filled to `width`.
    pub fn bare(opcode: Opcode, width: usize) -> Self {
        Self::new(opcode, Byte::zero(width), Byte::zero(width))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        for (i, (mode, operand)) in self.opcode.modes().iter().zip(&self.operands).enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            if mode.is_signed() {
                write!(f, "{}{}{}", sep, mode.sigil(), operand.to_i64())?;
            } else {
                write!(f, "{}{}{}", sep, mode.sigil(), operand.to_u64())?;
            }
        }
        Ok(())
    }
}

/// Decode an opcode byte by its unsigned value.
pub fn decode_opcode(ir: &Byte) -> Result<Opcode, InstructionError> {
    let code = ir.to_u64();
    Opcode::from_code(code).ok_or(InstructionError::InvalidOpcode(code))
}

/// Decode one instruction from exactly `3 * width` bits.
pub fn decode(bits: &[bool], width: usize) -> Result<Instruction, InstructionError> {
    let expected = width * INSTRUCTION_BYTES as usize;
    if bits.len() != expected {
        return Err(InstructionError::Truncated { bits: bits.len(), expected });
    }

    let opcode = decode_opcode(&Byte::from_slice(&bits[..width]))?;
    let first = Byte::from_slice(&bits[width..2 * width]);
    let second = Byte::from_slice(&bits[2 * width..]);
    Ok(Instruction::new(opcode, first, second))
}

/// Encode an instruction as `3 * width` bits.
pub fn encode(instr: &Instruction, width: usize) -> Result<Vec<bool>, InstructionError> {
    let code = instr.opcode.code();
    let opcode = Byte::from_u64(code as u64, width);
    if opcode.to_u64() != code as u64 {
        return Err(InstructionError::OpcodeTooWide { opcode: code, width });
    }

    let mut bits = opcode.into_bits();
    for operand in &instr.operands {
        if operand.width() > width {
            return Err(InstructionError::OperandTooWide { bits: operand.width(), width });
        }
        bits.extend_from_slice(operand.padded(width).bits());
    }
    Ok(bits)
}

/// Errors that can occur while encoding or decoding instructions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("invalid opcode: {0}")]
    InvalidOpcode(u64),

    #[error("opcode {opcode} does not fit in a {width}-bit byte")]
    OpcodeTooWide { opcode: u8, width: usize },

    #[error("operand of {bits} bits does not fit in a {width}-bit byte")]
    OperandTooWide { bits: usize, width: usize },

    #[error("instruction needs {expected} bits, got {bits}")]
    Truncated { bits: usize, expected: usize },
}
