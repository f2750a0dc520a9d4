//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! loop:               ; Label on a line of its own
//!     MOV %0, #5      ; register 0 <- 5
//!     ADD %0, @$10    ; register 0 += RAM[0x10]
//!     MOV%#1,b101     ; compact form: sigils glued to the mnemonic
//!     JNZ loop        ; bare label: relative jump
//!     HLT
//! ```
//!
//! Operand sigils: `%` register, `@` memory address, `#` immediate,
//! `!` relative displacement (in instructions). Literals are decimal
//! (optionally negative), `$` hex or `b` binary.
//!
//! Assembly never stops at the first error. A faulty line is encoded as
//! three zero bytes so every later instruction keeps its index.

use crate::asm::Program;
use crate::bits::{int_to_bits, Byte};
use crate::cpu::decode::{self, Instruction, InstructionError, Mode};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Assemble `source` for a `width`-bit machine.
pub fn assemble(source: &str, width: usize) -> Assembly {
    Assembler::new(width).assemble(source)
}

/// Result of one assembly: the program plus every error found.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub program: Program,
    pub errors: Vec<AssemblerError>,
}

impl Assembly {
    /// True if no line failed.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The program, or the first error.
    pub fn into_result(self) -> Result<Program, AssemblerError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.program),
        }
    }
}

/// An instruction line queued by the first pass.
struct SourceLine<'a> {
    number: usize,
    text: &'a str,
}

struct Assembler {
    width: usize,
    /// Label -> index of the instruction that follows it.
    labels: HashMap<String, usize>,
}

impl Assembler {
    fn new(width: usize) -> Self {
        Self { width, labels: HashMap::new() }
    }

    fn assemble(mut self, source: &str) -> Assembly {
        // Pass 1: strip comments, record labels
        let lines = self.collect(source);

        // Pass 2: encode
        let mut program = Program::new(self.width);
        let mut errors = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let result = self
                .encode_line(line, index)
                .and_then(|instr| {
                    program
                        .push(&instr)
                        .map_err(|err| AssemblerError::from_encoding(err, line.number))
                });

            if let Err(err) = result {
                errors.push(err);
                program.push_placeholder();
            }
        }

        debug!(
            instructions = program.len(),
            labels = self.labels.len(),
            errors = errors.len(),
            "assembled program"
        );

        Assembly { program, errors }
    }

    fn collect<'a>(&mut self, source: &'a str) -> Vec<SourceLine<'a>> {
        let mut lines = Vec::new();

        for (i, raw) in source.lines().enumerate() {
            let text = raw.split(';').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }

            if let Some(label) = text.strip_suffix(':').filter(|l| is_label(l)) {
                self.labels.insert(label.to_string(), lines.len());
            } else {
                lines.push(SourceLine { number: i + 1, text });
            }
        }

        lines
    }

    fn encode_line(&self, line: &SourceLine, index: usize) -> Result<Instruction, AssemblerError> {
        let (mnemonic, rest) = split_mnemonic(line.text);
        let mnemonic = mnemonic.to_uppercase();
        let operands = split_operands(rest, line.number)?;

        let mut modes = Vec::with_capacity(operands.len());
        let mut values = Vec::with_capacity(operands.len());
        for operand in &operands {
            let (mode, value) = self.parse_operand(operand, index, line.number)?;
            modes.push(mode);
            values.push(self.operand_byte(value, line.number)?);
        }

        let opcode = decode::lookup(&mnemonic, &modes).ok_or_else(|| {
            let mut key = mnemonic.clone();
            key.extend(modes.iter().map(|m| m.sigil()));
            AssemblerError::UnknownInstruction { line: line.number, instruction: key }
        })?;

        let mut values = values.into_iter();
        let first = values.next().unwrap_or_else(|| Byte::zero(self.width));
        let second = values.next().unwrap_or_else(|| Byte::zero(self.width));
        Ok(Instruction::new(opcode, first, second))
    }

    fn parse_operand(&self, operand: &str, index: usize, line: usize) -> Result<(Mode, i128), AssemblerError> {
        if is_label(operand) {
            return self.resolve_label(operand, index, line);
        }

        let mut chars = operand.chars();
        let sigil = chars.next().unwrap_or(' ');
        let mode = Mode::from_sigil(sigil)
            .ok_or(AssemblerError::InvalidSigil { line, sigil })?;
        let literal = chars.as_str();

        // `!name` is a label unless it only makes sense as a literal (`!b10`).
        if mode == Mode::Relative
            && is_label(literal)
            && (self.labels.contains_key(literal) || parse_literal(literal).is_none())
        {
            return self.resolve_label(literal, index, line);
        }

        let value = parse_literal(literal).ok_or_else(|| AssemblerError::InvalidLiteral {
            line,
            literal: literal.to_string(),
        })?;
        Ok((mode, value))
    }

    fn resolve_label(&self, label: &str, index: usize, line: usize) -> Result<(Mode, i128), AssemblerError> {
        let target = self.labels.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
            line,
            label: label.to_string(),
        })?;
        Ok((Mode::Relative, *target as i128 - index as i128))
    }

    /// Accept anything that fits as either a signed or an unsigned byte.
    fn operand_byte(&self, value: i128, line: usize) -> Result<Byte, AssemblerError> {
        let min = -(1i128 << self.width.saturating_sub(1));
        let max = (1i128 << self.width) - 1;
        if value < min || value > max {
            return Err(AssemblerError::OperandOutOfRange { line, value, width: self.width });
        }

        if value < 0 {
            Ok(int_to_bits(value as i64, self.width))
        } else {
            Ok(Byte::from_u64(value as u64, self.width))
        }
    }
}

/// Split at the first whitespace or sigil.
fn split_mnemonic(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| c.is_whitespace() || Mode::from_sigil(c).is_some())
        .unwrap_or(text.len());
    (&text[..end], &text[end..])
}

/// Comma-separated operands, with compact sigil runs (`%#0,5`) spread out
/// over the operands they belong to.
fn split_operands(rest: &str, line: usize) -> Result<Vec<String>, AssemblerError> {
    let mut operands: Vec<String> = rest
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let Some(first) = operands.first() else {
        return Ok(operands);
    };

    let sigils: Vec<char> = first
        .chars()
        .take_while(|&c| Mode::from_sigil(c).is_some())
        .collect();

    if sigils.len() > 1 {
        if sigils.len() != operands.len() {
            return Err(AssemblerError::SyntaxError {
                line,
                message: format!("{} sigils for {} operands", sigils.len(), operands.len()),
            });
        }
        let stripped = first[sigils.len()..].to_string();
        operands[0] = stripped;
        for (operand, sigil) in operands.iter_mut().zip(sigils) {
            operand.insert(0, sigil);
        }
    }

    Ok(operands)
}

/// `[.A-Za-z]\w*`
fn is_label(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c == '.' || c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Decimal, `$hex` or `bbinary`, optionally negated.
fn parse_literal(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (radix, digits) = if let Some(hex) = digits.strip_prefix('$') {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix('b') {
        (2, bin)
    } else {
        (10, digits)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = u64::from_str_radix(digits, radix).ok()? as i128;
    Some(if negative { -magnitude } else { magnitude })
}

/// Errors that can occur during assembly. Each carries its 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown instruction on line {line}: {instruction}")]
    UnknownInstruction { line: usize, instruction: String },

    #[error("invalid addressing mode identifier on line {line}: {sigil:?}")]
    InvalidSigil { line: usize, sigil: char },

    #[error("label not found on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("invalid literal on line {line}: {literal:?}")]
    InvalidLiteral { line: usize, literal: String },

    #[error("operand {value} on line {line} does not fit in {width} bits")]
    OperandOutOfRange { line: usize, value: i128, width: usize },

    #[error("opcode {opcode} on line {line} does not fit in {width} bits")]
    OpcodeTooWide { line: usize, opcode: u8, width: usize },
}

impl AssemblerError {
    /// Source line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            AssemblerError::SyntaxError { line, .. }
            | AssemblerError::UnknownInstruction { line, .. }
            | AssemblerError::InvalidSigil { line, .. }
            | AssemblerError::UndefinedLabel { line, .. }
            | AssemblerError::InvalidLiteral { line, .. }
            | AssemblerError::OperandOutOfRange { line, .. }
            | AssemblerError::OpcodeTooWide { line, .. } => *line,
        }
    }

    fn from_encoding(err: InstructionError, line: usize) -> Self {
        match err {
            InstructionError::OpcodeTooWide { opcode, width } => {
                AssemblerError::OpcodeTooWide { line, opcode, width }
            }
            other => AssemblerError::SyntaxError { line, message: other.to_string() },
        }
    }
}
