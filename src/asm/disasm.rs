//! Disassembler.
//!
//! Converts encoded instructions back to assembly text that the assembler
//! accepts. Synonyms print under their canonical mnemonic (`JEQ` as `JZ`).

use crate::asm::Program;
use crate::bits::Byte;
use crate::cpu::decode::{decode, INSTRUCTION_BYTES};

/// Disassemble one `3 * width`-bit instruction.
pub fn disassemble_instruction(bits: &[bool], width: usize) -> String {
    match decode(bits, width) {
        Ok(instr) => instr.to_string(),
        Err(_) => format!("??? ; {}", Byte::from_slice(bits)),
    }
}

/// Disassemble a whole program, one line per instruction, each prefixed
/// with its byte address.
pub fn disassemble(program: &Program) -> String {
    let mut output = String::new();
    output.push_str(&format!("; {}-bit disassembly\n", program.width()));
    output.push_str("; -----------------\n\n");

    for (i, bits) in program.instructions().enumerate() {
        let addr = i as u64 * INSTRUCTION_BYTES;
        let line = disassemble_instruction(bits, program.width());
        output.push_str(&format!("{:03}: {}\n", addr, line));
    }

    output
}
