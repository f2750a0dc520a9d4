//! # bitcpu
//!
//! An emulator of a small educational binary computer whose byte width,
//! register count and RAM size are chosen at construction.
//!
//! Everything below the CPU works on explicit bit sequences: integers are
//! encoded in two's complement, arithmetic is a ripple-carry adder built
//! from full adders, and programs are written in a tiny assembly language
//! with `%` register, `@` memory, `#` immediate and `!` relative operands.

pub mod bits;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use bits::{Byte, BitOps, int_to_bits, bits_to_int};
pub use cpu::{Architecture, Cpu, CpuState, CpuError, CpuSnapshot, Flags, Memory, Instruction, Opcode};
pub use asm::{assemble, disassemble, Assembly, AssemblerError, Program, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
