//! Assembler and disassembler.
//!
//! This module provides:
//! - A two-pass assembler (text → flat bit stream)
//! - A disassembler (bit stream → readable text)
//! - The program image file format

pub mod assembler;
pub mod disasm;
pub mod image;
mod program;

pub use assembler::{assemble, Assembly, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use image::{load_image, save_image, parse_image, format_image, ImageError};
pub use program::Program;
