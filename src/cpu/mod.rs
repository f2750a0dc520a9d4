//! CPU emulation for a configurable-width binary machine.
//!
//! The shape of the machine is fixed by an [`Architecture`]:
//! - `W`-bit bytes shared by opcodes, operands, registers, RAM and PC
//! - a register file and a RAM, both sparse and zero-defaulted
//! - CARRY, ZERO and SIGN status flags
//! - a fixed three-byte instruction format

pub mod config;
pub mod memory;
pub mod registers;
pub mod decode;
pub mod events;
pub mod execute;

pub use config::{Architecture, ConfigError, MAX_BITS};
pub use memory::{Memory, MemoryError};
pub use registers::{Flags, Registers};
pub use decode::{Instruction, InstructionError, Mode, Opcode, Operation, Condition};
pub use events::Listeners;
pub use execute::{Cpu, CpuError, CpuSnapshot, CellSnapshot, CpuState, STEP_LIMIT};
