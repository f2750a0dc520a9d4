//! Architecture configuration.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Widest supported byte. Addresses are keyed by their unsigned 64-bit value.
pub const MAX_BITS: usize = 64;

/// Shape of the emulated machine, fixed at CPU construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    /// Byte width `W` in bits. Opcodes, operands, registers, RAM cells,
    /// PC and IR all share it.
    pub bits: usize,
    /// Number of general-purpose registers.
    pub register_count: u64,
    /// Number of addressable RAM cells.
    pub ram_bytes: u64,
}

impl Architecture {
    /// Create a configuration without validating it.
    pub const fn new(bits: usize, register_count: u64, ram_bytes: u64) -> Self {
        Self { bits, register_count, ram_bytes }
    }

    /// Check the invariants every CPU relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bits < 1 {
            return Err(ConfigError::InvalidByteWidth(self.bits));
        }
        if self.bits > MAX_BITS {
            return Err(ConfigError::ByteWidthTooLarge { bits: self.bits, max: MAX_BITS });
        }
        if self.register_count < 1 {
            return Err(ConfigError::NoRegisters);
        }
        Ok(())
    }
}

impl Default for Architecture {
    /// 8-bit bytes, 4 registers, 256 bytes of RAM.
    fn default() -> Self {
        Self::new(8, 4, 256)
    }
}

/// Errors raised when constructing a CPU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("incorrect byte length: {0} (must be at least 1)")]
    InvalidByteWidth(usize),

    #[error("byte length {bits} exceeds the supported maximum of {max}")]
    ByteWidthTooLarge { bits: usize, max: usize },

    #[error("there must be at least one register")]
    NoRegisters,
}
