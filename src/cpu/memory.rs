//! Sparse addressable memory.
//!
//! The same store backs both RAM and the register file. Memory is
//! conceptually zero everywhere; only cells that have been written take up
//! space.

use crate::bits::Byte;
use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use thiserror::Error;

/// A named, fixed-width, zero-defaulted byte store.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    name: String,
    width: usize,
    capacity: u64,
    cells: HashMap<u64, Byte>,
}

impl Memory {
    /// Create an empty memory of `capacity` cells, each `width` bits wide.
    pub fn new(name: impl Into<String>, width: usize, capacity: u64) -> Self {
        Self {
            name: name.into(),
            width,
            capacity,
            cells: HashMap::new(),
        }
    }

    /// Name used in error messages (`"RAM"`, `"register"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell width in bits.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of addressable cells.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Read the cell at `address`.
    ///
    /// Cells that were never written read as zero.
    pub fn read(&self, address: &Byte) -> Result<Byte, MemoryError> {
        let index = self.index_of(address)?;
        Ok(self.read_index(index))
    }

    /// Write `value` at `address`, left-padding it to the cell width.
    pub fn write(&mut self, address: &Byte, value: &Byte) -> Result<(), MemoryError> {
        let index = self.index_of(address)?;
        self.write_index(index, value)
    }

    /// Read using an integer address.
    pub fn read_at(&self, index: u64) -> Result<Byte, MemoryError> {
        self.check_range(index)?;
        Ok(self.read_index(index))
    }

    /// Write using an integer address.
    pub fn write_at(&mut self, index: u64, value: &Byte) -> Result<(), MemoryError> {
        self.check_range(index)?;
        self.write_index(index, value)
    }

    /// Forget every cell, restoring the all-zero default.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Number of cells that hold a stored value.
    pub fn populated(&self) -> usize {
        self.cells.len()
    }

    /// Stored cells in address order.
    pub fn dump(&self) -> Vec<(u64, Byte)> {
        let mut cells: Vec<_> = self.cells
            .iter()
            .map(|(&index, value)| (index, value.clone()))
            .collect();
        cells.sort_by_key(|(index, _)| *index);
        cells
    }

    fn read_index(&self, index: u64) -> Byte {
        self.cells
            .get(&index)
            .cloned()
            .unwrap_or_else(|| Byte::zero(self.width))
    }

    fn write_index(&mut self, index: u64, value: &Byte) -> Result<(), MemoryError> {
        if value.width() > self.width {
            return Err(MemoryError::ValueTooWide {
                memory: self.name.clone(),
                bits: value.width(),
                width: self.width,
            });
        }
        self.cells.insert(index, value.padded(self.width));
        Ok(())
    }

    fn index_of(&self, address: &Byte) -> Result<u64, MemoryError> {
        if address.width() > self.width {
            return Err(MemoryError::AddressTooWide {
                memory: self.name.clone(),
                address: address.to_string(),
            });
        }
        let index = address.to_u64();
        self.check_range(index)?;
        Ok(index)
    }

    fn check_range(&self, index: u64) -> Result<(), MemoryError> {
        if index >= self.capacity {
            return Err(MemoryError::AddressOutOfRange {
                memory: self.name.clone(),
                address: index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("populated_cells", &self.cells.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The address has more bits than a cell.
    #[error("incorrect {memory} address: {address}")]
    AddressTooWide { memory: String, address: String },

    /// The address is past the end of the memory.
    #[error("{memory} address {address} out of range (capacity {capacity})")]
    AddressOutOfRange { memory: String, address: u64, capacity: u64 },

    /// The value has more bits than a cell.
    #[error("cannot store {bits} bits of data in {memory}, since 1 byte = {width} bits")]
    ValueTooWide { memory: String, bits: usize, width: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram() -> Memory {
        Memory::new("RAM", 8, 256)
    }

    #[test]
    fn test_unwritten_reads_zero() {
        let mem = ram();
        for addr in [0u64, 1, 17, 255] {
            let value = mem.read(&Byte::from_u64(addr, 8)).unwrap();
            assert_eq!(value, Byte::zero(8));
        }
        assert_eq!(mem.populated(), 0);
    }

    #[test]
    fn test_write_pads_value() {
        let mut mem = ram();
        let addr = Byte::from_u64(10, 8);

        mem.write(&addr, &Byte::from_bits(vec![true, false, true])).unwrap();
        assert_eq!(mem.read(&addr).unwrap().to_string(), "00000101");
    }

    #[test]
    fn test_short_address_is_same_cell() {
        let mut mem = ram();
        mem.write(&Byte::one(), &Byte::from_u64(42, 8)).unwrap();
        assert_eq!(mem.read(&Byte::from_u64(1, 8)).unwrap().to_u64(), 42);
        assert_eq!(mem.read_at(1).unwrap().to_u64(), 42);
    }

    #[test]
    fn test_address_too_wide() {
        let mut mem = ram();
        let wide = Byte::from_u64(256, 9);
        assert!(matches!(mem.read(&wide), Err(MemoryError::AddressTooWide { .. })));
        assert!(matches!(
            mem.write(&wide, &Byte::zero(8)),
            Err(MemoryError::AddressTooWide { .. })
        ));
    }

    #[test]
    fn test_address_out_of_range() {
        let regs = Memory::new("register", 8, 4);
        assert!(regs.read_at(3).is_ok());
        assert_eq!(
            regs.read(&Byte::from_u64(4, 8)),
            Err(MemoryError::AddressOutOfRange {
                memory: "register".into(),
                address: 4,
                capacity: 4,
            })
        );
    }

    #[test]
    fn test_value_too_wide() {
        let mut mem = ram();
        let result = mem.write_at(0, &Byte::from_u64(300, 9));
        assert!(matches!(result, Err(MemoryError::ValueTooWide { bits: 9, width: 8, .. })));
        // The rejected write leaves the cell untouched.
        assert!(mem.read_at(0).unwrap().is_zero());
    }

    #[test]
    fn test_clear() {
        let mut mem = ram();
        mem.write_at(5, &Byte::from_u64(7, 8)).unwrap();
        mem.write_at(2, &Byte::from_u64(9, 8)).unwrap();
        assert_eq!(mem.dump().iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![2, 5]);

        mem.clear();
        assert_eq!(mem.populated(), 0);
        assert!(mem.read_at(5).unwrap().is_zero());
    }
}
