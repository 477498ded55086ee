//! The server-side data table: four independently locked blocks.
//!
//! Each block maps a contiguous range of external addresses onto a vector of
//! cells behind its own `RwLock`. Reads take the shared lock and copy out;
//! writes take the exclusive lock. `starting address`, `capacity` and the
//! default value are fixed at construction, only the cells mutate.

use std::sync::RwLock;

use mbtcp_core::types::Address;
use mbtcp_core::ProtocolError;

pub const DEFAULT_CAPACITY: usize = 0x10000;

/// Construction parameters for one block.
#[derive(Debug, Clone, Copy)]
pub struct BlockConfig<T> {
    pub start: Address,
    pub capacity: usize,
    pub default: T,
}

impl<T: Default> Default for BlockConfig<T> {
    fn default() -> Self {
        Self {
            start: Address::new(0),
            capacity: DEFAULT_CAPACITY,
            default: T::default(),
        }
    }
}

/// One address space of the table.
#[derive(Debug)]
pub struct Block<T> {
    start: Address,
    capacity: usize,
    default: T,
    cells: RwLock<Vec<T>>,
}

impl<T: Copy> Block<T> {
    pub fn new(config: BlockConfig<T>) -> Self {
        Self {
            start: config.start,
            capacity: config.capacity,
            default: config.default,
            cells: RwLock::new(vec![config.default; config.capacity]),
        }
    }

    pub fn start_address(&self) -> Address {
        self.start
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_value(&self) -> T {
        self.default
    }

    /// Whether `count` cells starting at `address` fall inside the block.
    ///
    /// Pure: the bounds are immutable, so no lock is taken.
    pub fn validate(&self, address: Address, count: usize) -> bool {
        let Some(offset) = address.checked_sub(self.start) else {
            return false;
        };
        count > 0 && usize::from(offset) + count <= self.capacity
    }

    fn index(&self, address: Address) -> Result<usize, ProtocolError> {
        let offset = address
            .checked_sub(self.start)
            .ok_or(ProtocolError::OutOfRange)?;
        let index = usize::from(offset);
        if index < self.capacity {
            Ok(index)
        } else {
            Err(ProtocolError::OutOfRange)
        }
    }

    pub fn get(&self, address: Address) -> Result<T, ProtocolError> {
        let index = self.index(address)?;
        let cells = self.cells.read().expect("data table lock poisoned");
        Ok(cells[index])
    }

    /// Copy `count` cells out while holding the shared lock.
    ///
    /// The copy is what crosses the lock boundary; no view outlives it.
    pub fn get_range(&self, address: Address, count: usize) -> Result<Vec<T>, ProtocolError> {
        if !self.validate(address, count) {
            return Err(ProtocolError::OutOfRange);
        }
        let index = self.index(address)?;
        let cells = self.cells.read().expect("data table lock poisoned");
        Ok(cells[index..index + count].to_vec())
    }

    pub fn set(&self, address: Address, value: T) -> Result<(), ProtocolError> {
        let index = self.index(address)?;
        let mut cells = self.cells.write().expect("data table lock poisoned");
        cells[index] = value;
        Ok(())
    }

    pub fn set_range(&self, address: Address, values: &[T]) -> Result<(), ProtocolError> {
        if !self.validate(address, values.len()) {
            return Err(ProtocolError::OutOfRange);
        }
        let index = self.index(address)?;
        let mut cells = self.cells.write().expect("data table lock poisoned");
        cells[index..index + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Read-modify-write one cell under a single exclusive lock.
    ///
    /// Returns the value written.
    pub fn update(&self, address: Address, f: impl FnOnce(T) -> T) -> Result<T, ProtocolError> {
        let index = self.index(address)?;
        let mut cells = self.cells.write().expect("data table lock poisoned");
        let next = f(cells[index]);
        cells[index] = next;
        Ok(next)
    }

    /// Overwrite every cell with the default value.
    pub fn reset(&self) {
        let mut cells = self.cells.write().expect("data table lock poisoned");
        cells.fill(self.default);
    }
}

/// Construction parameters for the whole table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableConfig {
    pub coils: BlockConfig<bool>,
    pub discrete_inputs: BlockConfig<bool>,
    pub holding_registers: BlockConfig<u16>,
    pub input_registers: BlockConfig<u16>,
}

/// The four address spaces a Modbus server exposes.
///
/// There is no global lock; each block synchronizes independently.
#[derive(Debug)]
pub struct DataTable {
    coils: Block<bool>,
    discrete_inputs: Block<bool>,
    holding_registers: Block<u16>,
    input_registers: Block<u16>,
}

impl DataTable {
    pub fn new(config: TableConfig) -> Self {
        Self {
            coils: Block::new(config.coils),
            discrete_inputs: Block::new(config.discrete_inputs),
            holding_registers: Block::new(config.holding_registers),
            input_registers: Block::new(config.input_registers),
        }
    }

    pub fn coils(&self) -> &Block<bool> {
        &self.coils
    }

    pub fn discrete_inputs(&self) -> &Block<bool> {
        &self.discrete_inputs
    }

    pub fn holding_registers(&self) -> &Block<u16> {
        &self.holding_registers
    }

    pub fn input_registers(&self) -> &Block<u16> {
        &self.input_registers
    }
}

impl Default for DataTable {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_block() -> Block<u16> {
        Block::new(BlockConfig {
            start: Address::new(0x0100),
            capacity: 16,
            default: 7,
        })
    }

    #[test]
    fn validate_respects_start_and_capacity() {
        let block = small_block();
        assert!(block.validate(Address::new(0x0100), 1));
        assert!(block.validate(Address::new(0x0100), 16));
        assert!(block.validate(Address::new(0x010F), 1));
        assert!(!block.validate(Address::new(0x0100), 0));
        assert!(!block.validate(Address::new(0x0100), 17));
        assert!(!block.validate(Address::new(0x00FF), 1));
        assert!(!block.validate(Address::new(0x0110), 1));
    }

    #[test]
    fn validate_does_not_overflow_at_address_space_end() {
        let block = Block::new(BlockConfig {
            start: Address::new(0),
            capacity: DEFAULT_CAPACITY,
            default: 0u16,
        });
        assert!(block.validate(Address::new(0xFFFF), 1));
        assert!(!block.validate(Address::new(0xFFFF), 2));
        assert!(!block.validate(Address::new(0xFFFE), 5));
    }

    #[test]
    fn cells_start_at_default_and_reset() {
        let block = small_block();
        assert_eq!(block.get(Address::new(0x0105)).unwrap(), 7);
        block.set(Address::new(0x0105), 42).unwrap();
        assert_eq!(block.get(Address::new(0x0105)).unwrap(), 42);
        block.reset();
        assert_eq!(block.get(Address::new(0x0105)).unwrap(), 7);
    }

    #[test]
    fn range_accessors_copy() {
        let block = small_block();
        block.set_range(Address::new(0x0102), &[1, 2, 3]).unwrap();
        assert_eq!(
            block.get_range(Address::new(0x0101), 5).unwrap(),
            vec![7, 1, 2, 3, 7]
        );
        assert_eq!(
            block.get_range(Address::new(0x010E), 3).unwrap_err(),
            ProtocolError::OutOfRange
        );
        assert_eq!(
            block.set_range(Address::new(0x010E), &[1, 2, 3]).unwrap_err(),
            ProtocolError::OutOfRange
        );
    }

    #[test]
    fn out_of_range_single_cell() {
        let block = small_block();
        assert_eq!(
            block.get(Address::new(0x0000)).unwrap_err(),
            ProtocolError::OutOfRange
        );
        assert_eq!(
            block.set(Address::new(0x0110), 1).unwrap_err(),
            ProtocolError::OutOfRange
        );
    }

    #[test]
    fn update_applies_under_one_lock() {
        let block = small_block();
        block.set(Address::new(0x0100), 0x0012).unwrap();
        let written = block
            .update(Address::new(0x0100), |v| (v & 0x00F2) | 0x0025)
            .unwrap();
        assert_eq!(written, 0x0037);
        assert_eq!(block.get(Address::new(0x0100)).unwrap(), 0x0037);
    }

    #[test]
    fn table_blocks_are_independent() {
        let table = DataTable::new(TableConfig {
            coils: BlockConfig {
                start: Address::new(0),
                capacity: 8,
                default: false,
            },
            discrete_inputs: BlockConfig {
                start: Address::new(0),
                capacity: 8,
                default: true,
            },
            holding_registers: BlockConfig {
                start: Address::new(0),
                capacity: 8,
                default: 0,
            },
            input_registers: BlockConfig {
                start: Address::new(0),
                capacity: 8,
                default: 0xFFFF,
            },
        });
        table.coils().set(Address::new(3), true).unwrap();
        assert!(table.coils().get(Address::new(3)).unwrap());
        assert!(table.discrete_inputs().get(Address::new(3)).unwrap());
        assert_eq!(table.input_registers().get(Address::new(3)).unwrap(), 0xFFFF);
        assert_eq!(table.holding_registers().get(Address::new(3)).unwrap(), 0);
    }
}
