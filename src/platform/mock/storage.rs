//! Mock storage implementation for testing
//!
//! Provides an in-memory EEPROM simulation for unit tests. Supports:
//! - Read/write/erase operations
//! - Corruption injection for testing checksum recovery
//! - Write budget limiting for interrupted-commit (power loss) testing

use crate::platform::{error::StorageError, traits::StorageInterface, Result};

/// Mock storage capacity (matches the configuration EEPROM region)
const MOCK_CAPACITY: usize = 4096;

/// In-memory mock of the durable configuration region
pub struct MockStorage {
    /// Region contents (0xFF = erased state)
    data: [u8; MOCK_CAPACITY],
    /// Remaining writes before failure, when limited
    write_budget: Option<usize>,
}

impl MockStorage {
    /// Create a new mock storage instance, fully erased
    pub fn new() -> Self {
        Self {
            data: [0xFF; MOCK_CAPACITY],
            write_budget: None,
        }
    }

    /// Get region contents (for test verification)
    pub fn contents(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Overwrite bytes directly, bypassing the trait (for test setup)
    pub fn patch(&mut self, offset: usize, data: &[u8]) {
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Inject corruption at `offset` (for testing checksum recovery)
    pub fn inject_corruption(&mut self, offset: usize, len: usize) {
        for b in &mut self.data[offset..offset + len] {
            *b ^= 0xAA;
        }
    }

    /// Allow only `n` further writes, then fail every write.
    ///
    /// Simulates power loss partway through a multi-field commit.
    pub fn limit_writes(&mut self, n: usize) {
        self.write_budget = Some(n);
    }

    /// Lift a previously set write limit
    pub fn clear_write_limit(&mut self) {
        self.write_budget = None;
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageInterface for MockStorage {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        let offset = offset as usize;
        if offset + buf.len() > MOCK_CAPACITY {
            return Err(StorageError::OutOfBounds.into());
        }
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let offset = offset as usize;
        if offset + data.len() > MOCK_CAPACITY {
            return Err(StorageError::OutOfBounds.into());
        }
        if let Some(budget) = self.write_budget {
            if budget == 0 {
                return Err(StorageError::WriteFailed.into());
            }
            self.write_budget = Some(budget - 1);
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self) -> Result<()> {
        self.data = [0xFF; MOCK_CAPACITY];
        Ok(())
    }

    fn capacity(&self) -> u32 {
        MOCK_CAPACITY as u32
    }
}
