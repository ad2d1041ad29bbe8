use vmem_mmu::{PAGE_MASK, PAGE_SIZE};

use crate::error::{MemoryError, Result};

/// Sizing of a [`crate::Machine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Guest RAM size in bytes. Must be a non-zero multiple of the page size.
    ///
    /// Only used by [`crate::Machine::new`]; machines built with
    /// [`crate::Machine::with_memory`] take their size from the supplied backend.
    pub ram_size_bytes: u64,
    /// Largest range [`crate::Machine::reserve`] may stash. Must be at least one page so a
    /// page-crossing word always fits.
    pub stash_capacity: usize,
    /// Number of out-of-place strings the machine may hold before the executor has to call
    /// [`crate::Machine::drain_temps`].
    pub temp_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size_bytes: 16 * 1024 * 1024,
            stash_capacity: PAGE_SIZE,
            temp_capacity: 16,
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ram_size_bytes == 0 || self.ram_size_bytes & PAGE_MASK != 0 {
            return Err(MemoryError::InvalidConfig(
                "ram_size_bytes must be a non-zero multiple of 4096",
            ));
        }
        self.validate_capacities()
    }

    /// Checks everything except the RAM size.
    pub fn validate_capacities(&self) -> Result<()> {
        if self.stash_capacity < PAGE_SIZE {
            return Err(MemoryError::InvalidConfig(
                "stash_capacity must hold at least one page",
            ));
        }
        if self.temp_capacity == 0 {
            return Err(MemoryError::InvalidConfig("temp_capacity must be non-zero"));
        }
        Ok(())
    }
}
