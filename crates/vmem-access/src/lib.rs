//! Guest memory access paths for the emulator core.
//!
//! [`Machine`] owns guest physical memory, the [`vmem_mmu::Mmu`], and the bookkeeping the
//! instruction executor needs around memory operands:
//! - page-crossing loads and two-phase stores ([`Machine::load`], [`Machine::begin_store`])
//! - a stable scratch "stash" for operands that span pages ([`Machine::reserve`])
//! - NUL-terminated string and buffer loads ([`Machine::load_str`], [`Machine::load_buf`])
//!
//! A machine context belongs to one emulated core; every operation takes `&mut self` and
//! runs to completion before the next access.

mod access;
mod config;
mod copy;
mod error;
mod loader;
mod stash;
mod temps;

#[cfg(test)]
mod test_util;

pub use access::{Fragment, PendingStore, Scratch};
pub use config::MachineConfig;
pub use error::{MemoryError, Result};
pub use temps::TempList;

use stash::Stash;
use vmem_mmu::{GuestRam, Mmu, PhysMemory, TranslateFault};

/// Operand address and size of the most recent read or write, for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccessDescriptor {
    pub addr: u64,
    pub size: usize,
    pub write: bool,
}

impl AccessDescriptor {
    #[inline]
    pub const fn read(addr: u64, size: usize) -> Self {
        Self {
            addr,
            size,
            write: false,
        }
    }

    #[inline]
    pub const fn write(addr: u64, size: usize) -> Self {
        Self {
            addr,
            size,
            write: true,
        }
    }
}

/// Per-core memory context.
#[derive(Debug)]
pub struct Machine<R = GuestRam> {
    mem: R,
    mmu: Mmu,
    read: AccessDescriptor,
    write: AccessDescriptor,
    stash: Stash,
    temps: TempList,
}

impl Machine<GuestRam> {
    /// Builds a machine backed by zeroed [`GuestRam`] of `config.ram_size_bytes`.
    pub fn new(config: MachineConfig) -> Result<Self> {
        config.validate()?;
        let size = usize::try_from(config.ram_size_bytes)
            .map_err(|_| MemoryError::InvalidConfig("ram_size_bytes does not fit in usize"))?;
        Self::with_memory(GuestRam::new(size), config)
    }
}

impl<R: PhysMemory> Machine<R> {
    pub fn with_memory(mem: R, config: MachineConfig) -> Result<Self> {
        config.validate_capacities()?;
        Ok(Self {
            mem,
            mmu: Mmu::new(0),
            read: AccessDescriptor::default(),
            write: AccessDescriptor::default(),
            stash: Stash::new(config.stash_capacity),
            temps: TempList::new(config.temp_capacity),
        })
    }

    #[inline]
    pub fn mem(&self) -> &R {
        &self.mem
    }

    /// Direct access to guest physical memory.
    ///
    /// Page-table edits made through this must be followed by [`Machine::flush_tlb`].
    #[inline]
    pub fn mem_mut(&mut self) -> &mut R {
        &mut self.mem
    }

    #[inline]
    pub fn into_inner(self) -> R {
        self.mem
    }

    #[inline]
    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    #[inline]
    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    /// Installs a new page-table root and drops all cached translations.
    pub fn set_root(&mut self, root: u64) {
        self.mmu.set_root(root);
    }

    pub fn flush_tlb(&mut self) {
        self.mmu.flush();
    }

    /// Translates `vaddr` without faulting.
    #[inline]
    pub fn resolve(&mut self, vaddr: u64) -> Option<u64> {
        self.mmu.resolve(&mut self.mem, vaddr)
    }

    #[inline]
    pub fn resolve_or_fault(&mut self, vaddr: u64) -> std::result::Result<u64, TranslateFault> {
        self.mmu.resolve_or_fault(&mut self.mem, vaddr)
    }

    /// Most recent read operand.
    #[inline]
    pub fn read_access(&self) -> AccessDescriptor {
        self.read
    }

    /// Most recent write operand.
    #[inline]
    pub fn write_access(&self) -> AccessDescriptor {
        self.write
    }

    #[inline]
    pub fn temps(&self) -> &TempList {
        &self.temps
    }

    /// Frees every string buffer produced by [`Machine::load_str`] and returns how many were
    /// released.
    pub fn drain_temps(&mut self) -> usize {
        self.temps.drain()
    }
}

#[inline]
pub(crate) fn host_slice<R: PhysMemory + ?Sized>(mem: &R, paddr: u64, len: usize) -> Result<&[u8]> {
    mem.slice(paddr, len)
        .ok_or(MemoryError::Unbacked { paddr, len })
}

#[inline]
pub(crate) fn host_slice_mut<R: PhysMemory + ?Sized>(
    mem: &mut R,
    paddr: u64,
    len: usize,
) -> Result<&mut [u8]> {
    mem.slice_mut(paddr, len)
        .ok_or(MemoryError::Unbacked { paddr, len })
}
