#![allow(dead_code)]

use std::sync::Once;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use vmem_access::{Machine, MachineConfig};
use vmem_mmu::test_util::PageMapper;
use vmem_mmu::{GuestRam, PAGE_SIZE};

/// Guest virtual base of the mapped window.
pub const VBASE: u64 = 0x0000_0040_0000_0000;
/// Physical frame backing the first page of the window.
pub const DATA_BASE: u64 = 0x20_0000;
pub const RAM_SIZE: u64 = 0x80_0000;

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Guest {
    pub machine: Machine<GuestRam>,
    pub mapper: PageMapper,
}

impl Guest {
    /// `pages` consecutive guest pages at [`VBASE`] backed by consecutive frames at
    /// [`DATA_BASE`].
    pub fn new(pages: u64) -> Result<Self> {
        Self::with_config(
            pages,
            MachineConfig {
                ram_size_bytes: RAM_SIZE,
                ..Default::default()
            },
        )
    }

    pub fn with_config(pages: u64, config: MachineConfig) -> Result<Self> {
        init_tracing();
        let mut machine = Machine::new(config).context("building machine")?;
        let mut mapper = PageMapper::new(machine.mem_mut(), 0x1000..DATA_BASE);
        mapper.map_range(machine.mem_mut(), VBASE, DATA_BASE, pages);
        machine.set_root(mapper.root());
        tracing::debug!(pages, root = mapper.root(), "guest window mapped");
        Ok(Self { machine, mapper })
    }

    /// Writes `bytes` straight into guest RAM at window offset `off`.
    pub fn poke(&mut self, off: usize, bytes: &[u8]) {
        let at = DATA_BASE as usize + off;
        self.machine.mem_mut().as_mut_slice()[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// Reads `len` bytes of guest RAM at window offset `off`.
    pub fn peek(&self, off: usize, len: usize) -> &[u8] {
        let at = DATA_BASE as usize + off;
        &self.machine.mem().as_slice()[at..at + len]
    }

    /// Sets or clears the present bit at `level` for `vaddr`, flushing the TLB.
    pub fn set_present(&mut self, vaddr: u64, level: usize, present: bool) {
        self.mapper
            .set_present(self.machine.mem_mut(), vaddr, level, present);
        self.machine.flush_tlb();
    }
}

pub fn page(n: u64) -> u64 {
    VBASE + n * PAGE_SIZE as u64
}
