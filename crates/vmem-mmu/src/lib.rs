//! Guest virtual → host translation for the emulator's memory subsystem.
//!
//! This crate implements:
//! - 4-level radix page-table walks over guest physical memory (4KiB pages only)
//! - a small software TLB with a "slot 0 = most recent, round-robin ring" policy
//! - [`Mmu`], which composes the two and escalates failed walks into [`TranslateFault`]

mod entry;
mod fault;
mod ram;
mod tlb;
mod walk;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;


use tracing::trace;

pub use entry::{PageTableEntry, PteFlags, ADDR_MASK};
pub use fault::TranslateFault;
pub use ram::{GuestRam, PhysMemory};
pub use tlb::{Tlb, TlbEntry, TLB_ENTRIES};
pub use walk::{entry_addr, walk, LEVEL_SHIFTS};

pub const PAGE_SIZE: usize = 4096;
pub const PAGE_MASK: u64 = PAGE_SIZE as u64 - 1;

/// Offset of `addr` inside its page (the "skew").
#[inline]
pub const fn page_offset(addr: u64) -> usize {
    (addr & PAGE_MASK) as usize
}

/// Bytes from `addr` to the end of its page.
#[inline]
pub const fn page_remaining(addr: u64) -> usize {
    PAGE_SIZE - page_offset(addr)
}

/// Whether `[addr, addr + size)` straddles a page boundary.
#[inline]
pub const fn crosses_page(addr: u64, size: usize) -> bool {
    page_offset(addr) + size > PAGE_SIZE
}

/// MMU/TLB counters.
///
/// `page_walks` is the observable hook for cache behaviour: a page that stays cached never
/// walks the table again.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MmuStats {
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    /// Page-table walks performed due to TLB misses (successful or not).
    pub page_walks: u64,
    pub tlb_flushes: u64,
}

/// Page-table root plus translation cache.
#[derive(Debug, Clone, Default)]
pub struct Mmu {
    root: u64,
    tlb: Tlb,
    stats: MmuStats,
}

impl Mmu {
    pub fn new(root: u64) -> Self {
        Self {
            root,
            tlb: Tlb::new(),
            stats: MmuStats::default(),
        }
    }

    #[inline]
    pub fn root(&self) -> u64 {
        self.root
    }

    /// Switches to a different page table. Cached translations belong to the old table and
    /// are flushed.
    pub fn set_root(&mut self, root: u64) {
        self.root = root;
        self.flush();
    }

    /// Invalidates every cached translation. Must be called after editing the live table.
    pub fn flush(&mut self) {
        self.tlb.flush();
        self.stats.tlb_flushes += 1;
        trace!(root = self.root, "tlb flushed");
    }

    pub fn invalidate_page(&mut self, vaddr: u64) {
        self.tlb.invalidate(vaddr & !PAGE_MASK);
    }

    #[inline]
    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    #[inline]
    pub fn stats(&self) -> MmuStats {
        self.stats
    }

    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = MmuStats::default();
    }

    /// Translates `vaddr` to a physical address, consulting the TLB first.
    ///
    /// Returns `None` if the page is not mapped.
    #[inline]
    pub fn resolve<M: PhysMemory + ?Sized>(&mut self, mem: &mut M, vaddr: u64) -> Option<u64> {
        let vbase = vaddr & !PAGE_MASK;
        let skew = vaddr & PAGE_MASK;

        if let Some(pbase) = self.tlb.lookup(vbase) {
            self.stats.tlb_hits += 1;
            return Some(pbase + skew);
        }

        self.stats.tlb_misses += 1;
        self.stats.page_walks += 1;
        let Some(pbase) = walk(mem, self.root, vbase) else {
            trace!(vaddr, root = self.root, "page walk failed");
            return None;
        };
        trace!(vbase, pbase, "page walk");
        self.tlb.insert(vbase, pbase);
        Some(pbase + skew)
    }

    /// Like [`Mmu::resolve`], but a missing page becomes a [`TranslateFault`] that aborts the
    /// current instruction.
    #[inline]
    pub fn resolve_or_fault<M: PhysMemory + ?Sized>(
        &mut self,
        mem: &mut M,
        vaddr: u64,
    ) -> Result<u64, TranslateFault> {
        self.resolve(mem, vaddr)
            .ok_or(TranslateFault::not_present(vaddr))
    }
}
