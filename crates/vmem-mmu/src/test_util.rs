//! Minimal page-table construction for tests and benches.
//!
//! Real tables are built by the guest (or the loader); this bump allocator only exists so
//! callers can set up mappings without hand-writing entries.

use crate::{entry_addr, PageTableEntry, PhysMemory, PteFlags, LEVEL_SHIFTS, PAGE_MASK, PAGE_SIZE};

const TABLE_FLAGS: PteFlags = PteFlags::PRESENT
    .union(PteFlags::WRITABLE)
    .union(PteFlags::USER);

/// Builds a 4-level table in guest memory, allocating table frames from a bump region.
#[derive(Debug, Clone)]
pub struct PageMapper {
    root: u64,
    next_table: u64,
    table_limit: u64,
}

impl PageMapper {
    /// Places the root at `tables.start` and hands out further table frames from the rest of
    /// the range. Panics if the range cannot hold the root.
    pub fn new<M: PhysMemory + ?Sized>(mem: &mut M, tables: core::ops::Range<u64>) -> Self {
        assert_eq!(tables.start & PAGE_MASK, 0, "table region must be page aligned");
        let mut mapper = Self {
            root: tables.start,
            next_table: tables.start,
            table_limit: tables.end,
        };
        mapper.root = mapper.alloc_table(mem);
        mapper
    }

    #[inline]
    pub fn root(&self) -> u64 {
        self.root
    }

    fn alloc_table<M: PhysMemory + ?Sized>(&mut self, mem: &mut M) -> u64 {
        let table = self.next_table;
        assert!(
            table + PAGE_SIZE as u64 <= self.table_limit,
            "page-table region exhausted"
        );
        mem.slice_mut(table, PAGE_SIZE)
            .expect("page-table frame outside guest memory")
            .fill(0);
        self.next_table += PAGE_SIZE as u64;
        table
    }

    /// Maps the page containing `vaddr` to the physical page containing `paddr`.
    pub fn map<M: PhysMemory + ?Sized>(&mut self, mem: &mut M, vaddr: u64, paddr: u64) {
        let mut table = self.root;
        for (level, shift) in LEVEL_SHIFTS.into_iter().enumerate() {
            let slot = entry_addr(table, vaddr, shift).expect("entry address overflow");
            if level == LEVEL_SHIFTS.len() - 1 {
                let leaf = PageTableEntry::new(paddr, TABLE_FLAGS);
                mem.write_u64(slot, leaf.raw()).expect("leaf entry outside guest memory");
                return;
            }

            let entry = PageTableEntry::from_raw(mem.read_u64(slot).expect("entry outside guest memory"));
            table = if entry.is_present() {
                entry.addr()
            } else {
                let next = self.alloc_table(mem);
                mem.write_u64(slot, PageTableEntry::new(next, TABLE_FLAGS).raw())
                    .expect("entry outside guest memory");
                next
            };
        }
    }

    /// Maps `count` consecutive pages starting at `vaddr` to consecutive frames at `paddr`.
    pub fn map_range<M: PhysMemory + ?Sized>(
        &mut self,
        mem: &mut M,
        vaddr: u64,
        paddr: u64,
        count: u64,
    ) {
        for i in 0..count {
            let off = i * PAGE_SIZE as u64;
            self.map(mem, vaddr + off, paddr + off);
        }
    }

    /// Physical address of the entry used at `level` (0 = root) when translating `vaddr`,
    /// or `None` if an earlier level is not present.
    pub fn entry_slot<M: PhysMemory + ?Sized>(
        &self,
        mem: &mut M,
        vaddr: u64,
        level: usize,
    ) -> Option<u64> {
        let mut table = self.root;
        for (i, shift) in LEVEL_SHIFTS.into_iter().enumerate() {
            let slot = entry_addr(table, vaddr, shift)?;
            if i == level {
                return Some(slot);
            }
            let entry = PageTableEntry::from_raw(mem.read_u64(slot)?);
            if !entry.is_present() {
                return None;
            }
            table = entry.addr();
        }
        None
    }

    /// Sets or clears the present bit of the entry used at `level` for `vaddr`.
    pub fn set_present<M: PhysMemory + ?Sized>(
        &self,
        mem: &mut M,
        vaddr: u64,
        level: usize,
        present: bool,
    ) {
        let slot = self
            .entry_slot(mem, vaddr, level)
            .expect("no entry at requested level");
        let entry = PageTableEntry::from_raw(mem.read_u64(slot).expect("entry outside guest memory"));
        mem.write_u64(slot, entry.with_present(present).raw())
            .expect("entry outside guest memory");
    }
}
