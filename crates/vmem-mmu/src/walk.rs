use crate::entry::PageTableEntry;
use crate::ram::PhysMemory;
use crate::{PAGE_SIZE, PAGE_MASK};

/// Bit offsets of the 9-bit table index at each level, root first.
pub const LEVEL_SHIFTS: [u32; 4] = [39, 30, 21, 12];

const INDEX_MASK: u64 = 0x1FF;

/// Physical address of the entry that indexes `vaddr` inside the table at `table`.
#[inline]
pub fn entry_addr(table: u64, vaddr: u64, shift: u32) -> Option<u64> {
    let index = (vaddr >> shift) & INDEX_MASK;
    table.checked_add(index * 8)
}

/// Walks the 4-level table rooted at `root` and returns the physical base of the page that
/// backs `vaddr`.
///
/// Returns `None` if any level is not present, or if the destination page is not fully
/// backed by `mem`; there is no partial result.
pub fn walk<M: PhysMemory + ?Sized>(mem: &mut M, root: u64, vaddr: u64) -> Option<u64> {
    let page = vaddr & !PAGE_MASK;
    let mut table = PageTableEntry::from_raw(root).addr();

    for shift in LEVEL_SHIFTS {
        let entry = PageTableEntry::from_raw(mem.read_u64(entry_addr(table, page, shift)?)?);
        if !entry.is_present() {
            return None;
        }
        table = entry.addr();
    }

    mem.slice(table, PAGE_SIZE)?;
    Some(table)
}
