use vmem_mmu::test_util::PageMapper;
use vmem_mmu::{GuestRam, PAGE_SIZE};

use crate::{Machine, MachineConfig};

pub(crate) const VBASE: u64 = 0x0000_5555_0000_0000;
pub(crate) const DATA_BASE: u64 = 0x10_0000;

/// A machine with `pages` consecutive pages mapped at [`VBASE`] onto frames starting at
/// [`DATA_BASE`].
pub(crate) fn machine(pages: u64) -> (Machine<GuestRam>, PageMapper) {
    machine_with(pages, MachineConfig {
        ram_size_bytes: 0x40_0000,
        ..Default::default()
    })
}

pub(crate) fn machine_with(pages: u64, config: MachineConfig) -> (Machine<GuestRam>, PageMapper) {
    let mut m = Machine::new(config).unwrap();
    let mut mapper = PageMapper::new(m.mem_mut(), 0x1000..DATA_BASE);
    mapper.map_range(m.mem_mut(), VBASE, DATA_BASE, pages);
    m.set_root(mapper.root());
    (m, mapper)
}

/// Physical offset of guest page `page` (relative to [`VBASE`]) plus `skew`.
pub(crate) fn phys(page: u64, skew: usize) -> usize {
    DATA_BASE as usize + page as usize * PAGE_SIZE + skew
}
