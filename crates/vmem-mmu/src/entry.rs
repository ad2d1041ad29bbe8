use bitflags::bitflags;

/// Bits of an entry that hold the next-level table (or leaf page) address.
pub const ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

bitflags! {
    /// Low flag bits of a paging-structure entry.
    ///
    /// Translation only consults [`PteFlags::PRESENT`]; the remaining bits are carried so
    /// table builders and diagnostics can round-trip them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PteFlags: u64 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
    }
}

/// One 64-bit paging-structure entry, as read from guest physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Builds an entry pointing at `addr` (masked to a 4KiB frame).
    #[inline]
    pub const fn new(addr: u64, flags: PteFlags) -> Self {
        Self((addr & ADDR_MASK) | flags.bits())
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_present(self) -> bool {
        self.0 & PteFlags::PRESENT.bits() != 0
    }

    /// Physical address of the next-level table, or of the destination page at the leaf.
    #[inline]
    pub const fn addr(self) -> u64 {
        self.0 & ADDR_MASK
    }

    #[inline]
    pub const fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub const fn with_present(self, present: bool) -> Self {
        if present {
            Self(self.0 | PteFlags::PRESENT.bits())
        } else {
            Self(self.0 & !PteFlags::PRESENT.bits())
        }
    }
}
