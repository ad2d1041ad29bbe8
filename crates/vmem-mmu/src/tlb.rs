use crate::PAGE_MASK;

/// Number of cached translations. Must be a power of two with room for the ring.
pub const TLB_ENTRIES: usize = 16;

const _: () = assert!(TLB_ENTRIES.is_power_of_two() && TLB_ENTRIES >= 2);

/// A cached page translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    /// Page-aligned guest virtual address.
    pub vbase: u64,
    /// Physical base of the backing page.
    pub pbase: u64,
}

/// Small fully-associative translation cache.
///
/// Replacement policy: slot 0 always holds the most recently walked page. On insert the
/// previous slot-0 entry is moved into the slot chosen by `cursor`, which cycles through
/// slots `1..TLB_ENTRIES` and never selects slot 0. Entries are not deduplicated, so the
/// same page can sit in slot 0 and in the ring at once; lookup is a linear scan where the
/// first match wins.
#[derive(Debug, Clone)]
pub struct Tlb {
    entries: [Option<TlbEntry>; TLB_ENTRIES],
    cursor: usize,
}

impl Default for Tlb {
    fn default() -> Self {
        Self::new()
    }
}

impl Tlb {
    pub const fn new() -> Self {
        Self {
            entries: [None; TLB_ENTRIES],
            cursor: 0,
        }
    }

    /// Physical page base cached for the page-aligned address `vbase`.
    #[inline]
    pub fn lookup(&self, vbase: u64) -> Option<u64> {
        self.entries
            .iter()
            .flatten()
            .find(|entry| entry.vbase == vbase)
            .map(|entry| entry.pbase)
    }

    #[inline]
    pub fn insert(&mut self, vbase: u64, pbase: u64) {
        debug_assert_eq!(vbase & PAGE_MASK, 0, "TLB entry must be page aligned");
        self.cursor = if self.cursor + 1 >= TLB_ENTRIES {
            1
        } else {
            self.cursor + 1
        };
        self.entries[self.cursor] = self.entries[0];
        self.entries[0] = Some(TlbEntry { vbase, pbase });
    }

    /// Drops every entry that caches `vbase`.
    pub fn invalidate(&mut self, vbase: u64) {
        for slot in self.entries.iter_mut() {
            if matches!(slot, Some(entry) if entry.vbase == vbase) {
                *slot = None;
            }
        }
    }

    pub fn flush(&mut self) {
        self.entries = [None; TLB_ENTRIES];
        self.cursor = 0;
    }

    #[inline]
    pub fn entries(&self) -> &[Option<TlbEntry>; TLB_ENTRIES] {
        &self.entries
    }

    /// Slot that received the previous most-recent entry on the last insert (0 if empty).
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
