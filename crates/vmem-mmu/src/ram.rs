/// Guest *physical* memory as seen by the page walker and the access paths.
///
/// Host "pointers" are physical addresses into this storage; every access goes through a
/// bounds-checked slice so a bad translation can never touch memory outside the guest.
pub trait PhysMemory {
    fn size(&self) -> u64;

    /// Returns `len` contiguous bytes starting at `paddr`, or `None` if the range is not
    /// backed.
    fn slice(&self, paddr: u64, len: usize) -> Option<&[u8]>;

    fn slice_mut(&mut self, paddr: u64, len: usize) -> Option<&mut [u8]>;

    /// Reads one paging-structure entry.
    ///
    /// Takes `&mut self` so backends can count or otherwise observe page-table reads.
    #[inline]
    fn read_u64(&mut self, paddr: u64) -> Option<u64> {
        let bytes = self.slice(paddr, 8)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    #[inline]
    fn write_u64(&mut self, paddr: u64, value: u64) -> Option<()> {
        self.slice_mut(paddr, 8)?
            .copy_from_slice(&value.to_le_bytes());
        Some(())
    }
}

impl<T: PhysMemory + ?Sized> PhysMemory for &mut T {
    #[inline]
    fn size(&self) -> u64 {
        <T as PhysMemory>::size(&**self)
    }

    #[inline]
    fn slice(&self, paddr: u64, len: usize) -> Option<&[u8]> {
        <T as PhysMemory>::slice(&**self, paddr, len)
    }

    #[inline]
    fn slice_mut(&mut self, paddr: u64, len: usize) -> Option<&mut [u8]> {
        <T as PhysMemory>::slice_mut(&mut **self, paddr, len)
    }

    #[inline]
    fn read_u64(&mut self, paddr: u64) -> Option<u64> {
        <T as PhysMemory>::read_u64(&mut **self, paddr)
    }

    #[inline]
    fn write_u64(&mut self, paddr: u64, value: u64) -> Option<()> {
        <T as PhysMemory>::write_u64(&mut **self, paddr, value)
    }
}

/// Flat, zero-initialised guest RAM.
#[derive(Debug, Clone)]
pub struct GuestRam {
    data: Vec<u8>,
}

impl GuestRam {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    fn range(&self, paddr: u64, len: usize) -> Option<core::ops::Range<usize>> {
        let start = usize::try_from(paddr).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }
}

impl PhysMemory for GuestRam {
    #[inline]
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    #[inline]
    fn slice(&self, paddr: u64, len: usize) -> Option<&[u8]> {
        let range = self.range(paddr, len)?;
        Some(&self.data[range])
    }

    #[inline]
    fn slice_mut(&mut self, paddr: u64, len: usize) -> Option<&mut [u8]> {
        let range = self.range(paddr, len)?;
        Some(&mut self.data[range])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_are_bounds_checked() {
        let mut ram = GuestRam::new(0x2000);
        assert_eq!(ram.size(), 0x2000);
        assert!(ram.slice(0x1FF8, 8).is_some());
        assert!(ram.slice(0x1FF9, 8).is_none());
        assert!(ram.slice(u64::MAX, 1).is_none());
        assert!(ram.slice_mut(0x2000, 1).is_none());
        assert_eq!(ram.slice(0x2000, 0), Some(&[][..]));
    }

    #[test]
    fn entry_words_are_little_endian() {
        let mut ram = GuestRam::new(0x1000);
        ram.write_u64(0x10, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(ram.as_slice()[0x10], 0x88);
        assert_eq!(ram.read_u64(0x10), Some(0x1122_3344_5566_7788));
        assert_eq!(ram.read_u64(0xFFC), None);
    }
}
