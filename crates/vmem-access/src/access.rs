use tracing::error;
use vmem_mmu::{crosses_page, page_remaining, PhysMemory, PAGE_SIZE};

use crate::error::{MemoryError, Result};
use crate::{host_slice, host_slice_mut, AccessDescriptor, Machine};

/// Caller-owned bounce buffer for a page-crossing operand.
pub type Scratch = [u8; PAGE_SIZE];

/// One contiguous host range backing part of a guest access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub paddr: u64,
    pub len: usize,
}

enum Span {
    InPage(u64),
    Split([Fragment; 2]),
}

fn copy_in<R: PhysMemory + ?Sized>(mem: &R, fragments: &[Fragment; 2], dst: &mut [u8]) -> Result<()> {
    let (head, tail) = dst.split_at_mut(fragments[0].len);
    head.copy_from_slice(host_slice(mem, fragments[0].paddr, fragments[0].len)?);
    tail.copy_from_slice(host_slice(mem, fragments[1].paddr, fragments[1].len)?);
    Ok(())
}

/// A store started by [`Machine::begin_store`] and friends.
///
/// Write the new operand bytes into [`PendingStore::buf`], then call
/// [`PendingStore::end_store`] exactly once. While the value is alive it holds the machine's
/// memory borrow, so nothing can re-enter translation between the two phases.
#[must_use = "a pending store does nothing until `end_store` is called"]
pub struct PendingStore<'a, R: ?Sized> {
    kind: PendingKind<'a, R>,
}

enum PendingKind<'a, R: ?Sized> {
    /// The operand address was zero and the write is skipped.
    Suppressed,
    /// Operand lies in one page; writes land in guest memory directly.
    InPlace(&'a mut [u8]),
    /// Operand crosses a page; writes go to the scratch buffer and are split on completion.
    Split {
        mem: &'a mut R,
        fragments: [Fragment; 2],
        buf: &'a mut [u8],
    },
}

impl<'a, R: PhysMemory + ?Sized> PendingStore<'a, R> {
    /// Bytes of the operand. Empty for a suppressed store.
    #[inline]
    pub fn buf(&mut self) -> &mut [u8] {
        match &mut self.kind {
            PendingKind::Suppressed => &mut [],
            PendingKind::InPlace(buf) => &mut buf[..],
            PendingKind::Split { buf, .. } => &mut buf[..],
        }
    }

    #[inline]
    pub fn is_suppressed(&self) -> bool {
        matches!(self.kind, PendingKind::Suppressed)
    }

    /// The two host fragments of a page-crossing store.
    #[inline]
    pub fn fragments(&self) -> Option<[Fragment; 2]> {
        match &self.kind {
            PendingKind::Split { fragments, .. } => Some(*fragments),
            _ => None,
        }
    }

    /// Completes the store, copying a page-crossing operand back across its two fragments.
    pub fn end_store(self) -> Result<()> {
        let PendingKind::Split {
            mem,
            fragments,
            buf,
        } = self.kind
        else {
            return Ok(());
        };

        let (head, tail) = buf.split_at(fragments[0].len);
        host_slice_mut(&mut *mem, fragments[0].paddr, head.len())?.copy_from_slice(head);
        host_slice_mut(&mut *mem, fragments[1].paddr, tail.len())?.copy_from_slice(tail);
        Ok(())
    }
}

impl<R: PhysMemory> Machine<R> {
    fn span(&mut self, addr: u64, size: usize) -> Result<Span> {
        if size > PAGE_SIZE {
            error!(addr, size, "memory operand larger than a page");
            return Err(MemoryError::AccessTooLarge { addr, size });
        }

        if !crosses_page(addr, size) {
            return Ok(Span::InPage(self.mmu.resolve_or_fault(&mut self.mem, addr)?));
        }

        let first = page_remaining(addr);
        let a = self.mmu.resolve_or_fault(&mut self.mem, addr)?;
        let b = self
            .mmu
            .resolve_or_fault(&mut self.mem, addr.wrapping_add(first as u64))?;
        Ok(Span::Split([
            Fragment {
                paddr: a,
                len: first,
            },
            Fragment {
                paddr: b,
                len: size - first,
            },
        ]))
    }

    /// Reads a `size`-byte operand at `addr`.
    ///
    /// An operand inside one page is returned as a direct view of guest memory; one that
    /// crosses a page is gathered into `scratch`. Faults if either page is unmapped.
    pub fn load<'a>(&'a mut self, addr: u64, size: usize, scratch: &'a mut Scratch) -> Result<&'a [u8]> {
        self.read = AccessDescriptor::read(addr, size);
        match self.span(addr, size)? {
            Span::InPage(paddr) => host_slice(&self.mem, paddr, size),
            Span::Split(fragments) => {
                let buf = &mut scratch[..size];
                copy_in(&self.mem, &fragments, buf)?;
                Ok(buf)
            }
        }
    }

    /// Starts a write of a `size`-byte operand. The buffer's previous contents are
    /// unspecified for page-crossing operands; the caller overwrites all of it.
    pub fn begin_store<'a>(
        &'a mut self,
        addr: u64,
        size: usize,
        scratch: &'a mut Scratch,
    ) -> Result<PendingStore<'a, R>> {
        self.write = AccessDescriptor::write(addr, size);
        self.begin(addr, size, scratch, false)
    }

    /// Starts a read-modify-write: like [`Machine::begin_store`], but the buffer starts out
    /// holding the current operand.
    pub fn begin_load_store<'a>(
        &'a mut self,
        addr: u64,
        size: usize,
        scratch: &'a mut Scratch,
    ) -> Result<PendingStore<'a, R>> {
        self.write = AccessDescriptor::write(addr, size);
        self.begin(addr, size, scratch, true)
    }

    /// [`Machine::begin_store`] where address 0 means "no destination".
    pub fn begin_store_np<'a>(
        &'a mut self,
        addr: u64,
        size: usize,
        scratch: &'a mut Scratch,
    ) -> Result<PendingStore<'a, R>> {
        if addr == 0 {
            return Ok(PendingStore {
                kind: PendingKind::Suppressed,
            });
        }
        self.begin_store(addr, size, scratch)
    }

    /// [`Machine::begin_load_store`] where address 0 means "no destination".
    pub fn begin_load_store_np<'a>(
        &'a mut self,
        addr: u64,
        size: usize,
        scratch: &'a mut Scratch,
    ) -> Result<PendingStore<'a, R>> {
        if addr == 0 {
            return Ok(PendingStore {
                kind: PendingKind::Suppressed,
            });
        }
        self.begin_load_store(addr, size, scratch)
    }

    fn begin<'a>(
        &'a mut self,
        addr: u64,
        size: usize,
        scratch: &'a mut Scratch,
        load: bool,
    ) -> Result<PendingStore<'a, R>> {
        let kind = match self.span(addr, size)? {
            Span::InPage(paddr) => PendingKind::InPlace(host_slice_mut(&mut self.mem, paddr, size)?),
            Span::Split(fragments) => {
                let buf = &mut scratch[..size];
                if load {
                    copy_in(&self.mem, &fragments, buf)?;
                }
                PendingKind::Split {
                    mem: &mut self.mem,
                    fragments,
                    buf,
                }
            }
        };
        Ok(PendingStore { kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{machine, DATA_BASE, VBASE};

    #[test]
    fn in_page_load_is_zero_copy() {
        let (mut m, _) = machine(2);
        let addr = VBASE + 0x10;
        let paddr = m.resolve(addr).unwrap();
        let direct = m.mem().slice(paddr, 8).unwrap().as_ptr();

        let mut scratch = [0u8; PAGE_SIZE];
        let loaded = m.load(addr, 8, &mut scratch).unwrap();
        assert_eq!(loaded.as_ptr(), direct);
        assert_eq!(m.read_access(), AccessDescriptor::read(addr, 8));
    }

    #[test]
    fn operand_ending_on_page_boundary_does_not_split() {
        let (mut m, _) = machine(2);
        let mut scratch = [0u8; PAGE_SIZE];
        let pending = m.begin_store(VBASE + 0xff8, 8, &mut scratch).unwrap();
        assert_eq!(pending.fragments(), None);
        pending.end_store().unwrap();
    }

    #[test]
    fn crossing_load_gathers_both_pages() {
        let (mut m, _) = machine(2);
        m.mem_mut().as_mut_slice()[DATA_BASE as usize + 0xffe..DATA_BASE as usize + 0x1002]
            .copy_from_slice(&[1, 2, 3, 4]);

        let mut scratch = [0xEEu8; PAGE_SIZE];
        let loaded = m.load(VBASE + 0xffe, 4, &mut scratch).unwrap();
        assert_eq!(loaded, &[1, 2, 3, 4]);
        let ptr = loaded.as_ptr();
        assert_eq!(ptr, scratch.as_ptr());
    }

    #[test]
    fn crossing_store_splits_at_page_boundary() {
        let (mut m, _) = machine(2);
        let mut scratch = [0u8; PAGE_SIZE];

        let mut pending = m.begin_store(VBASE + 0xffd, 8, &mut scratch).unwrap();
        let [a, b] = pending.fragments().unwrap();
        assert_eq!((a.len, b.len), (3, 5));
        assert_eq!(b.paddr, DATA_BASE + 0x1000);
        pending.buf().copy_from_slice(&0x0807_0605_0403_0201u64.to_le_bytes());
        pending.end_store().unwrap();

        let ram = m.mem().as_slice();
        let base = DATA_BASE as usize;
        assert_eq!(&ram[base + 0xffd..base + 0x1005], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(m.write_access(), AccessDescriptor::write(VBASE + 0xffd, 8));
    }

    #[test]
    fn load_store_sees_current_operand() {
        let (mut m, _) = machine(2);
        let base = DATA_BASE as usize;
        m.mem_mut().as_mut_slice()[base + 0xffe..base + 0x1002].copy_from_slice(&[9, 8, 7, 6]);

        let mut scratch = [0u8; PAGE_SIZE];
        let mut pending = m.begin_load_store(VBASE + 0xffe, 4, &mut scratch).unwrap();
        assert_eq!(pending.buf(), &[9, 8, 7, 6]);
        for byte in pending.buf() {
            *byte += 1;
        }
        pending.end_store().unwrap();

        assert_eq!(&m.mem().as_slice()[base + 0xffe..base + 0x1002], &[10, 9, 8, 7]);
    }

    #[test]
    fn unmapped_second_page_faults_before_any_write() {
        let (mut m, _) = machine(1);
        let mut scratch = [0u8; PAGE_SIZE];
        let err = m.begin_store(VBASE + 0xffc, 8, &mut scratch).err();
        assert_eq!(
            err.and_then(|e| e.fault()).map(|f| f.vaddr()),
            Some(VBASE + 0x1000)
        );
    }

    #[test]
    fn oversized_operand_is_rejected() {
        let (mut m, _) = machine(2);
        let mut scratch = [0u8; PAGE_SIZE];
        assert_eq!(
            m.load(VBASE, PAGE_SIZE + 1, &mut scratch).err(),
            Some(MemoryError::AccessTooLarge {
                addr: VBASE,
                size: PAGE_SIZE + 1
            })
        );
    }

    #[test]
    fn null_destination_suppresses_store() {
        let (mut m, _) = machine(1);
        let mut scratch = [0u8; PAGE_SIZE];

        let mut pending = m.begin_store_np(0, 8, &mut scratch).unwrap();
        assert!(pending.is_suppressed());
        assert!(pending.buf().is_empty());
        pending.end_store().unwrap();
        assert_eq!(m.write_access(), AccessDescriptor::default());

        let pending = m.begin_load_store_np(VBASE, 4, &mut scratch).unwrap();
        assert!(!pending.is_suppressed());
        pending.end_store().unwrap();
    }
}
