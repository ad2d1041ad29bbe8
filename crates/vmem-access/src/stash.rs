use tracing::{debug, error};
use vmem_mmu::{crosses_page, PhysMemory};

use crate::copy::{copy_from_guest, copy_to_guest};
use crate::error::{MemoryError, Result};
use crate::{host_slice_mut, Machine};

/// The machine's single reusable bounce buffer for page-crossing operands that need a
/// stable address across several steps.
#[derive(Debug)]
pub(crate) struct Stash {
    buf: Box<[u8]>,
    /// `(guest address, size)` of the outstanding reservation.
    pending: Option<(u64, usize)>,
}

impl Stash {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            pending: None,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<R: PhysMemory> Machine<R> {
    /// Returns a stable view of `size` guest bytes at `addr`.
    ///
    /// A range inside one page is returned in place. A page-crossing range is copied into
    /// the stash; modifications reach guest memory only through [`Machine::commit_stash`].
    /// Every call discards an earlier uncommitted reservation, including calls that return
    /// in place or fail.
    pub fn reserve(&mut self, addr: u64, size: usize) -> Result<&mut [u8]> {
        // A stash left uncommitted by an abandoned instruction is discarded.
        self.stash.pending = None;

        let capacity = self.stash.capacity();
        if size > capacity {
            error!(addr, size, capacity, "stash reservation exceeds capacity");
            return Err(MemoryError::StashOverflow {
                addr,
                size,
                capacity,
            });
        }

        if !crosses_page(addr, size) {
            let paddr = self.mmu.resolve_or_fault(&mut self.mem, addr)?;
            return host_slice_mut(&mut self.mem, paddr, size);
        }

        copy_from_guest(&mut self.mmu, &mut self.mem, addr, &mut self.stash.buf[..size])?;
        self.stash.pending = Some((addr, size));
        debug!(addr, size, "stashed page-crossing operand");
        Ok(&mut self.stash.buf[..size])
    }

    /// Writes an outstanding stash back to guest memory and releases it.
    pub fn commit_stash(&mut self) -> Result<()> {
        let Some((addr, size)) = self.stash.pending.take() else {
            return Ok(());
        };
        copy_to_guest(&mut self.mmu, &mut self.mem, addr, &self.stash.buf[..size])
    }

    /// `(guest address, size)` of the outstanding stash reservation, if any.
    #[inline]
    pub fn stash(&self) -> Option<(u64, usize)> {
        self.stash.pending
    }
}
