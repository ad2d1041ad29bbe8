use vmem_mmu::{page_remaining, Mmu, PhysMemory};

use crate::error::Result;
use crate::{host_slice, host_slice_mut, Machine};

/// Visits `[addr, addr + len)` one page-bounded chunk at a time as
/// `(guest address, physical address, offset into the range, chunk length)`.
fn for_each_chunk<R, F>(mmu: &mut Mmu, mem: &mut R, addr: u64, len: usize, mut f: F) -> Result<()>
where
    R: PhysMemory + ?Sized,
    F: FnMut(&mut R, u64, usize, usize) -> Result<()>,
{
    let mut done = 0usize;
    while done < len {
        let vaddr = addr.wrapping_add(done as u64);
        let chunk = page_remaining(vaddr).min(len - done);
        let paddr = mmu.resolve_or_fault(mem, vaddr)?;
        f(mem, paddr, done, chunk)?;
        done += chunk;
    }
    Ok(())
}

pub(crate) fn copy_from_guest<R: PhysMemory + ?Sized>(
    mmu: &mut Mmu,
    mem: &mut R,
    addr: u64,
    dst: &mut [u8],
) -> Result<()> {
    for_each_chunk(mmu, mem, addr, dst.len(), |mem, paddr, off, len| {
        dst[off..off + len].copy_from_slice(host_slice(mem, paddr, len)?);
        Ok(())
    })
}

pub(crate) fn copy_to_guest<R: PhysMemory + ?Sized>(
    mmu: &mut Mmu,
    mem: &mut R,
    addr: u64,
    src: &[u8],
) -> Result<()> {
    for_each_chunk(mmu, mem, addr, src.len(), |mem, paddr, off, len| {
        host_slice_mut(mem, paddr, len)?.copy_from_slice(&src[off..off + len]);
        Ok(())
    })
}

impl<R: PhysMemory> Machine<R> {
    /// Fills `len` guest bytes at `addr` with `byte`, across any number of pages.
    ///
    /// Pages before the first unmapped one are already written when the fault is returned.
    pub fn virtual_set(&mut self, addr: u64, byte: u8, len: usize) -> Result<()> {
        for_each_chunk(&mut self.mmu, &mut self.mem, addr, len, |mem, paddr, _, len| {
            host_slice_mut(mem, paddr, len)?.fill(byte);
            Ok(())
        })
    }

    /// Copies guest bytes at `addr` into `dst`.
    pub fn virtual_send<'d>(&mut self, dst: &'d mut [u8], addr: u64) -> Result<&'d mut [u8]> {
        copy_from_guest(&mut self.mmu, &mut self.mem, addr, dst)?;
        Ok(dst)
    }

    /// Copies `src` into guest memory at `addr`.
    pub fn virtual_recv(&mut self, addr: u64, src: &[u8]) -> Result<()> {
        copy_to_guest(&mut self.mmu, &mut self.mem, addr, src)
    }
}
