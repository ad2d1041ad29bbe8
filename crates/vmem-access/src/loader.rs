use std::borrow::Cow;
use std::ffi::CStr;

use tracing::debug;
use vmem_mmu::{page_remaining, PhysMemory, PAGE_SIZE};

use crate::error::Result;
use crate::{host_slice, AccessDescriptor, Machine};

impl<R: PhysMemory> Machine<R> {
    /// Loads the NUL-terminated guest string at `addr`.
    ///
    /// A string that ends in its first page is returned in place. Otherwise it is copied
    /// into a fresh buffer owned by the machine's temporary list, which stays valid until
    /// [`Machine::drain_temps`]. Returns `Ok(None)` for a null address, an unmapped page, or
    /// a failed allocation; a full temporary list is an error.
    pub fn load_str(&mut self, addr: u64) -> Result<Option<&CStr>> {
        if addr == 0 {
            return Ok(None);
        }
        let Some(paddr) = self.mmu.resolve(&mut self.mem, addr) else {
            return Ok(None);
        };

        let have = page_remaining(addr);
        let nul = host_slice(&self.mem, paddr, have)?
            .iter()
            .position(|&b| b == 0);
        if let Some(nul) = nul {
            self.read = AccessDescriptor::read(addr, nul);
            let bytes = host_slice(&self.mem, paddr, nul + 1)?;
            return Ok(CStr::from_bytes_with_nul(bytes).ok());
        }

        self.temps.ensure_room(addr)?;
        let mut copy = Vec::new();
        if copy.try_reserve_exact(have + PAGE_SIZE).is_err() {
            return Ok(None);
        }
        copy.extend_from_slice(host_slice(&self.mem, paddr, have)?);

        loop {
            let next = addr.wrapping_add(copy.len() as u64);
            let Some(paddr) = self.mmu.resolve(&mut self.mem, next) else {
                debug!(addr, unmapped = next, "string runs into unmapped page");
                return Ok(None);
            };

            let page = host_slice(&self.mem, paddr, PAGE_SIZE)?;
            if let Some(nul) = page.iter().position(|&b| b == 0) {
                copy.extend_from_slice(&page[..=nul]);
                let len = copy.len() - 1;
                self.read = AccessDescriptor::read(addr, len);
                debug!(addr, len, "loaded page-crossing string");
                let owned = self.temps.push(copy.into_boxed_slice());
                return Ok(CStr::from_bytes_with_nul(owned).ok());
            }

            copy.extend_from_slice(page);
            if copy.try_reserve_exact(PAGE_SIZE).is_err() {
                return Ok(None);
            }
        }
    }

    /// Loads `size` guest bytes at `addr`, which may span any number of pages.
    ///
    /// A range inside the first page is borrowed in place; anything longer is copied into
    /// a buffer owned by the caller. Returns `Ok(None)` for a null address, an unmapped
    /// page, or a failed allocation.
    pub fn load_buf(&mut self, addr: u64, size: usize) -> Result<Option<Cow<'_, [u8]>>> {
        if addr == 0 {
            return Ok(None);
        }
        let Some(paddr) = self.mmu.resolve(&mut self.mem, addr) else {
            return Ok(None);
        };

        let have = page_remaining(addr);
        if size <= have {
            self.read = AccessDescriptor::read(addr, size);
            return Ok(Some(Cow::Borrowed(host_slice(&self.mem, paddr, size)?)));
        }

        let mut copy = Vec::new();
        if copy.try_reserve_exact(size).is_err() {
            return Ok(None);
        }
        copy.extend_from_slice(host_slice(&self.mem, paddr, have)?);

        while copy.len() < size {
            let next = addr.wrapping_add(copy.len() as u64);
            let need = (size - copy.len()).min(PAGE_SIZE);
            let Some(paddr) = self.mmu.resolve(&mut self.mem, next) else {
                debug!(addr, size, unmapped = next, "buffer runs into unmapped page");
                return Ok(None);
            };
            copy.extend_from_slice(host_slice(&self.mem, paddr, need)?);
        }

        self.read = AccessDescriptor::read(addr, size);
        Ok(Some(Cow::Owned(copy)))
    }
}
