use tracing::error;

use crate::error::{MemoryError, Result};

/// Bounded list of heap buffers handed out by [`crate::Machine::load_str`].
///
/// Entries stay alive (and their addresses stable) until [`TempList::drain`]; the executor
/// is expected to drain once it is done with the strings of an instruction.
#[derive(Debug)]
pub struct TempList {
    entries: Vec<Box<[u8]>>,
    capacity: usize,
}

impl TempList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Fails if another entry could not be registered for a load of `addr`.
    pub(crate) fn ensure_room(&self, addr: u64) -> Result<()> {
        if self.is_full() {
            error!(
                addr,
                capacity = self.capacity,
                "temporary allocation list exhausted; executor must drain it"
            );
            return Err(MemoryError::TempsExhausted {
                addr,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Takes ownership of `buf` and returns a view of it that lives as long as the list
    /// borrow. Callers must have checked [`TempList::ensure_room`].
    pub(crate) fn push(&mut self, buf: Box<[u8]>) -> &[u8] {
        debug_assert!(!self.is_full());
        let index = self.entries.len();
        self.entries.push(buf);
        &self.entries[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|buf| &**buf)
    }

    /// Releases every entry, returning how many were freed.
    pub fn drain(&mut self) -> usize {
        let freed = self.entries.len();
        self.entries.clear();
        freed
    }
}
