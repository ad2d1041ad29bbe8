use thiserror::Error;

/// A translation failure.
///
/// The executor propagates this with `?` to abandon the in-flight instruction; the MMU
/// never hands out a partially resolved address instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranslateFault {
    /// Some level of the page walk hit an entry without the present bit, or the leaf page
    /// lies outside guest memory.
    #[error("page fault: guest address {vaddr:#x} is not mapped")]
    NotPresent { vaddr: u64 },
}

impl TranslateFault {
    #[inline]
    pub fn not_present(vaddr: u64) -> Self {
        Self::NotPresent { vaddr }
    }

    /// Faulting guest address.
    #[inline]
    pub fn vaddr(&self) -> u64 {
        match *self {
            Self::NotPresent { vaddr } => vaddr,
        }
    }
}
