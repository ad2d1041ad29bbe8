use thiserror::Error;
use vmem_mmu::TranslateFault;

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised by guest memory accesses.
///
/// [`MemoryError::Fault`] aborts the current instruction. The remaining variants are broken
/// invariants on the caller's side (oversized accesses, an undrained temporary list) and are
/// reported instead of being allowed to write past a bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error(transparent)]
    Fault(#[from] TranslateFault),

    #[error("access of {size} bytes at {addr:#x} is larger than a page")]
    AccessTooLarge { addr: u64, size: usize },

    #[error("stash reservation of {size} bytes at {addr:#x} exceeds capacity {capacity}")]
    StashOverflow {
        addr: u64,
        size: usize,
        capacity: usize,
    },

    #[error("temporary allocation list full ({capacity} entries) while loading {addr:#x}")]
    TempsExhausted { addr: u64, capacity: usize },

    #[error("host range {paddr:#x}+{len} is not backed by guest memory")]
    Unbacked { paddr: u64, len: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl MemoryError {
    /// The page fault behind this error, if it is one.
    pub fn fault(&self) -> Option<TranslateFault> {
        match self {
            Self::Fault(fault) => Some(*fault),
            _ => None,
        }
    }
}
