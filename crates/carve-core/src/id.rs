//! Strongly-typed identifiers for arena spans and descriptor slots.

use std::fmt;

/// Address of a block within an arena.
///
/// Addresses are byte offsets from the arena base, not machine pointers.
/// A `BlockAddr` is valid from the `alloc`/`resize` call that returned it
/// until the matching `free`, or until a `resize` that relocates the block.
/// After `deinit` every address is invalid, even if a later `init` happens
/// to hand out the same offset again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockAddr(pub usize);

impl BlockAddr {
    /// The byte offset of this block from the arena base.
    pub fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for BlockAddr {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Index of a block-descriptor slot in the metadata pool.
///
/// Slot handles are plain indices into a fixed array, so a descriptor is
/// never recovered from a bare address by pointer arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    /// The slot index as a `usize`, for indexing the pool's slot array.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SlotId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
