//! Block descriptors: the per-span metadata records of the chain.
//!
//! A [`BlockDescriptor`] covers one contiguous span `[offset, offset + size)`
//! of the arena. Descriptors are linked by [`SlotId`] in ascending offset
//! order, and the chain of them partitions the arena exactly once: it is
//! the free list and the used list at the same time, with [`BlockState`]
//! telling the two apart.

use std::fmt;

use carve_core::{BlockAddr, SlotId};

/// Whether a span is available or handed out to a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Available for allocation.
    Free,
    /// Held by exactly one client.
    Used,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Used => write!(f, "used"),
        }
    }
}

/// Metadata for one span of the arena.
///
/// The offset is cached rather than recomputed by summing predecessor
/// sizes, so every split and merge must keep it consistent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDescriptor {
    /// Byte offset of the span from the arena base.
    pub offset: usize,
    /// Length of the span in bytes. Always non-zero while linked.
    pub size: usize,
    /// Free or used.
    pub state: BlockState,
    /// The descriptor of the immediately following span.
    pub next: Option<SlotId>,
}

impl BlockDescriptor {
    /// Bookkeeping cost of one descriptor record: size, state and link,
    /// counted as three machine words.
    pub const FOOTPRINT: usize = 3 * std::mem::size_of::<usize>();

    /// A free descriptor covering `[offset, offset + size)`.
    pub fn free(offset: usize, size: usize, next: Option<SlotId>) -> Self {
        Self {
            offset,
            size,
            state: BlockState::Free,
            next,
        }
    }

    /// One past the last byte of the span.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Whether the span is free.
    pub fn is_free(&self) -> bool {
        self.state == BlockState::Free
    }

    /// The client-facing view of this span.
    pub fn info(&self) -> BlockInfo {
        BlockInfo {
            addr: BlockAddr(self.offset),
            size: self.size,
            state: self.state,
        }
    }
}

/// Read-only view of one span, as reported by a chain walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Start of the span.
    pub addr: BlockAddr,
    /// Length in bytes.
    pub size: usize,
    /// Free or used.
    pub state: BlockState,
}

impl BlockInfo {
    /// One past the last byte of the span.
    pub fn end(&self) -> usize {
        self.addr.0 + self.size
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:#x}..{:#x}) {} {}B",
            self.addr.0,
            self.end(),
            self.state,
            self.size
        )
    }
}
