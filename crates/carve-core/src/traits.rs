//! The client-facing allocation trait.

use crate::error::AllocError;
use crate::id::BlockAddr;

/// Block allocation over a fixed arena.
///
/// Implemented by arena allocators; consumed by data structures that keep
/// their nodes in arena blocks. All methods take `&self` so a single
/// allocator can be shared between threads; implementations serialize
/// mutation internally.
///
/// Block contents are reached through [`read`](ArenaAlloc::read) and
/// [`write`](ArenaAlloc::write) rather than through pointers, so a stale
/// address produces an error instead of touching another block's bytes
/// (unless the offset has since been handed out again).
pub trait ArenaAlloc {
    /// Allocate a block of at least `size` bytes.
    ///
    /// Fails with [`AllocError::InvalidSize`] for `size == 0`,
    /// [`AllocError::OutOfSpace`] when no free span fits, and
    /// [`AllocError::MetadataExhausted`] when the split needs a descriptor
    /// slot the pool cannot supply.
    fn alloc(&self, size: usize) -> Result<BlockAddr, AllocError>;

    /// Release a block previously returned by `alloc` or `resize`.
    ///
    /// Unknown addresses and already-free blocks are rejected without
    /// touching allocator state.
    fn free(&self, addr: BlockAddr) -> Result<(), AllocError>;

    /// Grow or shrink a block, preserving its contents up to the smaller of
    /// the old and new sizes.
    ///
    /// `None` behaves as `alloc(size)`. On failure the original block is
    /// left valid and unchanged.
    fn resize(&self, addr: Option<BlockAddr>, size: usize) -> Result<BlockAddr, AllocError>;

    /// Copy `buf.len()` bytes starting `offset` bytes into the block.
    fn read(&self, addr: BlockAddr, offset: usize, buf: &mut [u8]) -> Result<(), AllocError>;

    /// Copy `bytes` into the block starting `offset` bytes in.
    fn write(&self, addr: BlockAddr, offset: usize, bytes: &[u8]) -> Result<(), AllocError>;
}
