//! Thread-safe, lifecycle-aware allocator over a [`Region`].
//!
//! [`RegionAllocator`] is the public face of the arena: it starts out
//! uninitialized, becomes ready on a successful [`init`](RegionAllocator::init),
//! and returns to uninitialized on [`deinit`](RegionAllocator::deinit).
//!
//! Every public call takes one exclusive lock for its whole duration and
//! then works on the [`Region`] through `&mut` methods, so no thread ever
//! observes a half-split or half-merged chain. Closures passed to
//! [`with_block`](RegionAllocator::with_block) and
//! [`with_block_mut`](RegionAllocator::with_block_mut) run with that lock
//! held and must not call back into the same allocator.

use std::sync::{Mutex, MutexGuard, PoisonError};

use carve_core::{AllocError, ArenaAlloc, BlockAddr};

use crate::config::ArenaConfig;
use crate::descriptor::BlockInfo;
use crate::error::InvariantViolation;
use crate::region::Region;
use crate::stats::ArenaStats;

/// A fixed-capacity region allocator, shareable across threads.
///
/// # Examples
///
/// ```
/// use carve_arena::RegionAllocator;
///
/// let arena = RegionAllocator::new();
/// arena.init(300).unwrap();
/// let a = arena.alloc(100).unwrap();
/// arena.write(a, 0, b"hello").unwrap();
/// let mut buf = [0u8; 5];
/// arena.read(a, 0, &mut buf).unwrap();
/// assert_eq!(&buf, b"hello");
/// arena.free(a).unwrap();
/// arena.deinit().unwrap();
/// ```
#[derive(Default)]
pub struct RegionAllocator {
    region: Mutex<Option<Region>>,
}

// Compile-time assertion: RegionAllocator must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<RegionAllocator>();
};

impl RegionAllocator {
    /// Create an uninitialized allocator. No storage is reserved until
    /// [`init`](Self::init).
    pub fn new() -> Self {
        Self {
            region: Mutex::new(None),
        }
    }

    /// Reserve an arena of `capacity` bytes with default settings.
    pub fn init(&self, capacity: usize) -> Result<(), AllocError> {
        self.init_with(ArenaConfig::new(capacity))
    }

    /// Reserve an arena as described by `config`.
    ///
    /// Fails with [`AllocError::AlreadyInitialized`] if the allocator is
    /// ready (the existing arena is untouched), and with the config or
    /// reservation error otherwise; on failure the allocator stays
    /// uninitialized.
    pub fn init_with(&self, config: ArenaConfig) -> Result<(), AllocError> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Err(AllocError::AlreadyInitialized);
        }
        let region = Region::new(config).inspect_err(|err| {
            log::debug!("arena init failed: {err}");
        })?;
        log::debug!(
            "arena ready: {} bytes, {} descriptor slots, min split {}B, alignment {}",
            region.capacity(),
            region.stats().descriptor_capacity,
            region.config().min_split,
            region.config().alignment,
        );
        *guard = Some(region);
        Ok(())
    }

    /// Release the arena and metadata pool.
    ///
    /// Every outstanding address becomes invalid. Fails with
    /// [`AllocError::Uninitialized`] if there is nothing to release.
    pub fn deinit(&self) -> Result<(), AllocError> {
        let region = self.lock().take().ok_or(AllocError::Uninitialized)?;
        let live = region.live_count();
        if live > 0 {
            log::warn!("arena released with {live} blocks still allocated");
        }
        log::debug!(
            "arena released: {} bytes, descriptor high water {}",
            region.capacity(),
            region.stats().descriptor_high_water,
        );
        Ok(())
    }

    /// Whether [`init`](Self::init) has succeeded and no
    /// [`deinit`](Self::deinit) has followed.
    pub fn is_ready(&self) -> bool {
        self.lock().is_some()
    }

    /// The configuration of the live arena.
    pub fn config(&self) -> Result<ArenaConfig, AllocError> {
        self.with_region(|r| Ok(r.config().clone()))
    }

    /// Allocate a block of at least `size` bytes.
    pub fn alloc(&self, size: usize) -> Result<BlockAddr, AllocError> {
        self.with_region(|r| r.alloc(size))
    }

    /// Release the block at `addr`.
    pub fn free(&self, addr: BlockAddr) -> Result<(), AllocError> {
        self.with_region(|r| r.free(addr))
    }

    /// Resize the block at `addr`, or allocate if `addr` is `None`.
    ///
    /// Relocation (allocate, copy, free) happens under the same lock
    /// acquisition as the size check.
    pub fn resize(&self, addr: Option<BlockAddr>, size: usize) -> Result<BlockAddr, AllocError> {
        self.with_region(|r| r.resize(addr, size))
    }

    /// Copy `buf.len()` bytes out of the block at `addr`, starting `offset`
    /// bytes in.
    pub fn read(&self, addr: BlockAddr, offset: usize, buf: &mut [u8]) -> Result<(), AllocError> {
        self.with_region(|r| r.read(addr, offset, buf))
    }

    /// Copy `bytes` into the block at `addr`, starting `offset` bytes in.
    pub fn write(&self, addr: BlockAddr, offset: usize, bytes: &[u8]) -> Result<(), AllocError> {
        self.with_region(|r| r.write(addr, offset, bytes))
    }

    /// Run `f` over the contents of the block at `addr`.
    pub fn with_block<R>(
        &self,
        addr: BlockAddr,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, AllocError> {
        self.with_region(|r| r.block(addr).map(f))
    }

    /// Run `f` over the mutable contents of the block at `addr`.
    pub fn with_block_mut<R>(
        &self,
        addr: BlockAddr,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, AllocError> {
        self.with_region(|r| r.block_mut(addr).map(f))
    }

    /// Size of the block at `addr`.
    pub fn block_size(&self, addr: BlockAddr) -> Result<usize, AllocError> {
        self.with_region(|r| r.block_size(addr))
    }

    /// Whether `addr` is the start of a live block. Always `false` while
    /// uninitialized.
    pub fn is_live(&self, addr: BlockAddr) -> bool {
        self.lock().as_ref().is_some_and(|r| r.is_live(addr))
    }

    /// Occupancy snapshot and operation counters.
    pub fn stats(&self) -> Result<ArenaStats, AllocError> {
        self.with_region(|r| Ok(r.stats()))
    }

    /// Every span in ascending offset order.
    pub fn blocks(&self) -> Result<Vec<BlockInfo>, AllocError> {
        self.with_region(|r| Ok(r.blocks()))
    }

    /// Verify the chain invariants. An uninitialized allocator has no
    /// chain and passes trivially.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        match self.lock().as_ref() {
            Some(r) => r.check_invariants(),
            None => Ok(()),
        }
    }

    /// Acquire the region lock, recovering from poisoning.
    ///
    /// The chain is only ever mutated inside `Region` methods, which do not
    /// call client code, so a panic while the lock was held cannot have left
    /// it half-updated.
    fn lock(&self) -> MutexGuard<'_, Option<Region>> {
        self.region.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_region<T>(
        &self,
        f: impl FnOnce(&mut Region) -> Result<T, AllocError>,
    ) -> Result<T, AllocError> {
        let mut guard = self.lock();
        let region = guard.as_mut().ok_or(AllocError::Uninitialized)?;
        f(region)
    }
}

impl ArenaAlloc for RegionAllocator {
    fn alloc(&self, size: usize) -> Result<BlockAddr, AllocError> {
        RegionAllocator::alloc(self, size)
    }

    fn free(&self, addr: BlockAddr) -> Result<(), AllocError> {
        RegionAllocator::free(self, addr)
    }

    fn resize(&self, addr: Option<BlockAddr>, size: usize) -> Result<BlockAddr, AllocError> {
        RegionAllocator::resize(self, addr, size)
    }

    fn read(&self, addr: BlockAddr, offset: usize, buf: &mut [u8]) -> Result<(), AllocError> {
        RegionAllocator::read(self, addr, offset, buf)
    }

    fn write(&self, addr: BlockAddr, offset: usize, bytes: &[u8]) -> Result<(), AllocError> {
        RegionAllocator::write(self, addr, offset, bytes)
    }
}
