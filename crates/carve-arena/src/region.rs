//! The arena and its descriptor chain.
//!
//! A [`Region`] owns one fixed byte buffer and the chain of
//! [`BlockDescriptor`]s that partitions it into free and used spans.
//! Every method takes `&self` or `&mut self`: callers that share a region
//! between threads wrap it in a lock (see
//! [`RegionAllocator`](crate::RegionAllocator)), and the composite paths
//! here (resize relocation in particular) only ever call lock-free
//! helpers, so one lock acquisition covers a whole operation.
//!
//! # Chain discipline
//!
//! - Allocation is first-fit in ascending offset order.
//! - A free span is split only when the remainder exceeds
//!   [`ArenaConfig::min_split`]; the remainder's descriptor comes from the
//!   [`MetadataPool`], and a pool failure fails the allocation without
//!   touching the candidate span.
//! - Freeing coalesces eagerly: one pass over the chain merges every pair
//!   of adjacent free spans and returns the eliminated slots to the pool.

use std::ops::Range;

use indexmap::IndexMap;

use carve_core::{AllocError, BlockAddr, SlotId};

use crate::config::ArenaConfig;
use crate::descriptor::{BlockDescriptor, BlockInfo, BlockState};
use crate::error::InvariantViolation;
use crate::pool::MetadataPool;
use crate::stats::{ArenaStats, OpCounters};

/// A fixed-capacity arena with its descriptor chain.
pub struct Region {
    /// The arena bytes. Sized once at construction, never resized.
    arena: Vec<u8>,
    /// Descriptor storage.
    pool: MetadataPool,
    /// Descriptor of the span at offset 0.
    head: SlotId,
    /// Sum of free span sizes, for the `OutOfSpace` fast check.
    free_bytes: usize,
    /// Offset → slot for every used span.
    ///
    /// Pre-sized to the pool capacity (there can never be more used spans
    /// than descriptors), so it never reallocates while the region lives.
    live: IndexMap<usize, SlotId>,
    config: ArenaConfig,
    ops: OpCounters,
}

/// Approximate bytes per live-index entry: stored hash, key, value and
/// the table's index word.
const LIVE_ENTRY_BYTES: usize = std::mem::size_of::<u64>()
    + std::mem::size_of::<usize>()
    + std::mem::size_of::<SlotId>()
    + std::mem::size_of::<usize>();

/// Reserve the live-address index up front so no system allocation
/// happens after init.
fn live_index(capacity: usize) -> Result<IndexMap<usize, SlotId>, AllocError> {
    let mut live = IndexMap::new();
    live.try_reserve_exact(capacity)
        .map_err(|_| AllocError::OutOfMemory {
            requested: capacity.saturating_mul(LIVE_ENTRY_BYTES),
        })?;
    Ok(live)
}

impl Region {
    /// Reserve the arena and metadata pool described by `config`.
    ///
    /// The whole arena starts out as one free span. Fails with
    /// [`AllocError::InvalidCapacity`] / [`AllocError::InvalidConfig`] for a
    /// bad config and [`AllocError::OutOfMemory`] if the arena, the pool
    /// or the live index cannot be reserved; nothing is retained on failure.
    pub fn new(config: ArenaConfig) -> Result<Self, AllocError> {
        config.validate()?;

        let mut arena = Vec::new();
        arena
            .try_reserve_exact(config.capacity)
            .map_err(|_| AllocError::OutOfMemory {
                requested: config.capacity,
            })?;
        arena.resize(config.capacity, 0);

        let mut pool = MetadataPool::reserve(config.descriptor_capacity())?;
        let head = pool.take(BlockDescriptor::free(0, config.capacity, None))?;
        let live = live_index(pool.capacity())?;

        Ok(Self {
            arena,
            pool,
            head,
            free_bytes: config.capacity,
            live,
            config,
            ops: OpCounters::default(),
        })
    }

    /// Allocate a block of at least `size` bytes (first fit).
    pub fn alloc(&mut self, size: usize) -> Result<BlockAddr, AllocError> {
        match self.alloc_inner(size) {
            Ok(addr) => {
                self.ops.allocs += 1;
                Ok(addr)
            }
            Err(err) => Err(self.alloc_failed(size, err)),
        }
    }

    /// Release the used block at `addr` and coalesce.
    ///
    /// Rejects unknown addresses with [`AllocError::InvalidPointer`] and
    /// free spans with [`AllocError::DoubleFree`]; the chain is untouched
    /// on rejection.
    pub fn free(&mut self, addr: BlockAddr) -> Result<(), AllocError> {
        let slot = self.used_slot(addr).map_err(|err| self.rejected(err))?;
        self.release_block(addr, slot);
        self.ops.frees += 1;
        log::trace!("free {addr}");
        Ok(())
    }

    /// Resize the block at `addr` to at least `size` bytes.
    ///
    /// `None` allocates. A block that already covers `size` stays put and
    /// hands its excess back to the chain where that is possible without a
    /// new descriptor or the excess is large enough to track. A block
    /// followed by a large-enough free span grows in place. Anything else
    /// relocates: allocate, copy, free. On every failure path the original
    /// block is left exactly as it was.
    pub fn resize(
        &mut self,
        addr: Option<BlockAddr>,
        size: usize,
    ) -> Result<BlockAddr, AllocError> {
        let Some(addr) = addr else {
            return self.alloc(size);
        };
        let slot = self.used_slot(addr).map_err(|err| self.rejected(err))?;
        match self.resize_inner(addr, slot, size) {
            Ok(new_addr) => {
                self.ops.resizes += 1;
                Ok(new_addr)
            }
            Err(err) => Err(self.alloc_failed(size, err)),
        }
    }

    /// Copy bytes out of a used block, starting `offset` bytes in.
    pub fn read(&self, addr: BlockAddr, offset: usize, buf: &mut [u8]) -> Result<(), AllocError> {
        let range = self.block_range(addr, offset, buf.len())?;
        buf.copy_from_slice(&self.arena[range]);
        Ok(())
    }

    /// Copy bytes into a used block, starting `offset` bytes in.
    pub fn write(
        &mut self,
        addr: BlockAddr,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), AllocError> {
        let range = self.block_range(addr, offset, bytes.len())?;
        self.arena[range].copy_from_slice(bytes);
        Ok(())
    }

    /// The full contents of a used block.
    pub fn block(&self, addr: BlockAddr) -> Result<&[u8], AllocError> {
        let d = self.pool.get(self.used_slot(addr)?);
        Ok(&self.arena[d.offset..d.end()])
    }

    /// Mutable access to the full contents of a used block.
    pub fn block_mut(&mut self, addr: BlockAddr) -> Result<&mut [u8], AllocError> {
        let d = *self.pool.get(self.used_slot(addr)?);
        Ok(&mut self.arena[d.offset..d.end()])
    }

    /// Size of the used block at `addr`.
    ///
    /// May exceed the size originally requested when the span was handed
    /// out whole instead of split.
    pub fn block_size(&self, addr: BlockAddr) -> Result<usize, AllocError> {
        Ok(self.pool.get(self.used_slot(addr)?).size)
    }

    /// Whether `addr` is the start of a used block.
    pub fn is_live(&self, addr: BlockAddr) -> bool {
        self.live.contains_key(&addr.0)
    }

    /// Number of used blocks.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Arena capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Bytes in free spans.
    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// The configuration this region was built from.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Memory held by the arena and its metadata, in bytes.
    ///
    /// The live index is counted as its entry vector plus one hash-table
    /// word per entry.
    pub fn memory_bytes(&self) -> usize {
        self.arena.capacity()
            + self.pool.memory_bytes()
            + self.live.capacity() * LIVE_ENTRY_BYTES
    }

    /// Walk the chain in ascending offset order.
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            pool: &self.pool,
            cursor: Some(self.head),
        }
    }

    /// Every span in ascending offset order.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.iter().map(|(_, d)| d.info()).collect()
    }

    /// Size of the largest free span, or 0 if the arena is full.
    pub fn largest_free(&self) -> usize {
        self.iter()
            .filter(|(_, d)| d.is_free())
            .map(|(_, d)| d.size)
            .max()
            .unwrap_or(0)
    }

    /// Occupancy summary plus cumulative counters.
    pub fn stats(&self) -> ArenaStats {
        let mut stats = ArenaStats {
            capacity: self.capacity(),
            free_bytes: self.free_bytes,
            used_bytes: self.capacity() - self.free_bytes,
            descriptors_in_use: self.pool.in_use(),
            descriptor_capacity: self.pool.capacity(),
            descriptor_high_water: self.pool.high_water(),
            ops: self.ops.clone(),
            ..Default::default()
        };
        for (_, d) in self.iter() {
            if d.is_free() {
                stats.free_blocks += 1;
                stats.largest_free = stats.largest_free.max(d.size);
            } else {
                stats.used_blocks += 1;
            }
        }
        stats
    }

    /// Verify every chain invariant.
    ///
    /// Checks full coverage without gaps, no empty spans, exhaustive
    /// coalescing, the descriptor bound, pool accounting, the free-byte
    /// counter, and the live-address index.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let capacity = self.pool.capacity();
        let mut in_chain = 0usize;
        let mut expected = 0usize;
        let mut free_counted = 0usize;
        let mut used_seen = 0usize;
        let mut prev_free: Option<usize> = None;

        for (slot, d) in self.iter() {
            in_chain += 1;
            if in_chain > capacity {
                return Err(InvariantViolation::DescriptorOverflow { in_chain, capacity });
            }
            if d.size == 0 {
                return Err(InvariantViolation::EmptySpan { slot });
            }
            if d.offset != expected {
                return Err(InvariantViolation::Gap {
                    slot,
                    expected,
                    found: d.offset,
                });
            }
            if d.is_free() {
                if let Some(offset) = prev_free {
                    return Err(InvariantViolation::UncoalescedFree { offset });
                }
                free_counted += d.size;
                prev_free = Some(d.offset);
            } else {
                if self.live.get(&d.offset) != Some(&slot) {
                    return Err(InvariantViolation::LiveIndexMismatch {
                        addr: BlockAddr(d.offset),
                    });
                }
                used_seen += 1;
                prev_free = None;
            }
            expected = d.end();
        }

        if expected != self.capacity() {
            return Err(InvariantViolation::CoverageMismatch {
                covered: expected,
                capacity: self.capacity(),
            });
        }
        if in_chain != self.pool.in_use() {
            return Err(InvariantViolation::SlotLeak {
                in_chain,
                in_use: self.pool.in_use(),
            });
        }
        if free_counted != self.free_bytes {
            return Err(InvariantViolation::FreeBytesMismatch {
                counted: free_counted,
                tracked: self.free_bytes,
            });
        }
        if used_seen != self.live.len() {
            let stray = self
                .live
                .iter()
                .find(|&(_, &slot)| self.pool.get(slot).is_free())
                .map_or(0, |(&offset, _)| offset);
            return Err(InvariantViolation::LiveIndexMismatch {
                addr: BlockAddr(stray),
            });
        }
        Ok(())
    }

    fn alloc_inner(&mut self, size: usize) -> Result<BlockAddr, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let n = self
            .config
            .align_size(size)
            .ok_or_else(|| AllocError::OutOfSpace {
                requested: size,
                largest_free: self.largest_free(),
            })?;
        if n > self.free_bytes {
            return Err(AllocError::OutOfSpace {
                requested: n,
                largest_free: self.largest_free(),
            });
        }

        let found = self
            .iter()
            .find(|(_, d)| d.is_free() && d.size >= n)
            .map(|(slot, _)| slot);
        let Some(slot) = found else {
            return Err(AllocError::OutOfSpace {
                requested: n,
                largest_free: self.largest_free(),
            });
        };

        self.carve(slot, n)?;
        let d = self.pool.get(slot);
        log::trace!("alloc {n}B -> {} ({}B span)", BlockAddr(d.offset), d.size);
        Ok(BlockAddr(d.offset))
    }

    /// Hand out the free span in `slot` for a request of `n` bytes,
    /// splitting off the remainder if it is worth tracking.
    fn carve(&mut self, slot: SlotId, n: usize) -> Result<(), AllocError> {
        let d = *self.pool.get(slot);
        debug_assert!(d.is_free() && d.size >= n);

        let remainder = d.size - n;
        if remainder > self.config.min_split {
            // Take first: on failure the candidate is still whole and free.
            let rest = self
                .pool
                .take(BlockDescriptor::free(d.offset + n, remainder, d.next))?;
            let span = self.pool.get_mut(slot);
            span.size = n;
            span.next = Some(rest);
            self.ops.splits += 1;
        }

        let span = self.pool.get_mut(slot);
        span.state = BlockState::Used;
        let (offset, size) = (span.offset, span.size);
        self.free_bytes -= size;
        self.live.insert(offset, slot);
        Ok(())
    }

    fn resize_inner(
        &mut self,
        addr: BlockAddr,
        slot: SlotId,
        size: usize,
    ) -> Result<BlockAddr, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let d = *self.pool.get(slot);
        let n = self
            .config
            .align_size(size)
            .ok_or_else(|| AllocError::OutOfSpace {
                requested: size,
                largest_free: self.largest_free(),
            })?;

        if d.size >= n {
            self.shrink_in_place(slot, n);
            self.ops.in_place_resizes += 1;
            log::trace!("resize {addr} to {n}B in place (shrink)");
            return Ok(addr);
        }

        if let Some(next) = d.next {
            let following = *self.pool.get(next);
            if following.is_free() && d.size + following.size >= n {
                self.grow_in_place(slot, next, n);
                self.ops.in_place_resizes += 1;
                log::trace!("resize {addr} to {n}B in place (grow)");
                return Ok(addr);
            }
        }

        let new_addr = self.alloc_inner(n)?;
        let len = d.size.min(n);
        self.arena.copy_within(d.offset..d.offset + len, new_addr.0);
        self.release_block(addr, slot);
        self.ops.relocations += 1;
        log::trace!("resize {addr} to {n}B relocated to {new_addr}");
        Ok(new_addr)
    }

    /// Give the tail of a used block beyond `n` bytes back to the chain.
    ///
    /// A free successor absorbs the tail by moving its start down, which
    /// needs no descriptor. Otherwise the tail becomes its own free span
    /// only if it exceeds the split threshold and the pool has a slot;
    /// failing both, the block keeps its slack.
    fn shrink_in_place(&mut self, slot: SlotId, n: usize) {
        let d = *self.pool.get(slot);
        let excess = d.size - n;
        if excess == 0 {
            return;
        }

        if let Some(next) = d.next {
            let following = self.pool.get_mut(next);
            if following.is_free() {
                following.offset -= excess;
                following.size += excess;
                self.pool.get_mut(slot).size = n;
                self.free_bytes += excess;
                return;
            }
        }

        if excess > self.config.min_split {
            if let Ok(rest) = self
                .pool
                .take(BlockDescriptor::free(d.offset + n, excess, d.next))
            {
                let span = self.pool.get_mut(slot);
                span.size = n;
                span.next = Some(rest);
                self.free_bytes += excess;
                self.ops.splits += 1;
            }
        }
    }

    /// Extend a used block into its free successor.
    ///
    /// The successor's descriptor keeps tracking whatever is left over when
    /// that remainder is worth a span; otherwise the successor is absorbed
    /// whole and its slot returned to the pool. Neither path takes a slot,
    /// so in-place growth cannot fail.
    fn grow_in_place(&mut self, slot: SlotId, next: SlotId, n: usize) {
        let d = *self.pool.get(slot);
        let following = *self.pool.get(next);
        let total = d.size + following.size;
        let remainder = total - n;

        if remainder > self.config.min_split {
            let rest = self.pool.get_mut(next);
            rest.offset = d.offset + n;
            rest.size = remainder;
            self.pool.get_mut(slot).size = n;
            self.free_bytes -= n - d.size;
        } else {
            let span = self.pool.get_mut(slot);
            span.size = total;
            span.next = following.next;
            self.pool.release(next);
            self.free_bytes -= following.size;
            self.ops.merges += 1;
        }
    }

    /// Mark a used block free and coalesce. The caller has validated `slot`.
    fn release_block(&mut self, addr: BlockAddr, slot: SlotId) {
        self.live.swap_remove(&addr.0);
        let span = self.pool.get_mut(slot);
        span.state = BlockState::Free;
        self.free_bytes += span.size;
        self.coalesce();
    }

    /// Merge every pair of adjacent free spans in one pass.
    ///
    /// The earlier span survives and absorbs its successor; the successor's
    /// slot goes back to the pool.
    fn coalesce(&mut self) {
        let mut cursor = self.head;
        loop {
            let d = *self.pool.get(cursor);
            let Some(next) = d.next else {
                break;
            };
            let following = *self.pool.get(next);
            if d.is_free() && following.is_free() {
                let span = self.pool.get_mut(cursor);
                span.size += following.size;
                span.next = following.next;
                self.pool.release(next);
                self.ops.merges += 1;
            } else {
                cursor = next;
            }
        }
    }

    /// Resolve `addr` to the slot of a used span.
    fn used_slot(&self, addr: BlockAddr) -> Result<SlotId, AllocError> {
        if let Some(&slot) = self.live.get(&addr.0) {
            return Ok(slot);
        }
        let tracked_free = self
            .iter()
            .take_while(|(_, d)| d.offset <= addr.0)
            .any(|(_, d)| d.offset == addr.0 && d.is_free());
        if tracked_free {
            Err(AllocError::DoubleFree { addr })
        } else {
            Err(AllocError::InvalidPointer { addr })
        }
    }

    /// Arena byte range for an access of `len` bytes at `offset` into the
    /// used block at `addr`.
    fn block_range(
        &self,
        addr: BlockAddr,
        offset: usize,
        len: usize,
    ) -> Result<Range<usize>, AllocError> {
        let d = self.pool.get(self.used_slot(addr)?);
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= d.size)
            .ok_or(AllocError::OutOfBounds {
                addr,
                offset,
                len,
                block_size: d.size,
            })?;
        Ok(d.offset + offset..d.offset + end)
    }

    fn alloc_failed(&mut self, size: usize, err: AllocError) -> AllocError {
        self.ops.failed_allocs += 1;
        log::debug!("allocation of {size}B failed: {err}");
        err
    }

    fn rejected(&mut self, err: AllocError) -> AllocError {
        self.ops.rejected_frees += 1;
        log::warn!("rejected block operation: {err}");
        err
    }
}

/// Iterator over the descriptor chain in ascending offset order.
pub struct ChainIter<'a> {
    pool: &'a MetadataPool,
    cursor: Option<SlotId>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (SlotId, &'a BlockDescriptor);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let d = self.pool.get(slot);
        self.cursor = d.next;
        Some((slot, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(capacity: usize) -> Region {
        Region::new(ArenaConfig::new(capacity)).unwrap()
    }

    fn assert_ok(r: &Region) {
        if let Err(v) = r.check_invariants() {
            panic!("invariant violated: {v}\nchain: {:?}", r.blocks());
        }
    }

    #[test]
    fn new_region_is_one_free_span() {
        let r = region(128);
        let blocks = r.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].size, 128);
        assert_eq!(blocks[0].state, BlockState::Free);
        assert_eq!(r.free_bytes(), 128);
        assert_ok(&r);
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            Region::new(ArenaConfig::new(0)),
            Err(AllocError::InvalidCapacity)
        ));
    }

    #[test]
    fn unreservable_arena_is_out_of_memory() {
        let config = ArenaConfig::new(usize::MAX).with_max_descriptors(4);
        assert!(matches!(
            Region::new(config),
            Err(AllocError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn unreservable_live_index_is_out_of_memory() {
        assert!(matches!(
            live_index(usize::MAX),
            Err(AllocError::OutOfMemory { .. })
        ));
        assert!(live_index(64).unwrap().capacity() >= 64);
    }

    #[test]
    fn memory_accounts_for_all_metadata() {
        let r = Region::new(ArenaConfig::new(256).with_max_descriptors(8)).unwrap();
        let floor = 256
            + 8 * std::mem::size_of::<BlockDescriptor>()
            + 8 * std::mem::size_of::<SlotId>()
            + 8 * LIVE_ENTRY_BYTES;
        assert!(r.memory_bytes() >= floor);
    }

    #[test]
    fn zero_size_alloc_rejected() {
        let mut r = region(64);
        assert_eq!(r.alloc(0), Err(AllocError::InvalidSize));
        assert_ok(&r);
    }

    #[test]
    fn first_fit_returns_ascending_offsets() {
        let mut r = region(300);
        let a = r.alloc(100).unwrap();
        let b = r.alloc(100).unwrap();
        let c = r.alloc(100).unwrap();
        assert_eq!((a, b, c), (BlockAddr(0), BlockAddr(100), BlockAddr(200)));
        assert_eq!(r.free_bytes(), 0);
        assert_ok(&r);
    }

    #[test]
    fn first_fit_prefers_lowest_hole() {
        let mut r = region(400);
        let a = r.alloc(50).unwrap();
        let _b = r.alloc(50).unwrap();
        let c = r.alloc(100).unwrap();
        let _d = r.alloc(50).unwrap();
        r.free(a).unwrap();
        r.free(c).unwrap();
        // Both holes fit 40 bytes; the lower one wins.
        assert_eq!(r.alloc(40).unwrap(), a);
        assert_ok(&r);
    }

    #[test]
    fn small_remainder_is_not_split() {
        let mut r = region(100);
        let min_split = r.config().min_split;
        let a = r.alloc(100 - min_split).unwrap();
        assert_eq!(r.block_size(a).unwrap(), 100);
        assert_eq!(r.blocks().len(), 1);
        assert_eq!(r.free_bytes(), 0);
        assert_ok(&r);
    }

    #[test]
    fn exhaustion_then_recovery() {
        let mut r = region(100);
        let first = r.alloc(60).unwrap();
        assert!(matches!(
            r.alloc(50),
            Err(AllocError::OutOfSpace {
                requested: 50,
                largest_free: 40
            })
        ));
        r.free(first).unwrap();
        assert!(r.alloc(50).is_ok());
        assert_ok(&r);
    }

    #[test]
    fn freeing_neighbours_coalesces_before_third_block() {
        let mut r = region(300);
        let a = r.alloc(100).unwrap();
        let b = r.alloc(100).unwrap();
        let c = r.alloc(100).unwrap();
        assert_eq!(r.stats().descriptors_in_use, 3);

        r.free(b).unwrap();
        r.free(a).unwrap();

        let blocks = r.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].size, 200);
        assert_eq!(blocks[0].state, BlockState::Free);
        assert_eq!(blocks[1].addr, c);

        let big = r.alloc(200).unwrap();
        assert_eq!(big, BlockAddr(0));
        assert_eq!(r.stats().descriptor_high_water, 3);
        assert_ok(&r);
    }

    #[test]
    fn free_coalesces_on_both_sides() {
        let mut r = region(300);
        let a = r.alloc(100).unwrap();
        let b = r.alloc(100).unwrap();
        let c = r.alloc(100).unwrap();
        r.free(a).unwrap();
        r.free(c).unwrap();
        assert_eq!(r.blocks().len(), 3);
        r.free(b).unwrap();
        assert_eq!(r.blocks().len(), 1);
        assert_eq!(r.stats().descriptors_in_use, 1);
        assert_ok(&r);
    }

    #[test]
    fn double_free_is_rejected_without_damage() {
        let mut r = region(200);
        let a = r.alloc(50).unwrap();
        let b = r.alloc(50).unwrap();
        r.free(a).unwrap();
        let before = r.blocks();
        assert_eq!(r.free(a), Err(AllocError::DoubleFree { addr: a }));
        assert_eq!(r.blocks(), before);
        assert!(r.is_live(b));
        assert_eq!(r.stats().ops.rejected_frees, 1);
        assert_ok(&r);
    }

    #[test]
    fn unknown_address_is_invalid_pointer() {
        let mut r = region(200);
        let a = r.alloc(50).unwrap();
        let inside = BlockAddr(a.0 + 1);
        assert_eq!(r.free(inside), Err(AllocError::InvalidPointer { addr: inside }));
        assert_eq!(
            r.free(BlockAddr(10_000)),
            Err(AllocError::InvalidPointer {
                addr: BlockAddr(10_000)
            })
        );
        assert!(r.is_live(a));
        assert_ok(&r);
    }

    #[test]
    fn split_fails_cleanly_when_pool_is_exhausted() {
        let mut r = Region::new(ArenaConfig::new(1024).with_max_descriptors(2)).unwrap();
        let a = r.alloc(100).unwrap();
        let before = r.blocks();
        assert_eq!(
            r.alloc(100),
            Err(AllocError::MetadataExhausted { capacity: 2 })
        );
        assert_eq!(r.blocks(), before);
        assert_eq!(r.free_bytes(), 924);

        // A request that takes the whole remaining span needs no new slot.
        assert!(r.alloc(924).is_ok());
        r.free(a).unwrap();
        assert_ok(&r);
    }

    #[test]
    fn resize_none_allocates() {
        let mut r = region(64);
        let a = r.resize(None, 16).unwrap();
        assert!(r.is_live(a));
        assert_eq!(r.stats().ops.allocs, 1);
    }

    #[test]
    fn resize_preserves_data_when_relocating() {
        let mut r = region(256);
        let a = r.alloc(10).unwrap();
        let _fence = r.alloc(10).unwrap();
        let data: Vec<u8> = (1..=10).collect();
        r.write(a, 0, &data).unwrap();

        let moved = r.resize(Some(a), 20).unwrap();
        assert_ne!(moved, a);
        assert!(!r.is_live(a));
        let mut back = [0u8; 10];
        r.read(moved, 0, &mut back).unwrap();
        assert_eq!(&back[..], &data[..]);
        assert_eq!(r.stats().ops.relocations, 1);
        assert_ok(&r);
    }

    #[test]
    fn resize_grows_in_place_into_free_successor() {
        let mut r = region(256);
        let a = r.alloc(10).unwrap();
        let data: Vec<u8> = (1..=10).collect();
        r.write(a, 0, &data).unwrap();

        let same = r.resize(Some(a), 20).unwrap();
        assert_eq!(same, a);
        assert_eq!(r.block_size(a).unwrap(), 20);
        let mut back = [0u8; 10];
        r.read(a, 0, &mut back).unwrap();
        assert_eq!(&back[..], &data[..]);
        assert_eq!(r.stats().ops.in_place_resizes, 1);
        assert_eq!(r.stats().descriptors_in_use, 2);
        assert_ok(&r);
    }

    #[test]
    fn in_place_growth_absorbs_small_leftover() {
        let mut r = region(100);
        let a = r.alloc(50).unwrap();
        r.resize(Some(a), 90).unwrap();
        assert_eq!(r.block_size(a).unwrap(), 100);
        assert_eq!(r.blocks().len(), 1);
        assert_eq!(r.stats().descriptors_in_use, 1);
        assert_ok(&r);
    }

    #[test]
    fn shrinking_returns_excess_to_free_successor() {
        let mut r = region(200);
        let a = r.alloc(100).unwrap();
        assert_eq!(r.resize(Some(a), 40).unwrap(), a);
        assert_eq!(r.block_size(a).unwrap(), 40);
        assert_eq!(r.free_bytes(), 160);
        assert_eq!(r.blocks().len(), 2);
        assert_ok(&r);
    }

    #[test]
    fn shrinking_splits_when_successor_is_used() {
        let mut r = region(200);
        let a = r.alloc(100).unwrap();
        let _b = r.alloc(100).unwrap();
        r.resize(Some(a), 40).unwrap();
        let blocks = r.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].size, 60);
        assert_eq!(blocks[1].state, BlockState::Free);
        assert_ok(&r);
    }

    #[test]
    fn shrinking_keeps_slack_below_threshold() {
        let mut r = region(200);
        let a = r.alloc(100).unwrap();
        let _b = r.alloc(100).unwrap();
        r.resize(Some(a), 99).unwrap();
        assert_eq!(r.block_size(a).unwrap(), 100);
        assert_eq!(r.blocks().len(), 2);
        assert_ok(&r);
    }

    #[test]
    fn failed_resize_leaves_block_intact() {
        let mut r = region(100);
        let a = r.alloc(60).unwrap();
        r.write(a, 0, &[7; 60]).unwrap();
        let _b = r.alloc(40).unwrap();

        let err = r.resize(Some(a), 80).unwrap_err();
        assert!(matches!(err, AllocError::OutOfSpace { .. }));
        assert!(r.is_live(a));
        assert_eq!(r.block(a).unwrap(), &[7; 60][..]);
        assert_eq!(r.stats().ops.failed_allocs, 1);
        assert_ok(&r);
    }

    #[test]
    fn relocation_without_a_slot_leaves_block_intact() {
        // Three slots: `a`, `b` and the tail. Relocating `a` would need to
        // split the tail, so the pool runs dry before anything moves.
        let mut r = Region::new(ArenaConfig::new(1024).with_max_descriptors(3)).unwrap();
        let a = r.alloc(10).unwrap();
        r.write(a, 0, &[9; 10]).unwrap();
        let b = r.alloc(10).unwrap();
        let before = r.blocks();

        assert_eq!(
            r.resize(Some(a), 20),
            Err(AllocError::MetadataExhausted { capacity: 3 })
        );
        assert!(r.is_live(a));
        assert!(r.is_live(b));
        assert_eq!(r.block(a).unwrap(), &[9; 10][..]);
        assert_eq!(r.blocks(), before);
        assert_eq!(r.stats().ops.failed_allocs, 1);
        assert_eq!(r.stats().ops.resizes, 0);
        assert_ok(&r);
    }

    #[test]
    fn resize_to_zero_is_invalid_and_harmless() {
        let mut r = region(100);
        let a = r.alloc(10).unwrap();
        assert_eq!(r.resize(Some(a), 0), Err(AllocError::InvalidSize));
        assert!(r.is_live(a));
    }

    #[test]
    fn resize_of_freed_block_is_rejected() {
        let mut r = region(100);
        let a = r.alloc(10).unwrap();
        r.free(a).unwrap();
        assert_eq!(r.resize(Some(a), 20), Err(AllocError::DoubleFree { addr: a }));
    }

    #[test]
    fn out_of_bounds_access_rejected() {
        let mut r = region(100);
        let a = r.alloc(8).unwrap();
        let err = r.write(a, 4, &[0; 8]).unwrap_err();
        assert_eq!(
            err,
            AllocError::OutOfBounds {
                addr: a,
                offset: 4,
                len: 8,
                block_size: 8
            }
        );
        let mut buf = [0u8; 1];
        assert!(r.read(a, usize::MAX, &mut buf).is_err());
    }

    #[test]
    fn alignment_rounds_request_sizes() {
        let mut r = Region::new(ArenaConfig::new(256).with_alignment(8)).unwrap();
        let a = r.alloc(13).unwrap();
        let b = r.alloc(1).unwrap();
        assert_eq!(r.block_size(a).unwrap(), 16);
        assert_eq!(b, BlockAddr(16));
        assert_eq!(b.0 % 8, 0);
        assert_ok(&r);
    }

    #[test]
    fn alloc_free_round_trip_restores_state() {
        let mut r = region(1000);
        let _a = r.alloc(100).unwrap();
        let b = r.alloc(200).unwrap();
        let _c = r.alloc(50).unwrap();
        r.free(b).unwrap();

        let before = r.stats();
        let x = r.alloc(120).unwrap();
        r.free(x).unwrap();
        let after = r.stats();
        assert_eq!(after.free_bytes, before.free_bytes);
        assert_eq!(after.descriptors_in_use, before.descriptors_in_use);
        assert_eq!(r.blocks().len(), before.block_count());
    }

    #[test]
    fn stats_reflect_chain() {
        let mut r = region(300);
        let a = r.alloc(100).unwrap();
        let _b = r.alloc(50).unwrap();
        r.free(a).unwrap();
        let s = r.stats();
        assert_eq!(s.capacity, 300);
        assert_eq!(s.used_bytes, 50);
        assert_eq!(s.free_bytes, 250);
        assert_eq!(s.free_blocks, 2);
        assert_eq!(s.used_blocks, 1);
        assert_eq!(s.largest_free, 150);
        assert_eq!(s.ops.allocs, 2);
        assert_eq!(s.ops.frees, 1);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Alloc(usize),
            Free(usize),
            Resize(usize, usize),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1usize..96).prop_map(Op::Alloc),
                any::<usize>().prop_map(Op::Free),
                (any::<usize>(), 1usize..160).prop_map(|(i, n)| Op::Resize(i, n)),
            ]
        }

        fn fill_byte(addr: BlockAddr) -> u8 {
            (addr.0 % 251) as u8 + 1
        }

        proptest! {
            #[test]
            fn random_ops_preserve_invariants_and_contents(
                capacity in 64usize..2048,
                min_split in 0usize..40,
                ops in proptest::collection::vec(arb_op(), 1..120),
            ) {
                let config = ArenaConfig::new(capacity).with_min_split(min_split);
                let mut r = Region::new(config).unwrap();
                // (addr, bytes the client wrote)
                let mut live: Vec<(BlockAddr, usize)> = Vec::new();

                for op in ops {
                    match op {
                        Op::Alloc(n) => {
                            if let Ok(addr) = r.alloc(n) {
                                r.write(addr, 0, &vec![fill_byte(addr); n]).unwrap();
                                live.push((addr, n));
                            }
                        }
                        Op::Free(i) if !live.is_empty() => {
                            let (addr, _) = live.swap_remove(i % live.len());
                            prop_assert!(r.free(addr).is_ok());
                        }
                        Op::Resize(i, n) if !live.is_empty() => {
                            let idx = i % live.len();
                            let (addr, written) = live[idx];
                            let expected = vec![fill_byte(addr); written.min(n)];
                            match r.resize(Some(addr), n) {
                                Ok(new_addr) => {
                                    let mut back = vec![0u8; expected.len()];
                                    r.read(new_addr, 0, &mut back).unwrap();
                                    prop_assert_eq!(&back, &expected);
                                    r.write(new_addr, 0, &vec![fill_byte(new_addr); n]).unwrap();
                                    live[idx] = (new_addr, n);
                                }
                                Err(_) => {
                                    let mut back = vec![0u8; written];
                                    r.read(addr, 0, &mut back).unwrap();
                                    prop_assert_eq!(back, vec![fill_byte(addr); written]);
                                }
                            }
                        }
                        _ => {}
                    }
                    prop_assert_eq!(r.check_invariants(), Ok(()));
                    prop_assert_eq!(r.live_count(), live.len());
                }

                // Live spans are pairwise disjoint.
                let mut spans: Vec<(usize, usize)> = live
                    .iter()
                    .map(|&(a, _)| (a.0, a.0 + r.block_size(a).unwrap()))
                    .collect();
                spans.sort();
                for w in spans.windows(2) {
                    prop_assert!(w[0].1 <= w[1].0);
                }
                // And every client's bytes survived everyone else's writes.
                for &(addr, written) in &live {
                    let mut back = vec![0u8; written];
                    r.read(addr, 0, &mut back).unwrap();
                    prop_assert_eq!(back, vec![fill_byte(addr); written]);
                }
            }

            #[test]
            fn alloc_then_free_is_a_round_trip(
                prefix in proptest::collection::vec(1usize..64, 0..12),
                n in 1usize..512,
            ) {
                let mut r = Region::new(ArenaConfig::new(512)).unwrap();
                let held: Vec<_> = prefix.iter().filter_map(|&p| r.alloc(p).ok()).collect();
                for addr in held.iter().step_by(2) {
                    r.free(*addr).unwrap();
                }

                let before = r.stats();
                if let Ok(addr) = r.alloc(n) {
                    r.free(addr).unwrap();
                }
                let after = r.stats();
                prop_assert_eq!(after.free_bytes, before.free_bytes);
                prop_assert_eq!(after.descriptors_in_use, before.descriptors_in_use);
                prop_assert_eq!(after.block_count(), before.block_count());
            }

            #[test]
            fn churn_never_exceeds_descriptor_bound(
                sizes in proptest::collection::vec(1usize..8, 1..300),
            ) {
                let mut r = Region::new(ArenaConfig::new(256).with_min_split(0)).unwrap();
                let bound = r.stats().descriptor_capacity;
                for n in sizes {
                    let a = r.alloc(n);
                    let b = r.alloc(n);
                    if let Ok(a) = a {
                        r.free(a).unwrap();
                    }
                    if let Ok(b) = b {
                        r.free(b).unwrap();
                    }
                    prop_assert!(r.stats().descriptors_in_use <= bound);
                    prop_assert_eq!(r.stats().descriptors_in_use, 1);
                }
            }
        }
    }
}
