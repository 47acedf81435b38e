//! Test utilities and mock types for carve development.
//!
//! Provides a [`MockArena`] implementing [`ArenaAlloc`] without any
//! descriptor chain, span assertion helpers, test logging setup, and the
//! [`NodeList`](fixtures::NodeList) fixture: a singly linked list whose
//! nodes live in allocator blocks.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use carve_core::{AllocError, ArenaAlloc, BlockAddr};

pub use fixtures::NodeList;

/// Install `env_logger` for the current test binary.
///
/// Safe to call from every test; only the first call installs the logger.
/// Output goes through the test harness capture, so `RUST_LOG=trace cargo
/// test` shows allocator traces only for failing tests.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic, address-dependent fill bytes for a block.
///
/// Two different blocks get different patterns, so a test that finds one
/// block's pattern inside another has found an overlap.
pub fn fill_pattern(addr: BlockAddr, len: usize) -> Vec<u8> {
    let seed = addr.0.wrapping_mul(31).wrapping_add(7);
    (0..len)
        .map(|i| (seed.wrapping_add(i) % 251) as u8)
        .collect()
}

/// Assert that `(offset, size)` spans are pairwise disjoint.
pub fn assert_disjoint(spans: &[(usize, usize)]) {
    let mut sorted = spans.to_vec();
    sorted.sort_unstable();
    for w in sorted.windows(2) {
        let (a_off, a_len) = w[0];
        let (b_off, _) = w[1];
        assert!(
            a_off + a_len <= b_off,
            "span [{a_off}, {}) overlaps span starting at {b_off}",
            a_off + a_len
        );
    }
}

/// Assert that `(offset, size)` spans, in order, tile `[0, capacity)`
/// exactly with no empty span.
pub fn assert_tiles(spans: &[(usize, usize)], capacity: usize) {
    let mut expected = 0;
    for &(offset, size) in spans {
        assert_eq!(offset, expected, "gap or overlap at offset {offset}");
        assert!(size > 0, "empty span at offset {offset}");
        expected += size;
    }
    assert_eq!(expected, capacity, "spans do not cover the arena");
}

/// Mock implementation of [`ArenaAlloc`].
///
/// Every block is its own `Vec<u8>` and addresses are never reused, so
/// stale addresses are always detected. An optional block limit makes
/// allocation failure easy to provoke.
pub struct MockArena {
    state: Mutex<MockState>,
}

struct MockState {
    blocks: HashMap<BlockAddr, Vec<u8>>,
    freed: HashSet<BlockAddr>,
    next: usize,
    max_blocks: Option<usize>,
    allocs: usize,
    frees: usize,
}

impl MockArena {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                blocks: HashMap::new(),
                freed: HashSet::new(),
                next: 0,
                max_blocks: None,
                allocs: 0,
                frees: 0,
            }),
        }
    }

    /// A mock that fails any allocation beyond `max_blocks` live blocks.
    pub fn with_max_blocks(max_blocks: usize) -> Self {
        let mock = Self::new();
        mock.state.lock().unwrap().max_blocks = Some(max_blocks);
        mock
    }

    /// Number of live blocks.
    pub fn live_blocks(&self) -> usize {
        self.state.lock().unwrap().blocks.len()
    }

    /// Total successful `alloc` calls (including `resize(None, _)`).
    pub fn alloc_calls(&self) -> usize {
        self.state.lock().unwrap().allocs
    }

    /// Total successful `free` calls.
    pub fn free_calls(&self) -> usize {
        self.state.lock().unwrap().frees
    }
}

impl Default for MockArena {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn alloc(&mut self, size: usize) -> Result<BlockAddr, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        if self.max_blocks.is_some_and(|max| self.blocks.len() >= max) {
            return Err(AllocError::OutOfSpace {
                requested: size,
                largest_free: 0,
            });
        }
        let addr = BlockAddr(self.next);
        self.next += size;
        self.blocks.insert(addr, vec![0; size]);
        self.allocs += 1;
        Ok(addr)
    }

    fn lookup_error(&self, addr: BlockAddr) -> AllocError {
        if self.freed.contains(&addr) {
            AllocError::DoubleFree { addr }
        } else {
            AllocError::InvalidPointer { addr }
        }
    }

    fn block(&self, addr: BlockAddr, offset: usize, len: usize) -> Result<&[u8], AllocError> {
        let block = self.blocks.get(&addr).ok_or_else(|| self.lookup_error(addr))?;
        offset
            .checked_add(len)
            .and_then(|end| block.get(offset..end))
            .ok_or(AllocError::OutOfBounds {
                addr,
                offset,
                len,
                block_size: block.len(),
            })
    }
}

impl ArenaAlloc for MockArena {
    fn alloc(&self, size: usize) -> Result<BlockAddr, AllocError> {
        self.state.lock().unwrap().alloc(size)
    }

    fn free(&self, addr: BlockAddr) -> Result<(), AllocError> {
        let mut state = self.state.lock().unwrap();
        if state.blocks.remove(&addr).is_none() {
            return Err(state.lookup_error(addr));
        }
        state.freed.insert(addr);
        state.frees += 1;
        Ok(())
    }

    fn resize(&self, addr: Option<BlockAddr>, size: usize) -> Result<BlockAddr, AllocError> {
        let mut state = self.state.lock().unwrap();
        let Some(addr) = addr else {
            return state.alloc(size);
        };
        state.block(addr, 0, 0)?;
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let new_addr = state.alloc(size)?;
        let mut bytes = state.blocks.remove(&addr).unwrap_or_default();
        bytes.resize(size, 0);
        state.blocks.insert(new_addr, bytes);
        state.freed.insert(addr);
        Ok(new_addr)
    }

    fn read(&self, addr: BlockAddr, offset: usize, buf: &mut [u8]) -> Result<(), AllocError> {
        let state = self.state.lock().unwrap();
        buf.copy_from_slice(state.block(addr, offset, buf.len())?);
        Ok(())
    }

    fn write(&self, addr: BlockAddr, offset: usize, bytes: &[u8]) -> Result<(), AllocError> {
        let mut state = self.state.lock().unwrap();
        state.block(addr, offset, bytes.len())?;
        if let Some(block) = state.blocks.get_mut(&addr) {
            block[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }
}
