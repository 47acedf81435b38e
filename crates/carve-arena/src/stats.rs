//! Occupancy and operation statistics for a region.
//!
//! [`ArenaStats`] is a point-in-time summary of the chain plus cumulative
//! operation counters, for telemetry, tests and fragmentation profiling.

/// Cumulative operation counters, reset only by `deinit`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpCounters {
    /// Successful `alloc` calls (including `resize(None, _)`).
    pub allocs: u64,
    /// Successful `free` calls.
    pub frees: u64,
    /// Successful `resize` calls on an existing block.
    pub resizes: u64,
    /// Resizes served without moving the block.
    pub in_place_resizes: u64,
    /// Resizes that moved the block to a new address.
    pub relocations: u64,
    /// Free spans split to carve off a remainder.
    pub splits: u64,
    /// Pairs of adjacent free spans merged into one.
    pub merges: u64,
    /// `alloc`/`resize` calls that failed.
    pub failed_allocs: u64,
    /// `free`/`resize` calls rejected for an unknown or already-free address.
    pub rejected_frees: u64,
}

/// Snapshot of arena occupancy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Arena size in bytes.
    pub capacity: usize,
    /// Bytes in free spans.
    pub free_bytes: usize,
    /// Bytes in used spans, including slack from unsplit spans.
    pub used_bytes: usize,
    /// Number of free spans.
    pub free_blocks: usize,
    /// Number of used spans.
    pub used_blocks: usize,
    /// Size of the largest free span.
    pub largest_free: usize,
    /// Descriptor slots currently linked into the chain.
    pub descriptors_in_use: usize,
    /// Fixed descriptor capacity of the metadata pool.
    pub descriptor_capacity: usize,
    /// Most descriptor slots ever in use at once.
    pub descriptor_high_water: usize,
    /// Cumulative operation counters.
    pub ops: OpCounters,
}

impl ArenaStats {
    /// Total number of spans in the chain.
    pub fn block_count(&self) -> usize {
        self.free_blocks + self.used_blocks
    }

    /// Share of free bytes not in the largest free span, in `[0, 1]`.
    ///
    /// `0.0` means all free space is contiguous (or there is none).
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - self.largest_free as f64 / self.free_bytes as f64
    }
}
