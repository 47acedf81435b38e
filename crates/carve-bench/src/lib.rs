//! Churn workloads and utilities for benchmarking carve allocators.
//!
//! Provides deterministic operation streams for soak tests and benchmarks:
//!
//! - [`churn_ops`]: a seeded mix of allocs, frees and resizes
//! - [`list_values`]: seeded payloads for list-consumer workloads
//! - [`run_churn`]: replay a stream against any [`ArenaAlloc`]

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use carve_core::{AllocError, ArenaAlloc, BlockAddr};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// One step of a churn workload.
///
/// `Free` and `Resize` name a live block by index into the replayer's
/// live set (taken modulo its length), so a stream is valid for any
/// allocator regardless of which allocations succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChurnOp {
    /// Allocate `size` bytes.
    Alloc {
        /// Requested bytes.
        size: usize,
    },
    /// Free a live block.
    Free {
        /// Index into the live set.
        pick: usize,
    },
    /// Resize a live block to `size` bytes.
    Resize {
        /// Index into the live set.
        pick: usize,
        /// New requested size.
        size: usize,
    },
}

/// Generate `count` churn operations with sizes in `1..=max_size`.
///
/// Roughly half the stream allocates, a third frees and the rest resizes,
/// so the live set grows slowly and the arena sees steady fragmentation
/// pressure. Identical seeds produce identical streams.
pub fn churn_ops(seed: u64, count: usize, max_size: usize) -> Vec<ChurnOp> {
    let max_size = max_size.max(1);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| match rng.random_range(0..100u32) {
            0..50 => ChurnOp::Alloc {
                size: rng.random_range(1..=max_size),
            },
            50..85 => ChurnOp::Free {
                pick: rng.random_range(0..usize::MAX),
            },
            _ => ChurnOp::Resize {
                pick: rng.random_range(0..usize::MAX),
                size: rng.random_range(1..=max_size),
            },
        })
        .collect()
}

/// Generate `count` list payloads.
pub fn list_values(seed: u64, count: usize) -> Vec<i32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count).map(|_| rng.random_range(-1000..1000)).collect()
}

/// Outcome of [`run_churn`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChurnReport {
    /// Successful allocations.
    pub allocs: usize,
    /// Successful frees, including the final drain.
    pub frees: usize,
    /// Successful resizes.
    pub resizes: usize,
    /// Allocs and resizes refused for lack of space or metadata.
    pub refused: usize,
    /// Most blocks live at once.
    pub peak_live: usize,
    /// Blocks whose stamp did not survive until they were freed.
    pub corrupted: usize,
}

/// Replay `ops` against `alloc`, then free every block still live.
///
/// Each block carries an address-derived stamp in its first bytes, checked
/// when the block is resized or freed; a mismatch counts as corruption.
/// `OutOfSpace` and `MetadataExhausted` are expected under pressure and
/// only counted. Any other error means the allocator rejected a valid
/// request and is returned.
pub fn run_churn<A: ArenaAlloc + ?Sized>(
    alloc: &A,
    ops: &[ChurnOp],
) -> Result<ChurnReport, AllocError> {
    let mut report = ChurnReport::default();
    let mut live: Vec<(BlockAddr, usize)> = Vec::new();

    for op in ops {
        match *op {
            ChurnOp::Alloc { size } => match alloc.alloc(size) {
                Ok(addr) => {
                    write_stamp(alloc, addr, size)?;
                    live.push((addr, size));
                    report.allocs += 1;
                }
                Err(err) if is_pressure(&err) => report.refused += 1,
                Err(err) => return Err(err),
            },
            ChurnOp::Free { pick } if !live.is_empty() => {
                let (addr, size) = live.swap_remove(pick % live.len());
                if !check_stamp(alloc, addr, size, addr)? {
                    report.corrupted += 1;
                }
                alloc.free(addr)?;
                report.frees += 1;
            }
            ChurnOp::Resize { pick, size } if !live.is_empty() => {
                let idx = pick % live.len();
                let (addr, old_size) = live[idx];
                match alloc.resize(Some(addr), size) {
                    Ok(new_addr) => {
                        // The stamp moves with the bytes, so it still names
                        // the old address.
                        if !check_stamp(alloc, new_addr, old_size.min(size), addr)? {
                            report.corrupted += 1;
                        }
                        write_stamp(alloc, new_addr, size)?;
                        live[idx] = (new_addr, size);
                        report.resizes += 1;
                    }
                    Err(err) if is_pressure(&err) => report.refused += 1,
                    Err(err) => return Err(err),
                }
            }
            _ => {}
        }
        report.peak_live = report.peak_live.max(live.len());
    }

    for (addr, size) in live {
        if !check_stamp(alloc, addr, size, addr)? {
            report.corrupted += 1;
        }
        alloc.free(addr)?;
        report.frees += 1;
    }
    Ok(report)
}

fn is_pressure(err: &AllocError) -> bool {
    matches!(
        err,
        AllocError::OutOfSpace { .. } | AllocError::MetadataExhausted { .. }
    )
}

fn stamp(addr: BlockAddr) -> [u8; 8] {
    (addr.0 as u64 ^ 0x9E37_79B9_7F4A_7C15).to_le_bytes()
}

fn write_stamp<A: ArenaAlloc + ?Sized>(
    alloc: &A,
    addr: BlockAddr,
    size: usize,
) -> Result<(), AllocError> {
    let len = size.min(8);
    alloc.write(addr, 0, &stamp(addr)[..len])
}

fn check_stamp<A: ArenaAlloc + ?Sized>(
    alloc: &A,
    addr: BlockAddr,
    size: usize,
    stamped_as: BlockAddr,
) -> Result<bool, AllocError> {
    let len = size.min(8);
    let mut buf = [0u8; 8];
    alloc.read(addr, 0, &mut buf[..len])?;
    Ok(buf[..len] == stamp(stamped_as)[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn churn_ops_deterministic() {
        assert_eq!(churn_ops(42, 500, 64), churn_ops(42, 500, 64));
        assert_ne!(churn_ops(42, 500, 64), churn_ops(43, 500, 64));
    }

    #[test]
    fn churn_sizes_in_range() {
        for op in churn_ops(7, 2_000, 32) {
            match op {
                ChurnOp::Alloc { size } | ChurnOp::Resize { size, .. } => {
                    assert!((1..=32).contains(&size), "size {size} out of range");
                }
                ChurnOp::Free { .. } => {}
            }
        }
    }

    #[test]
    fn churn_mix_contains_every_kind() {
        let ops = churn_ops(1, 1_000, 16);
        assert!(ops.iter().any(|op| matches!(op, ChurnOp::Alloc { .. })));
        assert!(ops.iter().any(|op| matches!(op, ChurnOp::Free { .. })));
        assert!(ops.iter().any(|op| matches!(op, ChurnOp::Resize { .. })));
    }

    #[test]
    fn list_values_deterministic() {
        let a = list_values(9, 100);
        assert_eq!(a, list_values(9, 100));
        assert!(a.iter().all(|v| (-1000..1000).contains(v)));
    }
}
