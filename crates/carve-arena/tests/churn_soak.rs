//! Integration test: long seeded churn against several arena shapes.
//!
//! Replays deterministic alloc/free/resize streams from `carve-bench` and
//! checks that no block's contents are ever clobbered, that the allocator
//! only ever refuses requests for lack of space or metadata, and that
//! draining every block returns the arena to a single free span with one
//! descriptor in use.

use carve_arena::{ArenaConfig, RegionAllocator};
use carve_bench::{churn_ops, run_churn, ChurnOp};
use carve_test_utils::init_logging;

fn soak(config: ArenaConfig, seed: u64, ops: usize, max_size: usize) {
    init_logging();
    let arena = RegionAllocator::new();
    arena.init_with(config.clone()).unwrap();

    let stream = churn_ops(seed, ops, max_size);
    let report = run_churn(&arena, &stream).unwrap();
    assert_eq!(report.corrupted, 0, "seed {seed}: corrupted blocks");
    assert_eq!(report.allocs, report.frees, "seed {seed}: drain incomplete");

    arena.check_invariants().unwrap();
    let stats = arena.stats().unwrap();
    assert_eq!(stats.used_bytes, 0);
    assert_eq!(stats.free_bytes, config.capacity);
    assert_eq!(stats.block_count(), 1);
    assert_eq!(stats.descriptors_in_use, 1);
    assert!(stats.descriptor_high_water <= stats.descriptor_capacity);
    assert_eq!(stats.ops.allocs as usize, report.allocs);
}

#[test]
fn default_config_soak() {
    for seed in 0..8 {
        soak(ArenaConfig::new(32 * 1024), seed, 5_000, 512);
    }
}

#[test]
fn tight_arena_soak() {
    // Small enough that a good share of requests is refused.
    for seed in 100..108 {
        soak(ArenaConfig::new(2048), seed, 5_000, 256);
    }
}

#[test]
fn tight_metadata_soak() {
    for seed in 200..204 {
        soak(
            ArenaConfig::new(64 * 1024).with_max_descriptors(16),
            seed,
            5_000,
            128,
        );
    }
}

#[test]
fn aligned_no_threshold_soak() {
    for seed in 300..304 {
        soak(
            ArenaConfig::new(16 * 1024)
                .with_alignment(ArenaConfig::WORD_ALIGNMENT)
                .with_min_split(0),
            seed,
            5_000,
            200,
        );
    }
}

#[test]
fn pressure_is_counted_not_fatal() {
    init_logging();
    let arena = RegionAllocator::new();
    arena.init(256).unwrap();
    let stream: Vec<ChurnOp> = (0..64).map(|_| ChurnOp::Alloc { size: 64 }).collect();
    let report = run_churn(&arena, &stream).unwrap();
    assert_eq!(report.allocs, 4);
    assert_eq!(report.refused, 60);
    assert_eq!(report.peak_live, 4);
    assert_eq!(arena.stats().unwrap().ops.failed_allocs, 60);
}
