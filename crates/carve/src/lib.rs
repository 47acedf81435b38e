//! Carve: a fixed-capacity region allocator.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the carve sub-crates. For most users, adding `carve` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use carve::prelude::*;
//!
//! let arena = RegionAllocator::new();
//! arena.init(400).unwrap();
//!
//! let a = arena.alloc(100).unwrap();
//! let b = arena.alloc(100).unwrap();
//! arena.write(a, 0, &[1, 2, 3]).unwrap();
//!
//! // Grow `a`: its neighbour is in use, so it moves and keeps its bytes.
//! let a = arena.resize(Some(a), 150).unwrap();
//! let mut buf = [0u8; 3];
//! arena.read(a, 0, &mut buf).unwrap();
//! assert_eq!(buf, [1, 2, 3]);
//!
//! arena.free(b).unwrap();
//! assert_eq!(arena.free(b), Err(AllocError::DoubleFree { addr: b }));
//! assert!(arena.check_invariants().is_ok());
//! arena.deinit().unwrap();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `carve-arena` | Allocator, region, metadata pool, config, stats |
//! | [`types`] | `carve-core` | Block addresses, slot ids, errors, the client trait |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Region allocator, metadata pool and diagnostics (`carve-arena`).
///
/// Most users only need [`arena::RegionAllocator`] and
/// [`arena::ArenaConfig`]; both are in the [`prelude`].
pub use carve_arena as arena;

/// Core ids, errors and the client trait (`carve-core`).
pub use carve_core as types;

/// Common imports for typical carve usage.
///
/// ```rust
/// use carve::prelude::*;
/// ```
pub mod prelude {
    // Allocator and configuration
    pub use carve_arena::{ArenaConfig, RegionAllocator};

    // Diagnostics
    pub use carve_arena::{ArenaStats, BlockInfo, BlockState, InvariantViolation};

    // Core types and traits
    pub use carve_core::{AllocError, ArenaAlloc, BlockAddr};
}
