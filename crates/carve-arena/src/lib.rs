//! Fixed-capacity region allocation with a bounded descriptor pool.
//!
//! One arena of bytes is reserved up front and carved into variable-sized
//! blocks on request. All bookkeeping lives in a fixed [`MetadataPool`], so
//! after `init` no operation calls back into the system allocator.
//!
//! # Architecture
//!
//! ```text
//! RegionAllocator (Mutex, lifecycle: Uninitialized <-> Ready)
//! └── Region (lock-free core, &mut self)
//!     ├── arena: Vec<u8>                 fixed capacity
//!     ├── MetadataPool → BlockDescriptor[] linked by SlotId
//!     │   (one chain: free and used spans, ascending offset)
//!     └── live index: offset → SlotId    used spans only
//! ```
//!
//! # Chain invariants
//!
//! - The spans tile `[0, capacity)` exactly, in ascending offset order.
//! - No two neighbouring spans are both free.
//! - No span is empty.
//! - The chain never holds more descriptors than the pool's capacity.
//!
//! [`Region::check_invariants`] verifies all of these.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod pool;
pub mod region;
pub mod stats;

// Public re-exports for the primary API surface.
pub use allocator::RegionAllocator;
pub use config::ArenaConfig;
pub use descriptor::{BlockDescriptor, BlockInfo, BlockState};
pub use error::{InvariantViolation, PoolError};
pub use pool::MetadataPool;
pub use region::Region;
pub use stats::{ArenaStats, OpCounters};
