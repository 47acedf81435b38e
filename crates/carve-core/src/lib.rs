//! Core types and traits for the Carve region allocator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Carve workspace:
//! block addresses, descriptor slot ids, the allocation error taxonomy,
//! and the [`ArenaAlloc`] trait that allocator clients program against.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod traits;

pub use error::AllocError;
pub use id::{BlockAddr, SlotId};
pub use traits::ArenaAlloc;
