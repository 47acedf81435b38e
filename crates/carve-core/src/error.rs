//! Error types for the Carve region allocator.
//!
//! Every allocator failure is reported synchronously as one [`AllocError`]
//! variant. "No space" calls for a smaller request, "bad input" for a
//! caller fix, "bookkeeping exhausted" for a larger metadata pool.

use std::error::Error;
use std::fmt;

use crate::id::BlockAddr;

/// Errors from allocator lifecycle and block operations.
///
/// A failed `alloc`, `resize`, or `free` leaves the allocator usable and
/// every chain invariant intact; only a successful `init` or `deinit`
/// changes the ready/uninitialized state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// `init` was asked for a zero-byte arena.
    InvalidCapacity,
    /// A zero-byte block was requested.
    InvalidSize,
    /// The arena configuration failed validation.
    InvalidConfig {
        /// Description of the rejected setting.
        reason: String,
    },
    /// The environment could not supply the arena or metadata storage.
    OutOfMemory {
        /// Number of bytes the failed reservation asked for.
        requested: usize,
    },
    /// No free span is large enough for the request.
    OutOfSpace {
        /// Number of bytes requested (after alignment rounding).
        requested: usize,
        /// Size of the largest free span at the time of the request.
        largest_free: usize,
    },
    /// The metadata pool has no descriptor slot left, even though arena
    /// bytes may remain.
    MetadataExhausted {
        /// Fixed descriptor capacity of the pool.
        capacity: usize,
    },
    /// The address is not the start of any span tracked by the arena.
    InvalidPointer {
        /// The rejected address.
        addr: BlockAddr,
    },
    /// The address starts a span that is already free.
    DoubleFree {
        /// The rejected address.
        addr: BlockAddr,
    },
    /// A read or write would cross the end of its block.
    OutOfBounds {
        /// The block being accessed.
        addr: BlockAddr,
        /// Byte offset within the block where the access starts.
        offset: usize,
        /// Number of bytes accessed.
        len: usize,
        /// Size of the block.
        block_size: usize,
    },
    /// The allocator has not been initialized (or was deinitialized).
    Uninitialized,
    /// `init` was called on an allocator that is already ready.
    AlreadyInitialized,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCapacity => write!(f, "arena capacity must be non-zero"),
            Self::InvalidSize => write!(f, "allocation size must be non-zero"),
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: could not reserve {requested} bytes")
            }
            Self::OutOfSpace {
                requested,
                largest_free,
            } => write!(
                f,
                "out of arena space: requested {requested}B, largest free span {largest_free}B"
            ),
            Self::MetadataExhausted { capacity } => {
                write!(f, "metadata pool exhausted: all {capacity} descriptor slots in use")
            }
            Self::InvalidPointer { addr } => write!(f, "invalid block address {addr}"),
            Self::DoubleFree { addr } => write!(f, "double free of block {addr}"),
            Self::OutOfBounds {
                addr,
                offset,
                len,
                block_size,
            } => write!(
                f,
                "access of {len}B at offset {offset} overruns block {addr} of {block_size}B"
            ),
            Self::Uninitialized => write!(f, "allocator is not initialized"),
            Self::AlreadyInitialized => write!(f, "allocator is already initialized"),
        }
    }
}

impl Error for AllocError {}
