//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use carve_core::{AllocError, BlockAddr, SlotId};

/// Errors from the metadata pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The up-front reservation of descriptor storage failed.
    PoolExhausted {
        /// Number of descriptor slots the reservation asked for.
        requested: usize,
    },
    /// Every descriptor slot is in use.
    MetadataExhausted {
        /// Fixed slot capacity of the pool.
        capacity: usize,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolExhausted { requested } => {
                write!(f, "could not reserve {requested} descriptor slots")
            }
            Self::MetadataExhausted { capacity } => {
                write!(f, "all {capacity} descriptor slots in use")
            }
        }
    }
}

impl Error for PoolError {}

impl From<PoolError> for AllocError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::PoolExhausted { requested } => AllocError::OutOfMemory {
                requested: requested.saturating_mul(crate::descriptor::BlockDescriptor::FOOTPRINT),
            },
            PoolError::MetadataExhausted { capacity } => AllocError::MetadataExhausted { capacity },
        }
    }
}

/// A broken chain invariant, reported by `check_invariants`.
///
/// None of these should ever be observable after a public operation
/// returns; they exist so tests and debug tooling can say precisely what
/// went wrong if one is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Span sizes do not add up to the arena capacity.
    CoverageMismatch {
        /// Sum of all span sizes.
        covered: usize,
        /// Arena capacity.
        capacity: usize,
    },
    /// A span's cached offset does not follow on from its predecessor.
    Gap {
        /// The offending descriptor.
        slot: SlotId,
        /// Offset implied by the preceding spans.
        expected: usize,
        /// Offset cached in the descriptor.
        found: usize,
    },
    /// A span of zero bytes is in the chain.
    EmptySpan {
        /// The offending descriptor.
        slot: SlotId,
    },
    /// Two neighbouring spans are both free.
    UncoalescedFree {
        /// Offset of the first of the two spans.
        offset: usize,
    },
    /// More descriptors are linked than the pool can hold.
    DescriptorOverflow {
        /// Descriptors in the chain.
        in_chain: usize,
        /// Pool capacity.
        capacity: usize,
    },
    /// The pool's in-use count disagrees with the chain length.
    SlotLeak {
        /// Descriptors in the chain.
        in_chain: usize,
        /// Slots the pool believes are taken.
        in_use: usize,
    },
    /// The free-byte counter disagrees with the chain.
    FreeBytesMismatch {
        /// Sum of free span sizes.
        counted: usize,
        /// Value of the running counter.
        tracked: usize,
    },
    /// The live-address index disagrees with the chain's used spans.
    LiveIndexMismatch {
        /// An address present in one but not the other.
        addr: BlockAddr,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoverageMismatch { covered, capacity } => {
                write!(f, "spans cover {covered} bytes of a {capacity}-byte arena")
            }
            Self::Gap {
                slot,
                expected,
                found,
            } => write!(
                f,
                "descriptor {slot} starts at {found}, expected {expected}"
            ),
            Self::EmptySpan { slot } => write!(f, "descriptor {slot} has zero size"),
            Self::UncoalescedFree { offset } => {
                write!(f, "adjacent free spans at offset {offset}")
            }
            Self::DescriptorOverflow { in_chain, capacity } => write!(
                f,
                "{in_chain} descriptors linked but pool holds {capacity}"
            ),
            Self::SlotLeak { in_chain, in_use } => write!(
                f,
                "{in_chain} descriptors linked but pool reports {in_use} in use"
            ),
            Self::FreeBytesMismatch { counted, tracked } => write!(
                f,
                "free spans total {counted} bytes but counter says {tracked}"
            ),
            Self::LiveIndexMismatch { addr } => {
                write!(f, "live index disagrees with chain at {addr}")
            }
        }
    }
}

impl Error for InvariantViolation {}
