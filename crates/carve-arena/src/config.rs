//! Arena configuration parameters.

use carve_core::AllocError;

use crate::descriptor::BlockDescriptor;

/// Configuration for a region allocator.
///
/// Controls arena capacity, the split threshold, the metadata pool bound,
/// and request-size rounding. Validated at `init`; all values are
/// immutable for the lifetime of the arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Size of the arena in bytes. Must be non-zero.
    pub capacity: usize,

    /// Minimum remainder worth tracking as its own free span.
    ///
    /// When a free span of size `S` satisfies a request of `n` bytes, the
    /// remainder `S - n` is split off only if it is strictly greater than
    /// this threshold; otherwise the whole span is handed out. A zero
    /// remainder is therefore never kept as a descriptor.
    ///
    /// Default: [`ArenaConfig::DEFAULT_MIN_SPLIT`].
    pub min_split: usize,

    /// Fixed number of descriptor slots in the metadata pool.
    ///
    /// `None` derives the bound from the capacity, see
    /// [`ArenaConfig::descriptor_capacity`].
    pub max_descriptors: Option<usize>,

    /// Request sizes are rounded up to a multiple of this value.
    ///
    /// Must be a power of two. Default: 1 (byte granularity).
    pub alignment: usize,
}

impl ArenaConfig {
    /// Default split threshold: the footprint of one descriptor record.
    pub const DEFAULT_MIN_SPLIT: usize = BlockDescriptor::FOOTPRINT;

    /// Default request rounding: none.
    pub const DEFAULT_ALIGNMENT: usize = 1;

    /// Natural word alignment, for callers that store machine words in
    /// their blocks.
    pub const WORD_ALIGNMENT: usize = std::mem::size_of::<usize>();

    /// Create a config for an arena of `capacity` bytes with defaults for
    /// everything else.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            min_split: Self::DEFAULT_MIN_SPLIT,
            max_descriptors: None,
            alignment: Self::DEFAULT_ALIGNMENT,
        }
    }

    /// Set an explicit descriptor pool bound.
    pub fn with_max_descriptors(mut self, max_descriptors: usize) -> Self {
        self.max_descriptors = Some(max_descriptors);
        self
    }

    /// Set the split threshold.
    pub fn with_min_split(mut self, min_split: usize) -> Self {
        self.min_split = min_split;
        self
    }

    /// Set the request-size alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Number of descriptor slots the metadata pool reserves.
    ///
    /// An explicit `max_descriptors` wins. Otherwise the pool holds one
    /// slot per `max(1, min_split)` bytes of arena, and never fewer than
    /// one (the initial span covering the whole arena needs a slot).
    pub fn descriptor_capacity(&self) -> usize {
        match self.max_descriptors {
            Some(n) => n,
            None => (self.capacity / self.min_split.max(1)).max(1),
        }
    }

    /// Round a request up to the configured alignment.
    ///
    /// Returns `None` if rounding overflows `usize`.
    pub fn align_size(&self, size: usize) -> Option<usize> {
        let mask = self.alignment - 1;
        size.checked_add(mask).map(|s| s & !mask)
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<(), AllocError> {
        if self.capacity == 0 {
            return Err(AllocError::InvalidCapacity);
        }
        if !self.alignment.is_power_of_two() {
            return Err(AllocError::InvalidConfig {
                reason: format!("alignment {} is not a power of two", self.alignment),
            });
        }
        if self.max_descriptors == Some(0) {
            return Err(AllocError::InvalidConfig {
                reason: "metadata pool needs at least one descriptor slot".to_string(),
            });
        }
        if u32::try_from(self.descriptor_capacity()).is_err() {
            return Err(AllocError::InvalidConfig {
                reason: format!(
                    "descriptor capacity {} exceeds the slot id range",
                    self.descriptor_capacity()
                ),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
