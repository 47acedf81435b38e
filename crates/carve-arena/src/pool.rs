//! Fixed-capacity metadata pool for block descriptors.
//!
//! [`MetadataPool`] reserves storage for every descriptor the arena can ever
//! need in one up-front reservation, so descriptor bookkeeping never calls
//! back into the system allocator while the arena is live. Fresh slots are
//! handed out in strict index order; slots released by coalescing go onto a
//! free list and are reused before any fresh slot.

use carve_core::SlotId;

use crate::descriptor::BlockDescriptor;
use crate::error::PoolError;

/// Bounded storage for [`BlockDescriptor`]s, addressed by [`SlotId`].
///
/// The pool owns no arena bytes. It only knows which slots are taken; the
/// allocator decides what the descriptors in them mean.
pub struct MetadataPool {
    /// Slot storage. Grows up to `capacity` within the initial reservation
    /// and never beyond it.
    slots: Vec<BlockDescriptor>,
    /// Released slots available for reuse (LIFO).
    free_slots: Vec<SlotId>,
    /// Fixed slot bound.
    capacity: usize,
    /// Most slots ever in use at once.
    high_water: usize,
}

impl MetadataPool {
    /// Reserve storage for `capacity` descriptors.
    ///
    /// Fails with [`PoolError::PoolExhausted`] if the environment cannot
    /// supply the storage. No slot is taken yet.
    pub fn reserve(capacity: usize) -> Result<Self, PoolError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| PoolError::PoolExhausted { requested: capacity })?;
        let mut free_slots = Vec::new();
        free_slots
            .try_reserve_exact(capacity)
            .map_err(|_| PoolError::PoolExhausted { requested: capacity })?;
        Ok(Self {
            slots,
            free_slots,
            capacity,
            high_water: 0,
        })
    }

    /// Take an unused slot and store `descriptor` in it.
    ///
    /// Fails with [`PoolError::MetadataExhausted`] when every slot is in use;
    /// the pool is unchanged in that case.
    pub fn take(&mut self, descriptor: BlockDescriptor) -> Result<SlotId, PoolError> {
        let slot = if let Some(slot) = self.free_slots.pop() {
            self.slots[slot.index()] = descriptor;
            slot
        } else if self.slots.len() < self.capacity {
            // capacity fits in u32, checked by ArenaConfig::validate.
            let slot = SlotId(self.slots.len() as u32);
            self.slots.push(descriptor);
            slot
        } else {
            return Err(PoolError::MetadataExhausted {
                capacity: self.capacity,
            });
        };
        self.high_water = self.high_water.max(self.in_use());
        Ok(slot)
    }

    /// Make a slot available to a future [`take`](Self::take).
    ///
    /// Only coalescing releases slots; the descriptor in a released slot
    /// must no longer be linked into the chain.
    pub fn release(&mut self, slot: SlotId) {
        debug_assert!(slot.index() < self.slots.len(), "release of unknown slot {slot}");
        debug_assert!(!self.free_slots.contains(&slot), "slot {slot} released twice");
        self.free_slots.push(slot);
    }

    /// Whether [`take`](Self::take) would succeed.
    pub fn has_free_slot(&self) -> bool {
        !self.free_slots.is_empty() || self.slots.len() < self.capacity
    }

    /// Shared access to the descriptor in `slot`.
    pub fn get(&self, slot: SlotId) -> &BlockDescriptor {
        &self.slots[slot.index()]
    }

    /// Mutable access to the descriptor in `slot`.
    pub fn get_mut(&mut self, slot: SlotId) -> &mut BlockDescriptor {
        &mut self.slots[slot.index()]
    }

    /// Number of slots currently taken.
    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    /// Fixed slot capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots that can still be taken.
    pub fn available(&self) -> usize {
        self.capacity - self.in_use()
    }

    /// Most slots ever in use at once.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Memory held by the slot storage and the free-slot stack in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<BlockDescriptor>()
            + self.free_slots.capacity() * std::mem::size_of::<SlotId>()
    }
}
