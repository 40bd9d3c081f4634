//! Round-robin slot reuse, with no ownership tracking.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::ptr::NonNull;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::pool::DmaRegion;

/// Index of a slot in a [`CyclicPool`].
///
/// Only valid until the pool has handed out `M` further slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicSlot(usize);

impl CyclicSlot {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// `M` slots of `SIZE` bytes, handed out in strict rotation.
///
/// The k-th call to [`Self::acquire()`] returns slot `(k - 1) % M`, regardless of
/// whether the previous user of that slot has finished with it.  Correctness depends
/// on `M` exceeding the number of slots in flight between producer and consumer.
///
/// Intended for back-to-back receptions within a single interrupt handler.  Not
/// shared between threads.
pub struct CyclicPool<const M: usize, const SIZE: usize> {
    slots: [[u8; SIZE]; M],
    next: usize,
}

impl<const M: usize, const SIZE: usize> CyclicPool<M, SIZE> {
    pub const fn new() -> Self {
        const { assert!(M > 0, "cyclic pool needs at least one slot") };
        Self {
            slots: [[0; SIZE]; M],
            next: 0,
        }
    }

    /// Hand out the next slot in rotation, or `None` if `size` exceeds the slot size.
    pub fn acquire(&mut self, size: usize) -> Option<CyclicSlot> {
        if size > SIZE {
            warn!("Cyclic pool: acquire of {size} bytes exceeds slot size {SIZE}");
            return None;
        }
        let slot = CyclicSlot(self.next);
        self.next = (self.next + 1) % M;
        Some(slot)
    }

    /// Contents of a slot
    pub fn contents(&self, slot: CyclicSlot) -> &[u8] {
        &self.slots[slot.0]
    }

    /// Mutable contents of a slot
    pub fn contents_mut(&mut self, slot: CyclicSlot) -> &mut [u8] {
        &mut self.slots[slot.0]
    }

    /// Region of a slot, for a peripheral to receive into
    pub fn dma_region(&mut self, slot: CyclicSlot) -> DmaRegion {
        let ptr = NonNull::from(&mut self.slots[slot.0]).cast::<u8>();
        DmaRegion::new(ptr, SIZE)
    }

    pub const fn depth(&self) -> usize {
        M
    }

    pub const fn slot_size(&self) -> usize {
        SIZE
    }
}

impl<const M: usize, const SIZE: usize> Default for CyclicPool<M, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}
