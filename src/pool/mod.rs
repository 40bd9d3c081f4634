//! Buffer allocators for the receive path.
//!
//! - [`BufferPool`] - fixed number of fixed-size buffers, handed out as opaque
//!   [`BufferHandle`]s.  Safe to acquire from interrupt context and release from task
//!   context.
//! - [`CyclicPool`] - round-robin reuse of a small set of slots, with no ownership
//!   tracking.  Only for a single producer which knows its consumer keeps up.
//!
//! Neither pool ever grows, blocks or frees memory.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod buffer;
pub mod cyclic;

pub use buffer::{BufferHandle, BufferPool};
pub use cyclic::{CyclicPool, CyclicSlot};

use core::ptr::NonNull;

/// A memory region handed to a peripheral for DMA reception.
///
/// Created by a pool from a buffer it owns on the caller's behalf.  The region stays
/// valid until that buffer is released (or, for a [`CyclicPool`], reused), which the
/// receive handlers guarantee by stopping the peripheral first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl DmaRegion {
    pub(crate) fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Start address, as programmed into a DMA controller
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Region length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw pointer to the start of the region
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// View the region as a mutable slice.  Used by peripheral implementations which
    /// copy data in by software rather than by DMA.
    ///
    /// # Safety
    ///
    /// The region must still be armed (its buffer not released or reused), and no
    /// other reference to the buffer may be live while the returned slice is used.
    pub unsafe fn as_mut_slice<'r>(&self) -> &'r mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

// A DmaRegion is only an address range.  Access through it is unsafe.
unsafe impl Send for DmaRegion {}
