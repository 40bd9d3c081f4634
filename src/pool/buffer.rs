//! Bounded buffer pool, handing out opaque handles.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::cell::{RefCell, UnsafeCell};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU16, Ordering};

use critical_section::Mutex;
use heapless::Vec;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::pool::DmaRegion;

static NEXT_POOL_ID: AtomicU16 = AtomicU16::new(0);

/// Ownership of one buffer in a [`BufferPool`].
///
/// Not `Clone` or `Copy` - whoever holds the handle owns the buffer.  Give it back
/// with [`BufferPool::release()`], which consumes it.  Dropping a handle leaks the
/// buffer for the lifetime of the pool.
#[derive(Debug, PartialEq, Eq)]
pub struct BufferHandle {
    pool: u16,
    index: u16,
}

impl BufferHandle {
    /// Position of the buffer within its pool
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Fixed capacity pool of `N` buffers, each `SIZE` bytes.
///
/// All buffers are allocated when the pool is created.  The free list is guarded by
/// a critical section, so [`Self::acquire()`] may be called from interrupt context
/// while a task calls [`Self::release()`].
///
/// At all times the number of handles held by callers plus [`Self::available()`]
/// equals `N`.
pub struct BufferPool<const N: usize, const SIZE: usize> {
    id: u16,
    buffers: [UnsafeCell<[u8; SIZE]>; N],
    free: Mutex<RefCell<Vec<u16, N>>>,
}

// Buffer contents are only reachable through a unique BufferHandle, and the free list
// is behind a critical section.
unsafe impl<const N: usize, const SIZE: usize> Sync for BufferPool<N, SIZE> {}

impl<const N: usize, const SIZE: usize> BufferPool<N, SIZE> {
    /// Create a pool with all `N` buffers free.
    pub fn new() -> Self {
        const { assert!(N <= u16::MAX as usize, "pool depth must fit a u16") };

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let free: Vec<u16, N> = (0..N).map(|index| index as u16).collect();

        debug!("Created buffer pool {id} with {N} buffers of {SIZE} bytes");

        Self {
            id,
            buffers: core::array::from_fn(|_| UnsafeCell::new([0; SIZE])),
            free: Mutex::new(RefCell::new(free)),
        }
    }

    /// Acquire a free buffer able to hold `size` bytes.
    ///
    /// Returns `None` if `size` exceeds the buffer size or no buffer is free.  Never
    /// blocks.
    pub fn acquire(&self, size: usize) -> Option<BufferHandle> {
        if size > SIZE {
            warn!("Pool {}: acquire of {size} bytes exceeds buffer size {SIZE}", self.id);
            return None;
        }

        let index = critical_section::with(|cs| self.free.borrow_ref_mut(cs).pop());
        match index {
            Some(index) => {
                trace!("Pool {}: acquired buffer {index}", self.id);
                Some(BufferHandle {
                    pool: self.id,
                    index,
                })
            }
            None => {
                warn!("Pool {}: exhausted", self.id);
                None
            }
        }
    }

    /// Return a buffer to the pool.
    ///
    /// # Panics
    ///
    /// If the handle was not issued by this pool, or the buffer is already free.
    /// Either means caller state is corrupt.
    pub fn release(&self, handle: BufferHandle) {
        self.check_owner(&handle);

        let available = critical_section::with(|cs| {
            let mut free = self.free.borrow_ref_mut(cs);
            assert!(
                !free.contains(&handle.index),
                "BUG: buffer {} released to pool {} twice",
                handle.index,
                self.id
            );
            if free.push(handle.index).is_err() {
                panic!("BUG: pool {} free list overflow", self.id);
            }
            free.len()
        });

        trace!(
            "Pool {}: released buffer {}, {available} free",
            self.id, handle.index
        );
    }

    /// Contents of a held buffer
    pub fn buffer<'s>(&'s self, handle: &'s BufferHandle) -> &'s [u8] {
        self.check_owner(handle);
        // The handle is borrowed for the lifetime of the slice, so no mutable access
        // to this buffer can exist at the same time.
        unsafe { &*self.buffers[handle.index()].get() }
    }

    /// Mutable contents of a held buffer
    pub fn buffer_mut<'s>(&'s self, handle: &'s mut BufferHandle) -> &'s mut [u8] {
        self.check_owner(handle);
        // The handle is mutably borrowed for the lifetime of the slice.
        unsafe { &mut *self.buffers[handle.index()].get() }
    }

    /// Region of a held buffer, for a peripheral to receive into.
    pub fn dma_region(&self, handle: &mut BufferHandle) -> DmaRegion {
        self.check_owner(handle);
        let ptr = self.buffers[handle.index()].get() as *mut u8;
        // UnsafeCell::get never returns null
        let ptr = unsafe { NonNull::new_unchecked(ptr) };
        DmaRegion::new(ptr, SIZE)
    }

    /// Number of free buffers
    pub fn available(&self) -> usize {
        critical_section::with(|cs| self.free.borrow_ref(cs).len())
    }

    /// Number of buffers currently held by callers
    pub fn held(&self) -> usize {
        N - self.available()
    }

    /// Total number of buffers
    pub const fn depth(&self) -> usize {
        N
    }

    /// Size of each buffer in bytes
    pub const fn buffer_size(&self) -> usize {
        SIZE
    }

    fn check_owner(&self, handle: &BufferHandle) {
        assert!(
            handle.pool == self.id && handle.index() < N,
            "BUG: buffer {} of pool {} used with pool {}",
            handle.index,
            handle.pool,
            self.id
        );
    }
}

impl<const N: usize, const SIZE: usize> Default for BufferPool<N, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}
