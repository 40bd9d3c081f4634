//! Bounded busy-wait in front of every storage access.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use embedded_hal::delay::DelayNs;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::{STORAGE_MAX_RETRIES, STORAGE_RETRY_DELAY_MS};
use crate::storage::Storage;
use crate::{Error, Result};

/// Wraps a [`Storage`] so that each read and write first waits for the device to be
/// idle.
///
/// The busy signal is polled up to `max_retries` times, with a blocking delay after
/// each busy answer.  If the device is still busy after the last poll the access fails
/// with [`Error::StorageTimeout`] without being attempted.
pub struct RetryingStorage<S, D> {
    inner: S,
    delay: D,
    max_retries: u32,
    retry_delay_ms: u32,
}

impl<S: Storage, D: DelayNs> RetryingStorage<S, D> {
    /// Wrap `inner` with the default retry budget.
    pub fn new(inner: S, delay: D) -> Self {
        Self::with_retries(inner, delay, STORAGE_MAX_RETRIES, STORAGE_RETRY_DELAY_MS)
    }

    /// Wrap `inner` with a specific retry budget.
    ///
    /// Arguments:
    /// - `max_retries` - number of busy polls before giving up.  At least one poll is
    ///   always made.
    /// - `retry_delay_ms` - delay after each busy poll
    pub fn with_retries(inner: S, delay: D, max_retries: u32, retry_delay_ms: u32) -> Self {
        Self {
            inner,
            delay,
            max_retries: max_retries.max(1),
            retry_delay_ms,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn wait_ready(&mut self, timeout_ms: u32) -> Result<()> {
        for _ in 0..self.max_retries {
            if !self.inner.is_busy(timeout_ms)? {
                return Ok(());
            }
            trace!("Storage busy, waiting {}ms", self.retry_delay_ms);
            self.delay.delay_ms(self.retry_delay_ms);
        }
        warn!("Storage still busy after {} polls", self.max_retries);
        Err(Error::StorageTimeout)
    }
}

impl<S: Storage, D: DelayNs> Storage for RetryingStorage<S, D> {
    fn write(&mut self, address: u8, data: &[u8], timeout_ms: u32) -> Result<()> {
        self.wait_ready(timeout_ms)?;
        self.inner.write(address, data, timeout_ms)
    }

    fn read(&mut self, address: u8, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        self.wait_ready(timeout_ms)?;
        self.inner.read(address, buf, timeout_ms)
    }

    fn is_busy(&mut self, timeout_ms: u32) -> Result<bool> {
        self.inner.is_busy(timeout_ms)
    }

    fn size(&self) -> usize {
        self.inner.size()
    }
}
