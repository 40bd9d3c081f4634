//! Byte-addressed nonvolatile storage.
//!
//! The board's store is a 256 byte AT24C02D EEPROM on I2C ([`At24c02d`]).  Anything
//! implementing [`Storage`] can stand in for it - [`MemoryStorage`] is used in tests.
//!
//! Writes to an EEPROM leave it busy for a few milliseconds.  Wrap a backend in
//! [`RetryingStorage`] to poll the busy signal, with a bounded number of retries,
//! before each access.
//!
//! Multi-byte values are stored little-endian.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod at24c02d;
pub mod memory;
pub mod retry;
pub mod shared;

pub use at24c02d::At24c02d;
pub use memory::MemoryStorage;
pub use retry::RetryingStorage;
pub use shared::SharedStorage;

use crate::config::{STORAGE_DEFAULT_TIMEOUT_MS, STORAGE_SIZE};
use crate::{Error, Result};

/// Check that `len` bytes at `address` fit within a store of `size` bytes.
pub(crate) fn check_range(address: u8, len: usize, size: usize) -> Result<()> {
    if address as usize + len > size {
        return Err(Error::AddressOutOfRange);
    }
    Ok(())
}

/// A byte-addressed store.
///
/// Timeouts are in milliseconds and bound how long a single call may wait on the
/// device.  Every call either completes within its timeout or fails.
pub trait Storage {
    /// Write `data` starting at `address`.
    fn write(&mut self, address: u8, data: &[u8], timeout_ms: u32) -> Result<()>;

    /// Fill `buf` from `address` onwards.
    fn read(&mut self, address: u8, buf: &mut [u8], timeout_ms: u32) -> Result<()>;

    /// Whether the device is still busy, for example completing a previous write.
    ///
    /// An `Err` means the device could not be queried.
    fn is_busy(&mut self, timeout_ms: u32) -> Result<bool>;

    /// Size of the store in bytes
    fn size(&self) -> usize {
        STORAGE_SIZE
    }

    fn write_u8(&mut self, address: u8, value: u8) -> Result<()> {
        self.write(address, &[value], STORAGE_DEFAULT_TIMEOUT_MS)
    }

    fn write_u32(&mut self, address: u8, value: u32) -> Result<()> {
        self.write(address, &value.to_le_bytes(), STORAGE_DEFAULT_TIMEOUT_MS)
    }

    fn write_u64(&mut self, address: u8, value: u64) -> Result<()> {
        self.write(address, &value.to_le_bytes(), STORAGE_DEFAULT_TIMEOUT_MS)
    }

    fn read_u8(&mut self, address: u8) -> Result<u8> {
        let mut buf = [0; 1];
        self.read(address, &mut buf, STORAGE_DEFAULT_TIMEOUT_MS)?;
        Ok(buf[0])
    }

    fn read_u32(&mut self, address: u8) -> Result<u32> {
        let mut buf = [0; 4];
        self.read(address, &mut buf, STORAGE_DEFAULT_TIMEOUT_MS)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self, address: u8) -> Result<u64> {
        let mut buf = [0; 8];
        self.read(address, &mut buf, STORAGE_DEFAULT_TIMEOUT_MS)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn write(&mut self, address: u8, data: &[u8], timeout_ms: u32) -> Result<()> {
        (**self).write(address, data, timeout_ms)
    }

    fn read(&mut self, address: u8, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        (**self).read(address, buf, timeout_ms)
    }

    fn is_busy(&mut self, timeout_ms: u32) -> Result<bool> {
        (**self).is_busy(timeout_ms)
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}
