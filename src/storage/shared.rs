//! One storage backend, several users.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::cell::RefCell;

use crate::Result;
use crate::storage::Storage;

/// A [`Storage`] handle onto a backend shared through a `RefCell`.
///
/// The network manager and the calibration commands use the same EEPROM.  Both run in
/// the command server task, so each gets a `SharedStorage` over the same cell.  Each
/// access borrows the backend only for the duration of the call.
pub struct SharedStorage<'a, S> {
    cell: &'a RefCell<S>,
}

impl<S> Clone for SharedStorage<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for SharedStorage<'_, S> {}

impl<'a, S: Storage> SharedStorage<'a, S> {
    pub fn new(cell: &'a RefCell<S>) -> Self {
        Self { cell }
    }
}

impl<S: Storage> Storage for SharedStorage<'_, S> {
    fn write(&mut self, address: u8, data: &[u8], timeout_ms: u32) -> Result<()> {
        self.cell.borrow_mut().write(address, data, timeout_ms)
    }

    fn read(&mut self, address: u8, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        self.cell.borrow_mut().read(address, buf, timeout_ms)
    }

    fn is_busy(&mut self, timeout_ms: u32) -> Result<bool> {
        self.cell.borrow_mut().is_busy(timeout_ms)
    }

    fn size(&self) -> usize {
        self.cell.borrow().size()
    }
}
