//! In-memory [`Storage`], with fault injection.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::STORAGE_SIZE;
use crate::storage::{Storage, check_range};
use crate::{Error, Result};

/// RAM-backed store of [`STORAGE_SIZE`] bytes.
///
/// Starts erased (all `0xFF`), like a new EEPROM.  Faults can be injected to exercise
/// caller error handling:
/// - [`Self::set_busy_polls()`] - report busy for the next N polls
/// - [`Self::fail_at()`] - fail any access touching an address
/// - [`Self::set_broken()`] - fail every access, including busy polls
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    data: [u8; STORAGE_SIZE],
    busy_polls: u32,
    fail_address: Option<u8>,
    broken: bool,
    writes: u32,
    reads: u32,
    polls: u32,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: [0xFF; STORAGE_SIZE],
            busy_polls: 0,
            fail_address: None,
            broken: false,
            writes: 0,
            reads: 0,
            polls: 0,
        }
    }

    /// Report busy for the next `polls` calls to [`Storage::is_busy()`].
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Fail reads and writes which include `address`.  `None` clears the fault.
    pub fn fail_at(&mut self, address: Option<u8>) {
        self.fail_address = address;
    }

    /// Fail every access.
    pub fn set_broken(&mut self, broken: bool) {
        self.broken = broken;
    }

    /// Raw contents
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Number of successful writes
    pub fn writes(&self) -> u32 {
        self.writes
    }

    /// Number of successful reads
    pub fn reads(&self) -> u32 {
        self.reads
    }

    /// Number of busy polls, successful or not
    pub fn polls(&self) -> u32 {
        self.polls
    }

    fn check(&self, address: u8, len: usize) -> Result<()> {
        check_range(address, len, STORAGE_SIZE)?;
        if self.broken {
            return Err(Error::Storage);
        }
        if let Some(fail) = self.fail_address {
            let start = address as usize;
            if (start..start + len).contains(&(fail as usize)) {
                debug!("Memory storage: injected failure at {fail:#04X}");
                return Err(Error::Storage);
            }
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn write(&mut self, address: u8, data: &[u8], _timeout_ms: u32) -> Result<()> {
        self.check(address, data.len())?;
        let start = address as usize;
        self.data[start..start + data.len()].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn read(&mut self, address: u8, buf: &mut [u8], _timeout_ms: u32) -> Result<()> {
        self.check(address, buf.len())?;
        let start = address as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        self.reads += 1;
        Ok(())
    }

    fn is_busy(&mut self, _timeout_ms: u32) -> Result<bool> {
        self.polls += 1;
        if self.broken {
            return Err(Error::Storage);
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return Ok(true);
        }
        Ok(false)
    }
}
