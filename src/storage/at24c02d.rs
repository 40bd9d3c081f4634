//! AT24C02D 2Kbit I2C EEPROM driver.
//!
//! The device has 256 bytes, written in pages of 8.  A page write which crosses a page
//! boundary wraps within the page, so writes are split at page boundaries.  After each
//! page the device runs an internal write cycle of up to 5ms, during which it does not
//! acknowledge its address.  Busy checks therefore ACK-poll the device.
//!
//! Timeouts are counted in the 1ms waits made between busy polls.  Time spent on the
//! bus is not counted.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, Operation};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::STORAGE_SIZE;
use crate::storage::{Storage, check_range};
use crate::{Error, Result};

/// 7-bit I2C address with all address pins tied high, as fitted on the board
pub const DEFAULT_ADDRESS: u8 = 0x57;

/// Page write size
pub const PAGE_SIZE: usize = 8;

const POLL_INTERVAL_MS: u32 = 1;

/// AT24C02D on an `embedded_hal` I2C bus.
pub struct At24c02d<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> At24c02d<I2C, D> {
    /// Create a driver for a device at [`DEFAULT_ADDRESS`].
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    /// Create a driver for a device at a specific 7-bit address.
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        debug!("Created AT24C02D driver at I2C address {address:#04X}");
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Release the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    // Returns true if the device did not acknowledge
    fn poll(&mut self) -> Result<bool> {
        match self.i2c.write(self.address, &[]) {
            Ok(()) => Ok(false),
            Err(e) => match e.kind() {
                ErrorKind::NoAcknowledge(_) => Ok(true),
                kind => {
                    warn!("AT24C02D: ACK poll failed: {kind:?}");
                    Err(Error::Storage)
                }
            },
        }
    }

    fn wait_idle(&mut self, timeout_ms: u32, elapsed_ms: &mut u32) -> Result<()> {
        while self.poll()? {
            if *elapsed_ms >= timeout_ms {
                warn!("AT24C02D: timed out after {timeout_ms}ms waiting for device");
                return Err(Error::StorageTimeout);
            }
            trace!("AT24C02D: busy, waiting");
            self.delay.delay_ms(POLL_INTERVAL_MS);
            *elapsed_ms += POLL_INTERVAL_MS;
        }
        Ok(())
    }
}

impl<I2C: I2c, D: DelayNs> Storage for At24c02d<I2C, D> {
    fn write(&mut self, address: u8, data: &[u8], timeout_ms: u32) -> Result<()> {
        check_range(address, data.len(), STORAGE_SIZE)?;
        debug!("AT24C02D: writing {} bytes to {address:#04X}", data.len());

        let mut elapsed_ms = 0;
        let mut word_address = address as usize;
        let mut remaining = data;
        while !remaining.is_empty() {
            self.wait_idle(timeout_ms, &mut elapsed_ms)?;

            let in_page = PAGE_SIZE - (word_address % PAGE_SIZE);
            let (page, rest) = remaining.split_at(remaining.len().min(in_page));

            self.i2c
                .transaction(
                    self.address,
                    &mut [
                        Operation::Write(&[word_address as u8]),
                        Operation::Write(page),
                    ],
                )
                .map_err(|e| {
                    warn!("AT24C02D: page write failed: {:?}", e.kind());
                    Error::Storage
                })?;

            word_address += page.len();
            remaining = rest;
        }
        Ok(())
    }

    fn read(&mut self, address: u8, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        check_range(address, buf.len(), STORAGE_SIZE)?;
        debug!("AT24C02D: reading {} bytes from {address:#04X}", buf.len());

        let mut elapsed_ms = 0;
        self.wait_idle(timeout_ms, &mut elapsed_ms)?;
        self.i2c.write_read(self.address, &[address], buf).map_err(|e| {
            warn!("AT24C02D: read failed: {:?}", e.kind());
            Error::Storage
        })
    }

    /// A single ACK poll.  A poll is one short bus transaction, so `timeout_ms` is not
    /// needed.
    fn is_busy(&mut self, _timeout_ms: u32) -> Result<bool> {
        self.poll()
    }
}

#[cfg(test)]
mod test {
    use embedded_hal::i2c::{ErrorType, NoAcknowledgeSource};

    use super::*;
    use crate::storage::retry::test_support::NoDelay;

    /// Behavioural model of the EEPROM: word address pointer, page wrap and a write
    /// cycle during which the device NAKs.
    struct FakeEeprom {
        memory: [u8; 256],
        pointer: u8,
        busy_for: u32,
        write_cycle_polls: u32,
        page_writes: usize,
        bus_fault: bool,
    }

    impl FakeEeprom {
        fn new(write_cycle_polls: u32) -> Self {
            Self {
                memory: [0xFF; 256],
                pointer: 0,
                busy_for: 0,
                write_cycle_polls,
                page_writes: 0,
                bus_fault: false,
            }
        }

        fn store(&mut self, byte: u8) {
            self.memory[self.pointer as usize] = byte;
            let page = self.pointer & !(PAGE_SIZE as u8 - 1);
            self.pointer = page | (self.pointer.wrapping_add(1) & (PAGE_SIZE as u8 - 1));
        }
    }

    impl ErrorType for FakeEeprom {
        type Error = ErrorKind;
    }

    impl I2c for FakeEeprom {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> core::result::Result<(), Self::Error> {
            if self.bus_fault {
                return Err(ErrorKind::Bus);
            }
            if address != DEFAULT_ADDRESS || self.busy_for > 0 {
                self.busy_for = self.busy_for.saturating_sub(1);
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }

            let mut pointer_set = false;
            let mut wrote = false;
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        for byte in bytes.iter() {
                            if !pointer_set {
                                self.pointer = *byte;
                                pointer_set = true;
                            } else {
                                self.store(*byte);
                                wrote = true;
                            }
                        }
                    }
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.memory[self.pointer as usize];
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
            }
            if wrote {
                self.page_writes += 1;
                self.busy_for = self.write_cycle_polls;
            }
            Ok(())
        }
    }

    #[test]
    fn write_splits_at_page_boundaries() {
        let mut eeprom = At24c02d::new(FakeEeprom::new(0), NoDelay::default());
        let data: std::vec::Vec<u8> = (0..20).collect();

        // 0x45..0x59 touches pages 0x40, 0x48, 0x50 and 0x58
        eeprom.write(0x45, &data, 10).unwrap();
        let (fake, _) = eeprom.release();
        assert_eq!(fake.page_writes, 4);
        assert_eq!(&fake.memory[0x45..0x59], data.as_slice());
        assert_eq!(fake.memory[0x44], 0xFF);
        assert_eq!(fake.memory[0x59], 0xFF);
    }

    #[test]
    fn waits_out_the_write_cycle() {
        let mut eeprom = At24c02d::new(FakeEeprom::new(3), NoDelay::default());
        eeprom.write(0x40, &[1; 16], 200).unwrap();
        let mut buf = [0; 16];
        eeprom.read(0x40, &mut buf, 200).unwrap();
        assert_eq!(buf, [1; 16]);

        let (_, delay) = eeprom.release();
        // Two write cycles waited for, 3ms each
        assert_eq!(delay.total_ns, 6_000_000);
    }

    #[test]
    fn write_cycle_longer_than_timeout_fails() {
        let mut eeprom = At24c02d::new(FakeEeprom::new(20), NoDelay::default());
        assert_eq!(eeprom.write(0x00, &[0; 16], 10), Err(Error::StorageTimeout));

        let (fake, _) = eeprom.release();
        assert_eq!(fake.page_writes, 1);
    }

    #[test]
    fn busy_is_ack_poll() {
        let mut eeprom = At24c02d::new(FakeEeprom::new(1), NoDelay::default());
        assert_eq!(eeprom.is_busy(0), Ok(false));
        eeprom.write_u8(0x10, 5).unwrap();
        assert_eq!(eeprom.is_busy(0), Ok(true));
        assert_eq!(eeprom.is_busy(0), Ok(false));
    }

    #[test]
    fn bus_fault_is_storage_error() {
        let mut fake = FakeEeprom::new(0);
        fake.bus_fault = true;
        let mut eeprom = At24c02d::new(fake, NoDelay::default());
        assert_eq!(eeprom.read_u32(0x18), Err(Error::Storage));
        assert_eq!(eeprom.is_busy(0), Err(Error::Storage));
    }

    #[test]
    fn out_of_range_never_reaches_the_bus() {
        let mut fake = FakeEeprom::new(0);
        fake.bus_fault = true;
        let mut eeprom = At24c02d::new(fake, NoDelay::default());
        assert_eq!(eeprom.write(0xF8, &[0; 9], 10), Err(Error::AddressOutOfRange));
    }
}
