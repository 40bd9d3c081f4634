//! Network identity - addresses, the live interface binding and the configuration
//! manager.
//!
//! The board's network configuration exists in two places:
//! - the live binding in the network stack, reached through [`NetInterface`],
//! - the persisted copy in storage, at fixed offsets (see [`crate::config::layout`]).
//!
//! [`NetworkManager`] moves configuration between the two, and handles the factory
//! restore button at boot.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod manager;

pub use manager::{NetworkManager, load_mac_from_storage};

use core::fmt;
use core::net::Ipv4Addr;

use crate::{Error, Result};

/// 48-bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const SIZE: usize = 6;

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Pack into the low 48 bits of a u64, first octet most significant.
    pub fn to_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, octet| (acc << 8) | *octet as u64)
    }

    /// Unpack from the low 48 bits of a u64.  The top 16 bits are ignored.
    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let mut octets = [0; 6];
        octets.copy_from_slice(&bytes[2..]);
        Self(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Complete network configuration.
///
/// On the wire it is 18 bytes - MAC, IP, netmask, gateway - each in network order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfiguration {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl NetworkConfiguration {
    /// Wire size in bytes
    pub const SIZE: usize = 18;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0; Self::SIZE];
        bytes[0..6].copy_from_slice(&self.mac.octets());
        bytes[6..10].copy_from_slice(&self.ip.octets());
        bytes[10..14].copy_from_slice(&self.netmask.octets());
        bytes[14..18].copy_from_slice(&self.gateway.octets());
        bytes
    }

    /// Parse from exactly [`Self::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(Error::PayloadLength);
        }
        let ipv4 = |at: usize| Ipv4Addr::new(bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]);
        let mut mac = [0; 6];
        mac.copy_from_slice(&bytes[0..6]);
        Ok(Self {
            mac: MacAddress::new(mac),
            ip: ipv4(6),
            netmask: ipv4(10),
            gateway: ipv4(14),
        })
    }
}

/// The network stack's live interface binding.
///
/// Setters take effect immediately.  Getters read back from the stack, which is the
/// source of truth while running.
pub trait NetInterface {
    fn ip(&self) -> Ipv4Addr;
    fn set_ip(&mut self, ip: Ipv4Addr);
    fn netmask(&self) -> Ipv4Addr;
    fn set_netmask(&mut self, netmask: Ipv4Addr);
    fn gateway(&self) -> Ipv4Addr;
    fn set_gateway(&mut self, gateway: Ipv4Addr);
}

impl<N: NetInterface + ?Sized> NetInterface for &mut N {
    fn ip(&self) -> Ipv4Addr {
        (**self).ip()
    }

    fn set_ip(&mut self, ip: Ipv4Addr) {
        (**self).set_ip(ip)
    }

    fn netmask(&self) -> Ipv4Addr {
        (**self).netmask()
    }

    fn set_netmask(&mut self, netmask: Ipv4Addr) {
        (**self).set_netmask(netmask)
    }

    fn gateway(&self) -> Ipv4Addr {
        (**self).gateway()
    }

    fn set_gateway(&mut self, gateway: Ipv4Addr) {
        (**self).set_gateway(gateway)
    }
}
