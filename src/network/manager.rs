//! Network configuration manager.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, InputPin};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::command::NetworkControl;
use crate::config::{FACTORY_DEFAULTS, RESTORE_DEBOUNCE_MS, layout};
use crate::network::{MacAddress, NetInterface, NetworkConfiguration};
use crate::storage::Storage;
use crate::{Error, Result};

/// Read the persisted MAC address on its own.
///
/// Used during bring-up, before the network interface exists - the stack needs its
/// hardware address before it can be started.
pub fn load_mac_from_storage<S: Storage + ?Sized>(storage: &mut S) -> Result<MacAddress> {
    storage
        .read_u64(layout::MAC)
        .map(MacAddress::from_u64)
        .inspect_err(|e| warn!("Loading MAC from storage failed: {e}"))
}

/// Owns the live network configuration and its persisted copy.
///
/// IP, netmask and gateway changes are applied to the live interface immediately, and
/// read back from it.  The MAC cannot be changed while the stack runs, so MAC changes
/// are held as pending until persisted, and take effect on the next boot.
///
/// Persisting and loading access each of the four fields separately.  A failure on one
/// field does not stop the others, and does not undo anything already applied.
pub struct NetworkManager<N, S> {
    interface: N,
    storage: S,
    pending_mac: MacAddress,
}

impl<N: NetInterface, S: Storage> NetworkManager<N, S> {
    /// Create a manager.  Call [`Self::init()`] at boot before use.
    ///
    /// Arguments:
    /// - `interface` - the live network interface
    /// - `storage` - persistent store, normally a
    ///   [`crate::storage::RetryingStorage`]
    /// - `mac` - the MAC the interface was brought up with
    pub fn new(interface: N, storage: S, mac: MacAddress) -> Self {
        Self {
            interface,
            storage,
            pending_mac: mac,
        }
    }

    /// Boot-time configuration.
    ///
    /// If the restore button (active low) is held, both before and after a short
    /// debounce delay, factory defaults are applied and persisted.  Otherwise the
    /// persisted configuration is loaded.
    ///
    /// A failure is logged, and returned for information.  The manager is usable
    /// either way.
    pub fn init<B: InputPin, D: DelayNs>(&mut self, button: &mut B, delay: &mut D) -> Result<()> {
        let pressed_before = Self::pressed(button);
        delay.delay_ms(RESTORE_DEBOUNCE_MS);
        let pressed_after = Self::pressed(button);

        if pressed_before && pressed_after {
            info!("Restore button held, restoring default network configuration");
            self.apply(&FACTORY_DEFAULTS);
            self.persist_to_storage()
                .inspect_err(|_| warn!("Persisting default network configuration failed"))
        } else {
            self.load_from_storage()
        }
    }

    fn pressed<B: InputPin>(button: &mut B) -> bool {
        button.is_low().unwrap_or_else(|e| {
            warn!("Reading restore button failed: {:?}", e.kind());
            false
        })
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.interface.ip()
    }

    pub fn set_ip(&mut self, ip: Ipv4Addr) {
        info!("Set IP to {ip}");
        self.interface.set_ip(ip);
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.interface.netmask()
    }

    pub fn set_netmask(&mut self, netmask: Ipv4Addr) {
        info!("Set netmask to {netmask}");
        self.interface.set_netmask(netmask);
    }

    pub fn gateway(&self) -> Ipv4Addr {
        self.interface.gateway()
    }

    pub fn set_gateway(&mut self, gateway: Ipv4Addr) {
        info!("Set gateway to {gateway}");
        self.interface.set_gateway(gateway);
    }

    /// The MAC which will be persisted, and so used after the next reboot
    pub fn mac(&self) -> MacAddress {
        self.pending_mac
    }

    pub fn set_mac(&mut self, mac: MacAddress) {
        self.pending_mac = mac;
        info!("MAC after next reboot: {mac} (must be persisted to take effect)");
    }

    /// Current configuration - the live addresses and the pending MAC
    pub fn configuration(&self) -> NetworkConfiguration {
        NetworkConfiguration {
            mac: self.mac(),
            ip: self.ip(),
            netmask: self.netmask(),
            gateway: self.gateway(),
        }
    }

    /// Apply a whole configuration.  Addresses go live, the MAC is pending.
    pub fn apply(&mut self, config: &NetworkConfiguration) {
        self.set_mac(config.mac);
        self.set_ip(config.ip);
        self.set_netmask(config.netmask);
        self.set_gateway(config.gateway);
    }

    /// Write the current configuration to storage.
    ///
    /// All four fields are attempted.  Returns the first failure, if any.
    pub fn persist_to_storage(&mut self) -> Result<()> {
        let config = self.configuration();
        info!(
            "Persisting network configuration: MAC {} IP {} netmask {} gateway {}",
            config.mac, config.ip, config.netmask, config.gateway
        );

        let results = [
            self.storage.write_u64(layout::MAC, config.mac.to_u64()),
            self.storage.write_u32(layout::IP, u32::from(config.ip)),
            self.storage.write_u32(layout::NETMASK, u32::from(config.netmask)),
            self.storage.write_u32(layout::GATEWAY, u32::from(config.gateway)),
        ];
        Self::combine(&results, "Persisting")
    }

    /// Load the persisted configuration, applying each field which reads
    /// successfully.
    ///
    /// All four fields are attempted.  Returns the first failure, if any.
    pub fn load_from_storage(&mut self) -> Result<()> {
        info!("Loading network configuration");

        let mac = self.storage.read_u64(layout::MAC);
        let ip = self.storage.read_u32(layout::IP);
        let netmask = self.storage.read_u32(layout::NETMASK);
        let gateway = self.storage.read_u32(layout::GATEWAY);

        if let Ok(raw) = mac {
            self.set_mac(MacAddress::from_u64(raw));
        }
        if let Ok(raw) = ip {
            self.set_ip(Ipv4Addr::from(raw));
        }
        if let Ok(raw) = netmask {
            self.set_netmask(Ipv4Addr::from(raw));
        }
        if let Ok(raw) = gateway {
            self.set_gateway(Ipv4Addr::from(raw));
        }

        let results = [
            mac.map(|_| ()),
            ip.map(|_| ()),
            netmask.map(|_| ()),
            gateway.map(|_| ()),
        ];
        let result = Self::combine(&results, "Loading");
        if result.is_err() {
            warn!("Loading network configuration failed");
        }
        result
    }

    fn combine(results: &[Result<()>; 4], action: &str) -> Result<()> {
        const FIELDS: [&str; 4] = ["MAC", "IP", "netmask", "gateway"];

        let mut first: Option<Error> = None;
        for (field, result) in FIELDS.iter().zip(results) {
            if let Err(e) = result {
                warn!("{action} {field} failed: {e}");
                first.get_or_insert(*e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn interface(&self) -> &N {
        &self.interface
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

impl<N: NetInterface, S: Storage> NetworkControl for NetworkManager<N, S> {
    fn configuration(&self) -> NetworkConfiguration {
        NetworkManager::configuration(self)
    }

    fn apply(&mut self, config: &NetworkConfiguration) {
        NetworkManager::apply(self, config)
    }

    fn persist(&mut self) -> Result<()> {
        self.persist_to_storage()
    }
}
