//! Routing of hardware interrupts to handler objects.
//!
//! The table is populated during boot with a [`RegistryBuilder`], then frozen into an
//! [`InterruptRegistry`] which is handed to whatever wires up the interrupt vectors.
//! After freezing nothing can be added or removed, so lookups need no lock.
//!
//! ```rust,ignore
//! let mut builder = RegistryBuilder::<u16, (), 4>::new();
//! builder.register(EXTI10_PIN, &spi_rx_handler)?;
//! let registry = builder.freeze();
//!
//! // From the EXTI vector:
//! registry.dispatch(&pin, ());
//! ```

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::fmt::Debug;

use heapless::LinearMap;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{Error, Result};

/// Object able to handle an interrupt carrying an `E`.
pub trait InterruptHandler<E> {
    fn handle_interrupt(&self, event: E);
}

/// Boot-time builder for an [`InterruptRegistry`] with up to `N` entries.
///
/// Keys identify the interrupt source - a peripheral instance, or a GPIO pin.
pub struct RegistryBuilder<'a, K, E, const N: usize> {
    map: LinearMap<K, &'a dyn InterruptHandler<E>, N>,
}

impl<'a, K: Eq + Debug, E, const N: usize> RegistryBuilder<'a, K, E, N> {
    pub fn new() -> Self {
        Self {
            map: LinearMap::new(),
        }
    }

    /// Register `handler` for interrupts from `key`.
    ///
    /// Fails with [`Error::InvalidOperation`] if `key` already has a handler, and
    /// [`Error::BufferTooSmall`] if the table is full.
    pub fn register(&mut self, key: K, handler: &'a dyn InterruptHandler<E>) -> Result<()> {
        if self.map.contains_key(&key) {
            warn!("Interrupt handler already registered for {key:?}");
            return Err(Error::InvalidOperation);
        }
        debug!("Register interrupt handler for {key:?}");
        self.map
            .insert(key, handler)
            .map(|_| ())
            .map_err(|_| Error::BufferTooSmall)
    }

    /// Finish boot-time registration
    pub fn freeze(self) -> InterruptRegistry<'a, K, E, N> {
        debug!("Interrupt registry frozen with {} handlers", self.map.len());
        InterruptRegistry { map: self.map }
    }
}

impl<K: Eq + Debug, E, const N: usize> Default for RegistryBuilder<'_, K, E, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only interrupt routing table
pub struct InterruptRegistry<'a, K, E, const N: usize> {
    map: LinearMap<K, &'a dyn InterruptHandler<E>, N>,
}

impl<K: Eq + Debug, E, const N: usize> InterruptRegistry<'_, K, E, N> {
    /// Route `event` from `key` to its handler.  Returns false if no handler is
    /// registered for `key`.
    pub fn dispatch(&self, key: &K, event: E) -> bool {
        match self.map.get(key) {
            Some(handler) => {
                trace!("Calling interrupt handler for {key:?}");
                handler.handle_interrupt(event);
                true
            }
            None => {
                warn!("No interrupt handler registered for {key:?}");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
