//! Interrupt-to-task handoff of DMA-received data.
//!
//! Each receive handler owns one peripheral and keeps at most one reception in
//! flight.  When the peripheral signals completion the handler, running in interrupt
//! context:
//! 1. stops the reception and works out how many bytes arrived,
//! 2. wraps the buffer and byte count in an [`IsrMessage`],
//! 3. enqueues it on a bounded `heapless` SPSC queue without blocking - if the queue
//!    is full the message is dropped and a warning logged,
//! 4. immediately re-arms reception into a fresh buffer.
//!
//! A task drains the queue and hands each message back to the handler through
//! [`RxSource::consume()`], which exposes the received bytes and returns the buffer.
//!
//! Two handlers are provided:
//! - [`UartRxHandler`] - UART receive-to-idle DMA, backed by a shared
//!   [`crate::pool::BufferPool`].  The byte count comes with the idle event.
//! - [`ExtiRxHandler`] - SPI DMA reception drained when an external (GPIO) interrupt
//!   fires, backed by its own [`crate::pool::CyclicPool`].  The byte count is the
//!   configured length minus the DMA controller's remaining count.
//!
//! Interrupt vectors reach handlers through an [`InterruptRegistry`], built once at
//! boot and read-only afterwards.
//!
//! The "transfer active" flag shared between task-context [`Transfer::start()`] and
//! the interrupt handler is a single atomic, claimed by compare-and-swap.  Handler
//! state is only touched inside short critical sections - never a blocking mutex.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod exti;
pub mod registry;
pub mod uart;

pub use exti::ExtiRxHandler;
pub use registry::{InterruptHandler, InterruptRegistry, RegistryBuilder};
pub use uart::{UartEvent, UartRxHandler};

use crate::Result;
use crate::pool::DmaRegion;

/// Message moved from interrupt context to task context.
///
/// Consumed exactly once, by passing it to [`RxSource::consume()`].
#[derive(Debug, PartialEq, Eq)]
pub struct IsrMessage<B> {
    /// Buffer the data was received into
    pub buffer: B,
    /// Number of valid bytes at the start of the buffer
    pub bytes_received: usize,
}

/// Receive handler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// No reception in flight - start failed, or never started
    Idle,
    /// Reception in flight
    Armed,
    /// Completion being handled
    Draining,
}

/// DMA-capable receive peripheral.
///
/// Implemented over the HAL for the real UART and SPI peripherals, and by in-memory
/// doubles in tests.
pub trait RxPeripheral {
    /// Start receiving into `region`.  The peripheral may write anywhere in the
    /// region until [`Self::disarm()`] is called or reception completes.
    fn arm(&mut self, region: DmaRegion) -> Result<()>;

    /// Stop any reception in progress
    fn disarm(&mut self) -> Result<()>;

    /// Bytes of the armed region which have not been written
    fn remaining(&mut self) -> usize;
}

/// A reception which can be started from task context and reports whether it is in
/// flight.
pub trait Transfer {
    fn is_active(&self) -> bool;

    /// Arm reception, unless already active.  Returns the resulting state.
    fn start(&self) -> TransferState;
}

/// Source of [`IsrMessage`]s, able to turn a message back into bytes.
pub trait RxSource {
    /// Buffer type carried by this source's messages
    type Buffer;

    /// Call `f` with the bytes received in `message`, then give the buffer back.
    ///
    /// `f` runs in task context, outside any critical section.
    fn consume(&self, message: IsrMessage<Self::Buffer>, f: &mut dyn FnMut(&[u8]));
}
