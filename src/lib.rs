//! Control and data plane core for the vision add-on board.
//!
//! The board sits next to a camera and an FPGA image pipeline.  This crate contains
//! the parts of its firmware which move data and commands around, and which must be
//! right about ownership, concurrency and failure handling:
//!
//! - Interrupt-to-task handoff of DMA-received data, double-buffered, with a bounded
//!   queue between interrupt and task context.
//! - The two buffer allocators backing that handoff: a lock-guarded [`pool::BufferPool`]
//!   handing out opaque handles, and a round-robin [`pool::CyclicPool`].
//! - A binary command/response protocol served over TCP, which configures the camera,
//!   the FPGA pipeline, the strobe, network identity and calibration data.
//! - Segmented transfer of a captured frame to a remote host.
//! - Persistent network configuration, stored in a small EEPROM, with a factory reset
//!   path at boot.
//!
//! `no_std`.  Requires `alloc` for the async command server, which is enabled by the
//! default `async` feature.
//!
//! ## Architecture
//!
//! There are two execution contexts:
//! - **Interrupt context** - short, non-blocking.  Runs the completion handlers in
//!   [`handoff`], which only ever acquire buffers, enqueue messages without blocking
//!   and re-arm reception.
//! - **Task context** - may block on sockets, storage and delays.  Runs the
//!   [`command::CommandServer`], the [`forwarder::BlobForwarder`], the
//!   [`frame::FrameTransfer`] and the [`network::NetworkManager`].
//!
//! Data flows from a peripheral interrupt, through a handler in [`handoff`], over a
//! `heapless` SPSC queue, into a task which forwards each chunk to the host.  Commands
//! arrive on the [`command`] server, which calls into capability traits implemented by
//! the camera driver, the FPGA commander, the [`network::NetworkManager`], the
//! calibration [`storage`] and the [`frame::FrameTransfer`].
//!
//! Hardware and network stack access goes through traits, so every part of this crate
//! can be driven by in-memory doubles:
//! - [`handoff::RxPeripheral`] - DMA reception on a UART or SPI peripheral
//! - [`transport::Listener`], [`transport::Connector`], [`transport::Connection`] - the
//!   network stack's sockets
//! - [`storage::Storage`] - the EEPROM, with [`storage::At24c02d`] as the real driver
//! - [`network::NetInterface`] - the live network interface binding
//! - `embedded_hal` `I2c`, `InputPin` and `DelayNs` for the EEPROM bus, the restore
//!   button and blocking delays
//!
//! ## Modules
//!
//! - [`pool`] - buffer allocators
//! - [`handoff`] - interrupt handlers, interrupt registry, received data consumption
//! - [`forwarder`] - task which pushes received chunks to the host
//! - [`command`] - command packet codec, dispatch table and servers
//! - [`frame`] - segmented frame transfer
//! - [`network`] - network types and the configuration manager
//! - [`storage`] - storage trait, retrying access, EEPROM driver, in-memory store
//! - [`calibration`] - calibration matrices and their storage slots
//! - [`transport`] - socket traits
//! - [`config`] - ports, addresses, sizes, storage layout and factory defaults
//!
//! ## Features
//!
//! Default features:
//! - `async` - Enable the async command server and async transport traits (requires
//!   `alloc`).
//!
//! Optional features:
//! - `std` - Enable a [`transport`] implementation on `std::net`, and a `std`
//!   critical section implementation.  Useful for running the core on a host.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "async")]
extern crate alloc;

pub mod calibration;
pub mod command;
pub mod config;
pub mod forwarder;
pub mod frame;
pub mod handoff;
pub mod network;
pub mod pool;
pub mod storage;
pub mod transport;

/// Errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No free buffer in the pool
    PoolExhausted,
    /// Handoff queue full, message dropped
    QueueFull,
    /// Requested size exceeds the buffer size
    BufferTooSmall,
    /// Packet shorter than its header or declared payload
    Truncated,
    /// Payload length doesn't match what the command expects
    PayloadLength,
    /// Command id not in the dispatch table
    UnknownCommand,
    /// Payload field holds a value outside its allowed set
    InvalidValue,
    /// Payload too large for the packet data area
    PayloadTooLarge,
    /// Connect, read, write or close failed
    Transport,
    /// Fewer bytes written than requested
    ShortWrite,
    /// Storage stayed busy beyond the retry budget or timeout
    StorageTimeout,
    /// Storage backend reported a failure
    Storage,
    /// Storage access outside the address space
    AddressOutOfRange,
    /// Already in progress
    Busy,
    /// Operation not valid in the current state
    InvalidOperation,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Error::PoolExhausted => "buffer pool exhausted",
            Error::QueueFull => "queue full",
            Error::BufferTooSmall => "buffer too small",
            Error::Truncated => "packet truncated",
            Error::PayloadLength => "unexpected payload length",
            Error::UnknownCommand => "unknown command",
            Error::InvalidValue => "invalid value",
            Error::PayloadTooLarge => "payload too large",
            Error::Transport => "transport failure",
            Error::ShortWrite => "short write",
            Error::StorageTimeout => "storage timeout",
            Error::Storage => "storage failure",
            Error::AddressOutOfRange => "storage address out of range",
            Error::Busy => "busy",
            Error::InvalidOperation => "invalid operation",
        };
        f.write_str(s)
    }
}

/// Type to represent the result of an operation
pub type Result<T> = core::result::Result<T, Error>;

/// A task body, run repeatedly by its owning task.
///
/// Each call performs one unit of work, which may block.
pub trait Runnable {
    fn run(&mut self);
}
