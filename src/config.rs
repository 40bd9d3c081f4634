//! Board configuration - ports, addresses, sizes, storage layout and factory defaults.
//!
//! Everything here is fixed at compile time.  Constructors which need one of these
//! values take it as an argument, so tests can use smaller geometry, but firmware is
//! expected to pass these constants.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::net::{Ipv4Addr, SocketAddrV4};

use crate::network::{MacAddress, NetworkConfiguration};
use crate::transport::Protocol;

// Network endpoints

/// Host receiving frames, blobs and log output
pub const HOST_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// Port the command server listens on
pub const PORT_COMMAND: u16 = 80;

/// Host port frames are sent to
pub const PORT_FRAME_TRANSFER: u16 = 1055;

/// Host port received blobs are forwarded to
pub const PORT_BLOB: u16 = 1056;

/// Host port reserved for log output
pub const PORT_LOG: u16 = 1057;

/// Frame transfer destination
pub const FRAME_TARGET: SocketAddrV4 = SocketAddrV4::new(HOST_ADDR, PORT_FRAME_TRANSFER);

/// Blob forwarding destination
pub const BLOB_TARGET: SocketAddrV4 = SocketAddrV4::new(HOST_ADDR, PORT_BLOB);

// Frame geometry

/// External SDRAM base, where the camera frame buffer lives
pub const EXTERNAL_SDRAM_BASE: usize = 0xC000_0000;

/// Frame width in pixels
pub const FRAME_WIDTH: usize = 1280;

/// Frame height in pixels
pub const FRAME_HEIGHT: usize = 800;

/// Frame size in bytes, one byte per pixel
pub const FRAME_SIZE: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Largest single write during a frame transfer
pub const MAX_SEGMENT_SIZE: usize = 1024;

// Receive path

/// Size of each DMA receive buffer
pub const RX_BUFFER_SIZE: usize = 1024;

/// Number of buffers in the UART receive pool
pub const RX_POOL_DEPTH: usize = 4;

/// Number of slots in the SPI cyclic pool.  Must exceed the number of buffers in
/// flight between handoff and consumption.
pub const RX_CYCLIC_DEPTH: usize = 2;

/// Capacity of the handoff queue storage.  `heapless` SPSC queues hold one fewer
/// element than their capacity, so this gives 10 messages.
pub const RX_QUEUE_CAPACITY: usize = 11;

// Command server

/// Receive buffer size for one request
pub const COMMAND_RECEIVE_BUFFER_SIZE: usize = 1024;

/// Reply buffer size for one response
pub const COMMAND_REPLY_BUFFER_SIZE: usize = 1024;

// Storage

/// Size of the nonvolatile store
pub const STORAGE_SIZE: usize = 256;

/// Timeout used by the typed storage helpers
pub const STORAGE_DEFAULT_TIMEOUT_MS: u32 = 10;

/// Timeout used when storing calibration data
pub const STORAGE_CALIBRATION_WRITE_TIMEOUT_MS: u32 = 200;

/// Number of busy polls before storage access gives up
pub const STORAGE_MAX_RETRIES: u32 = 5;

/// Delay between busy polls
pub const STORAGE_RETRY_DELAY_MS: u32 = 1;

/// Storage offsets, each slot sized for its item
pub mod layout {
    /// MAC address, stored as a u64 (8 bytes)
    pub const MAC: u8 = 0x10;
    /// IPv4 address, stored as a u32
    pub const IP: u8 = 0x18;
    /// Netmask, stored as a u32
    pub const NETMASK: u8 = 0x20;
    /// Gateway, stored as a u32
    pub const GATEWAY: u8 = 0x28;
    /// 3x3 camera matrix, 36 bytes
    pub const CAMERA_MATRIX: u8 = 0x40;
    /// 1x5 distortion coefficients, 20 bytes
    pub const DISTORTION_COEFFICIENTS: u8 = 0x70;
    /// 3x3 rotation matrix, 36 bytes
    pub const ROTATION_MATRIX: u8 = 0x90;
    /// 1x3 translation vector, 12 bytes
    pub const TRANSLATION_VECTOR: u8 = 0xC0;
}

// Network manager

/// Restore button debounce delay
pub const RESTORE_DEBOUNCE_MS: u32 = 5;

/// Configuration applied when the restore button is held at boot.  The MAC only takes
/// effect after the next reboot.
pub const FACTORY_DEFAULTS: NetworkConfiguration = NetworkConfiguration {
    mac: MacAddress::new([0x00, 0x80, 0xE1, 0x00, 0x00, 0x00]),
    ip: Ipv4Addr::new(10, 0, 0, 1),
    netmask: Ipv4Addr::new(255, 255, 255, 0),
    gateway: Ipv4Addr::new(10, 0, 0, 1),
};

/// [`crate::forwarder::BlobForwarder`] settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// Protocol each chunk is sent with
    pub protocol: Protocol,
    /// Where chunks are sent
    pub target: SocketAddrV4,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Udp,
            target: BLOB_TARGET,
        }
    }
}

/// [`crate::frame::FrameTransfer`] settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTransferConfig {
    /// Largest single write
    pub segment_size: usize,
}

impl Default for FrameTransferConfig {
    fn default() -> Self {
        Self {
            segment_size: MAX_SEGMENT_SIZE,
        }
    }
}
