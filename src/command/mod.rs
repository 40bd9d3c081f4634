//! Binary command/response protocol.
//!
//! The host configures the board by sending one [`CommandPacket`] per TCP connection
//! to port 80.  The board replies with a packet echoing the request and command ids,
//! carrying a [`CompletionStatus`] and, for read-style commands, a payload.  Then the
//! connection is closed.
//!
//! ```text
//! offset  size  field
//! 0       1     request id (chosen by the host, echoed)
//! 1       1     command id
//! 2       1     completion status (ignored in requests)
//! 3       1     payload size, N
//! 4       N     payload
//! ```
//!
//! Multi-byte payload fields are little-endian.
//!
//! Commands are dispatched through a static table (see [`table`]) to capability
//! traits (see [`capability`]), which the camera driver, FPGA commander, network
//! manager, calibration storage and frame transfer implement.
//!
//! - [`CommandServer`] - blocking, one connection at a time
//! - [`AsyncCommandServer`] - the same over async transport traits (`async` feature)

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod capability;
#[cfg(feature = "async")]
pub mod futures;
pub mod packet;
pub mod server;
pub mod table;

pub use capability::{Camera, Capabilities, FrameRequest, NetworkControl, Pipeline};
#[cfg(feature = "async")]
pub use futures::AsyncCommandServer;
pub use packet::CommandPacket;
pub use server::{CommandServer, process};
pub use table::dispatch;

use log::LevelFilter;

use crate::Error;

/// Command ids
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    LogSetLevel = 0x10,
    CameraRequestCapture = 0x20,
    CameraRequestTransfer = 0x21,
    CameraSetWhitebalance = 0x22,
    CameraSetExposure = 0x23,
    CameraSetGain = 0x24,
    CameraSetFps = 0x25,
    NetworkGetConfig = 0x30,
    NetworkSetConfig = 0x31,
    NetworkPersistConfig = 0x32,
    CalibrationLoadCameraMatrix = 0x40,
    CalibrationStoreCameraMatrix = 0x41,
    CalibrationLoadDistortionCoefficients = 0x42,
    CalibrationStoreDistortionCoefficients = 0x43,
    CalibrationLoadRotationMatrix = 0x44,
    CalibrationStoreRotationMatrix = 0x45,
    CalibrationLoadTranslationVector = 0x46,
    CalibrationStoreTranslationVector = 0x47,
    PipelineSetInput = 0x50,
    PipelineSetOutput = 0x51,
    PipelineSetBinarizationThreshold = 0x52,
    StrobeEnablePulse = 0x60,
    StrobeSetOnDelay = 0x61,
    StrobeSetHoldTime = 0x62,
    StrobeEnableConstant = 0x63,
}

impl CommandId {
    /// Placed in the command id of a reply to a request which could not be decoded
    pub const UNDEFINED: u8 = 0xFF;
}

impl From<CommandId> for u8 {
    fn from(id: CommandId) -> u8 {
        id as u8
    }
}

/// Result of a command, as carried in the reply
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Failure = 0x00,
    Success = 0x01,
    Undefined = 0xFF,
}

impl From<CompletionStatus> for u8 {
    fn from(status: CompletionStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for CompletionStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0x00 => Ok(CompletionStatus::Failure),
            0x01 => Ok(CompletionStatus::Success),
            0xFF => Ok(CompletionStatus::Undefined),
            _ => Err(Error::InvalidValue),
        }
    }
}

/// Camera frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fps {
    Fps13,
    Fps72,
}

impl TryFrom<u8> for Fps {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(Fps::Fps13),
            1 => Ok(Fps::Fps72),
            _ => Err(Error::InvalidValue),
        }
    }
}

/// Source of the images fed to the FPGA pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineInput {
    Camera,
    FakeStatic,
    FakeMoving,
}

impl TryFrom<u8> for PipelineInput {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(PipelineInput::Camera),
            1 => Ok(PipelineInput::FakeStatic),
            2 => Ok(PipelineInput::FakeMoving),
            _ => Err(Error::InvalidValue),
        }
    }
}

/// Image produced by the FPGA pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutput {
    Unprocessed,
    Binarized,
}

impl TryFrom<u8> for PipelineOutput {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(PipelineOutput::Unprocessed),
            1 => Ok(PipelineOutput::Binarized),
            _ => Err(Error::InvalidValue),
        }
    }
}

/// Map a log level byte, 0 (trace) to 4 (error), to a filter.
pub fn log_level(value: u8) -> Result<LevelFilter, Error> {
    match value {
        0 => Ok(LevelFilter::Trace),
        1 => Ok(LevelFilter::Debug),
        2 => Ok(LevelFilter::Info),
        3 => Ok(LevelFilter::Warn),
        4 => Ok(LevelFilter::Error),
        _ => Err(Error::InvalidValue),
    }
}
