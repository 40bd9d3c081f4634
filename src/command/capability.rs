//! What commands act on.
//!
//! Each collaborator the command server drives is reached through a trait, and all of
//! them are handed to the server together in a [`Capabilities`].  Every field is
//! required, so a server cannot be built with a collaborator missing.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::net::SocketAddrV4;

use crate::Result;
use crate::command::{Fps, PipelineInput, PipelineOutput};
use crate::network::NetworkConfiguration;
use crate::storage::Storage;

/// Camera sensor control
pub trait Camera {
    /// Capture a frame into the frame buffer
    fn request_capture(&mut self) -> Result<()>;

    /// Manual white balance gains
    fn set_whitebalance(&mut self, red: u16, green: u16, blue: u16) -> Result<()>;

    /// Exposure of `integer` + `fraction`/16 lines
    fn set_exposure(&mut self, integer: u16, fraction: u8) -> Result<()>;

    fn set_gain(&mut self, level: u8, band: u8) -> Result<()>;

    fn set_fps(&mut self, fps: Fps) -> Result<()>;
}

/// FPGA image pipeline and strobe control
pub trait Pipeline {
    fn set_input(&mut self, input: PipelineInput) -> Result<()>;

    fn set_output(&mut self, output: PipelineOutput) -> Result<()>;

    fn set_binarization_threshold(&mut self, threshold: u8) -> Result<()>;

    fn enable_strobe_pulse(&mut self, enable: bool) -> Result<()>;

    /// Delay from frame start to strobe on, in pixel clock cycles
    fn set_strobe_on_delay(&mut self, cycles: u32) -> Result<()>;

    /// Strobe on time, in pixel clock cycles
    fn set_strobe_hold_time(&mut self, cycles: u32) -> Result<()>;

    fn enable_strobe_constant(&mut self, enable: bool) -> Result<()>;
}

/// Network configuration control.  Implemented by
/// [`crate::network::NetworkManager`].
pub trait NetworkControl {
    /// Live addresses and pending MAC
    fn configuration(&self) -> NetworkConfiguration;

    /// Apply addresses immediately and set the pending MAC
    fn apply(&mut self, config: &NetworkConfiguration);

    /// Persist the current configuration
    fn persist(&mut self) -> Result<()>;
}

/// Sending the captured frame to a host.  Implemented by
/// [`crate::frame::FrameTransfer`].
pub trait FrameRequest {
    /// Send the whole frame to `remote`, blocking until done.
    fn request_transfer(&mut self, remote: SocketAddrV4) -> Result<()>;
}

/// Everything a command can act on
pub struct Capabilities<'a> {
    pub camera: &'a mut dyn Camera,
    pub pipeline: &'a mut dyn Pipeline,
    pub network: &'a mut dyn NetworkControl,
    /// Calibration data store
    pub storage: &'a mut dyn Storage,
    pub frames: &'a mut dyn FrameRequest,
    /// Where [`FrameRequest::request_transfer()`] sends frames
    pub frame_target: SocketAddrV4,
}
