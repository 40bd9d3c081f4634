//! Command dispatch table.
//!
//! Each command has one entry - its id, the exact payload length it requires, and a
//! handler.  [`dispatch()`] checks the payload length before calling the handler, so
//! handlers can index their payload without further checks.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::calibration::{self, CalibrationItem};
use crate::command::{
    Capabilities, CommandId, CommandPacket, CompletionStatus, Fps, PipelineInput,
    PipelineOutput, log_level,
};
use crate::network::NetworkConfiguration;
use crate::{Error, Result};

/// Handles one command.
///
/// Arguments:
/// - `caps` - collaborators
/// - `payload` - request payload, already checked to be the expected length
/// - `reply` - reply packet, ids already set, for handlers which return data
pub type Handler = fn(caps: &mut Capabilities<'_>, payload: &[u8], reply: &mut CommandPacket) -> Result<()>;

/// A dispatch table entry
pub struct CommandEntry {
    pub id: CommandId,
    /// Exact payload length the command requires
    pub payload_len: usize,
    pub handler: Handler,
}

macro_rules! entry {
    ($id:ident, $len:expr, $handler:expr) => {
        CommandEntry {
            id: CommandId::$id,
            payload_len: $len,
            handler: $handler,
        }
    };
}

pub static COMMAND_TABLE: [CommandEntry; 25] = [
    entry!(LogSetLevel, 1, log_set_level),
    entry!(CameraRequestCapture, 0, |caps, _, _| caps.camera.request_capture()),
    entry!(CameraRequestTransfer, 0, camera_request_transfer),
    entry!(CameraSetWhitebalance, 6, camera_set_whitebalance),
    entry!(CameraSetExposure, 3, camera_set_exposure),
    entry!(CameraSetGain, 2, |caps, p, _| caps.camera.set_gain(p[0], p[1])),
    entry!(CameraSetFps, 1, |caps, p, _| caps.camera.set_fps(Fps::try_from(p[0])?)),
    entry!(NetworkGetConfig, 0, network_get_config),
    entry!(NetworkSetConfig, NetworkConfiguration::SIZE, network_set_config),
    entry!(NetworkPersistConfig, 0, |caps, _, _| caps.network.persist()),
    entry!(CalibrationLoadCameraMatrix, 0, |caps, _, reply| {
        calibration_load(caps, CalibrationItem::CameraMatrix, reply)
    }),
    entry!(CalibrationStoreCameraMatrix, CalibrationItem::CameraMatrix.size(), |caps, p, _| {
        calibration::store(caps.storage, CalibrationItem::CameraMatrix, p)
    }),
    entry!(CalibrationLoadDistortionCoefficients, 0, |caps, _, reply| {
        calibration_load(caps, CalibrationItem::DistortionCoefficients, reply)
    }),
    entry!(
        CalibrationStoreDistortionCoefficients,
        CalibrationItem::DistortionCoefficients.size(),
        |caps, p, _| calibration::store(caps.storage, CalibrationItem::DistortionCoefficients, p)
    ),
    entry!(CalibrationLoadRotationMatrix, 0, |caps, _, reply| {
        calibration_load(caps, CalibrationItem::RotationMatrix, reply)
    }),
    entry!(CalibrationStoreRotationMatrix, CalibrationItem::RotationMatrix.size(), |caps, p, _| {
        calibration::store(caps.storage, CalibrationItem::RotationMatrix, p)
    }),
    entry!(CalibrationLoadTranslationVector, 0, |caps, _, reply| {
        calibration_load(caps, CalibrationItem::TranslationVector, reply)
    }),
    entry!(
        CalibrationStoreTranslationVector,
        CalibrationItem::TranslationVector.size(),
        |caps, p, _| calibration::store(caps.storage, CalibrationItem::TranslationVector, p)
    ),
    entry!(PipelineSetInput, 1, |caps, p, _| {
        caps.pipeline.set_input(PipelineInput::try_from(p[0])?)
    }),
    entry!(PipelineSetOutput, 1, |caps, p, _| {
        caps.pipeline.set_output(PipelineOutput::try_from(p[0])?)
    }),
    entry!(PipelineSetBinarizationThreshold, 1, |caps, p, _| {
        caps.pipeline.set_binarization_threshold(p[0])
    }),
    entry!(StrobeEnablePulse, 1, |caps, p, _| caps.pipeline.enable_strobe_pulse(p[0] != 0)),
    entry!(StrobeSetOnDelay, 4, |caps, p, _| caps.pipeline.set_strobe_on_delay(le_u32(p))),
    entry!(StrobeSetHoldTime, 4, |caps, p, _| caps.pipeline.set_strobe_hold_time(le_u32(p))),
    entry!(StrobeEnableConstant, 1, |caps, p, _| {
        caps.pipeline.enable_strobe_constant(p[0] != 0)
    }),
];

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn log_set_level(_caps: &mut Capabilities<'_>, payload: &[u8], _reply: &mut CommandPacket) -> Result<()> {
    let level = log_level(payload[0]).inspect_err(|_| warn!("Invalid log level {}", payload[0]))?;
    log::set_max_level(level);
    info!("Log level set to {level}");
    Ok(())
}

fn camera_request_transfer(
    caps: &mut Capabilities<'_>,
    _payload: &[u8],
    _reply: &mut CommandPacket,
) -> Result<()> {
    let target = caps.frame_target;
    caps.frames.request_transfer(target)
}

fn camera_set_whitebalance(
    caps: &mut Capabilities<'_>,
    payload: &[u8],
    _reply: &mut CommandPacket,
) -> Result<()> {
    let (red, green, blue) = (le_u16(&payload[0..]), le_u16(&payload[2..]), le_u16(&payload[4..]));
    info!("Manual white balance: ({red},{green},{blue})");
    caps.camera.set_whitebalance(red, green, blue)
}

fn camera_set_exposure(
    caps: &mut Capabilities<'_>,
    payload: &[u8],
    _reply: &mut CommandPacket,
) -> Result<()> {
    let integer = le_u16(payload);
    let fraction = payload[2];
    info!("Exposure: {integer} + {fraction}/16");
    caps.camera.set_exposure(integer, fraction)
}

fn network_get_config(
    caps: &mut Capabilities<'_>,
    _payload: &[u8],
    reply: &mut CommandPacket,
) -> Result<()> {
    reply.set_data(&caps.network.configuration().to_bytes())
}

fn network_set_config(
    caps: &mut Capabilities<'_>,
    payload: &[u8],
    _reply: &mut CommandPacket,
) -> Result<()> {
    let config = NetworkConfiguration::from_bytes(payload)?;
    caps.network.apply(&config);
    Ok(())
}

fn calibration_load(
    caps: &mut Capabilities<'_>,
    item: CalibrationItem,
    reply: &mut CommandPacket,
) -> Result<()> {
    let storage = &mut *caps.storage;
    reply.fill_data(item.size(), |dst| calibration::load(storage, item, dst).map(|_| ()))
}

/// Find the table entry for a command id.
pub fn lookup(command_id: u8) -> Option<&'static CommandEntry> {
    COMMAND_TABLE
        .iter()
        .find(|entry| u8::from(entry.id) == command_id)
}

/// Run a decoded request and build the reply.
///
/// The reply echoes the request and command ids.  Its completion status is
/// [`CompletionStatus::Success`] if the handler succeeded, and
/// [`CompletionStatus::Failure`] if the command is unknown, the payload length is
/// wrong (the handler is not called) or the handler failed.
pub fn dispatch(caps: &mut Capabilities<'_>, request: &CommandPacket) -> CommandPacket {
    let mut reply = CommandPacket::reply_to(request);
    let result = run(caps, request, &mut reply);
    if let Err(e) = result {
        debug!("Command {:#04X} failed: {e}", request.command_id());
        // Never return a partial payload with a failure
        reply = CommandPacket::reply_to(request);
        reply.set_completion_status(CompletionStatus::Failure);
    } else {
        reply.set_completion_status(CompletionStatus::Success);
    }
    reply
}

fn run(caps: &mut Capabilities<'_>, request: &CommandPacket, reply: &mut CommandPacket) -> Result<()> {
    let Some(entry) = lookup(request.command_id()) else {
        warn!("Command {:#04X} not supported", request.command_id());
        return Err(Error::UnknownCommand);
    };

    if request.data_size() != entry.payload_len {
        warn!(
            "{:?}: abort, expected {} byte payload, got {}",
            entry.id,
            entry.payload_len,
            request.data_size()
        );
        return Err(Error::PayloadLength);
    }

    debug!("Dispatching {:?}", entry.id);
    (entry.handler)(caps, request.data(), reply)
}
