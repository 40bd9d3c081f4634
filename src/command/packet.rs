//! Command packet codec.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::command::{CommandId, CompletionStatus};
use crate::{Error, Result};

/// A header field - name, for diagnostics, byte offset and width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketField {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
}

impl PacketField {
    /// Offset of the first byte after this field
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }
}

pub const REQUEST_ID: PacketField = PacketField {
    name: "request id",
    offset: 0,
    width: 1,
};
pub const COMMAND_ID: PacketField = PacketField {
    name: "command id",
    offset: 1,
    width: 1,
};
pub const COMPLETION_STATUS: PacketField = PacketField {
    name: "completion status",
    offset: 2,
    width: 1,
};
pub const DATA_SIZE: PacketField = PacketField {
    name: "data size",
    offset: 3,
    width: 1,
};

/// Header fields, in wire order
pub const HEADER_FIELDS: [PacketField; 4] = [REQUEST_ID, COMMAND_ID, COMPLETION_STATUS, DATA_SIZE];

/// Size of the fixed header
pub const HEADER_SIZE: usize = DATA_SIZE.end();

/// Largest payload
pub const DATA_SIZE_MAX: usize = u8::MAX as usize;

/// Largest payload [`CommandPacket::decode()`] accepts, as a whole packet is limited
/// to [`DATA_SIZE_MAX`] bytes
pub const MAX_DECODED_DATA_SIZE: usize = DATA_SIZE_MAX - HEADER_SIZE;

/// A request or reply.
///
/// The payload lives in a fixed 255 byte area.  Only the first [`Self::data_size()`]
/// bytes are meaningful, and only those are encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandPacket {
    request_id: u8,
    command_id: u8,
    completion_status: u8,
    data_size: u8,
    data: [u8; DATA_SIZE_MAX],
}

impl CommandPacket {
    /// Create a packet with no payload and an undefined completion status.
    pub fn new(request_id: u8, command_id: u8) -> Self {
        Self {
            request_id,
            command_id,
            completion_status: CompletionStatus::Undefined.into(),
            data_size: 0,
            data: [0; DATA_SIZE_MAX],
        }
    }

    /// Start of a reply to `request` - ids echoed, no payload.
    pub fn reply_to(request: &CommandPacket) -> Self {
        Self::new(request.request_id, request.command_id)
    }

    /// Reply to a request which could not be decoded.
    pub fn decode_failure() -> Self {
        let mut packet = Self::new(0, CommandId::UNDEFINED);
        packet.set_completion_status(CompletionStatus::Failure);
        packet
    }

    pub fn request_id(&self) -> u8 {
        self.request_id
    }

    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    pub fn completion_status(&self) -> u8 {
        self.completion_status
    }

    pub fn set_completion_status(&mut self, status: CompletionStatus) {
        self.completion_status = status.into();
    }

    pub fn data_size(&self) -> usize {
        self.data_size as usize
    }

    /// The valid payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_size()]
    }

    /// Set the payload.  Fails, leaving the packet unchanged, if `data` is longer than
    /// [`DATA_SIZE_MAX`].
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        self.fill_data(data.len(), |dst| {
            dst.copy_from_slice(data);
            Ok(())
        })
    }

    /// Set a `len` byte payload, written in place by `f`.
    ///
    /// The payload size only changes if `f` succeeds.  Fails with
    /// [`Error::PayloadTooLarge`] if `len` exceeds [`DATA_SIZE_MAX`].
    pub fn fill_data<F>(&mut self, len: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        if len > DATA_SIZE_MAX {
            warn!("Payload of {len} bytes exceeds maximum {DATA_SIZE_MAX}");
            return Err(Error::PayloadTooLarge);
        }
        f(&mut self.data[..len])?;
        self.data_size = len as u8;
        Ok(())
    }

    /// Encoded size
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.data_size()
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.wire_size();
        if buf.len() < size {
            warn!(
                "Encode failed, buffer of {} bytes too small for {size}",
                buf.len()
            );
            return Err(Error::BufferTooSmall);
        }
        buf[REQUEST_ID.offset] = self.request_id;
        buf[COMMAND_ID.offset] = self.command_id;
        buf[COMPLETION_STATUS.offset] = self.completion_status;
        buf[DATA_SIZE.offset] = self.data_size;
        buf[HEADER_SIZE..size].copy_from_slice(self.data());
        Ok(size)
    }

    /// Decode a packet from the start of `bytes`.
    ///
    /// Input longer than [`DATA_SIZE_MAX`] is rejected with [`Error::PayloadTooLarge`],
    /// so the largest decodable payload is [`MAX_DECODED_DATA_SIZE`] bytes.  Each header
    /// field is then length-checked before it is read, then the declared payload.
    /// Exactly the declared payload is copied.  Bytes beyond it are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > DATA_SIZE_MAX {
            warn!(
                "Decode failed, {} bytes exceeds maximum {DATA_SIZE_MAX}",
                bytes.len()
            );
            return Err(Error::PayloadTooLarge);
        }

        for field in HEADER_FIELDS {
            if bytes.len() < field.end() {
                warn!("Decode failed at {}, {} bytes", field.name, bytes.len());
                return Err(Error::Truncated);
            }
        }

        let data_size = bytes[DATA_SIZE.offset];
        let end = HEADER_SIZE + data_size as usize;
        if bytes.len() < end {
            warn!(
                "Decode failed, {data_size} byte payload declared but {} received",
                bytes.len() - HEADER_SIZE
            );
            return Err(Error::Truncated);
        }

        let mut packet = Self {
            request_id: bytes[REQUEST_ID.offset],
            command_id: bytes[COMMAND_ID.offset],
            completion_status: bytes[COMPLETION_STATUS.offset],
            data_size,
            data: [0; DATA_SIZE_MAX],
        };
        packet.data[..data_size as usize].copy_from_slice(&bytes[HEADER_SIZE..end]);
        Ok(packet)
    }
}

impl core::fmt::Debug for CommandPacket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandPacket")
            .field("request_id", &self.request_id)
            .field("command_id", &format_args!("{:#04X}", self.command_id))
            .field("completion_status", &self.completion_status)
            .field("data", &self.data())
            .finish()
    }
}
