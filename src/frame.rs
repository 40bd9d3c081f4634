//! Segmented transfer of a captured frame to a remote host.
//!
//! The frame is streamed over one TCP connection as raw bytes, in segments of at most
//! [`FrameTransferConfig::segment_size`] bytes, each sent with a single blocking
//! write.  There is no framing - the host knows the frame geometry.
//!
//! ```text
//! Idle --init--> Init --send_segment--> Sending --...--> Complete
//!                  \                       \
//!                   `----------------------`--> Error
//! ```

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::net::SocketAddrV4;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::command::FrameRequest;
use crate::config::{EXTERNAL_SDRAM_BASE, FRAME_SIZE, FrameTransferConfig};
use crate::transport::{Connection, Connector, Protocol};
use crate::{Error, Result};

/// The camera frame buffer in external SDRAM.
///
/// # Safety
///
/// The SDRAM controller must be initialised, and nothing may write the frame buffer
/// while the returned slice is in use - in practice, no capture may be requested
/// during a transfer.
pub unsafe fn sdram_frame() -> &'static [u8] {
    // SAFETY: caller guarantees the region is mapped and not written concurrently
    unsafe { core::slice::from_raw_parts(EXTERNAL_SDRAM_BASE as *const u8, FRAME_SIZE) }
}

/// Progress of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferSession {
    pub bytes_remaining: usize,
    pub segment_index: usize,
}

/// Result of sending one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Whole frame sent
    Complete,
    /// More segments to send
    Incomplete,
    /// Transfer failed and cannot continue
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    /// Connected, nothing sent
    Init,
    Sending,
    Complete,
    Error,
}

/// Sends a fixed frame region to a host, one segment at a time.
pub struct FrameTransfer<'f, C: Connector> {
    frame: &'f [u8],
    connector: C,
    segment_size: usize,
    connection: Option<C::Connection>,
    session: TransferSession,
    state: FrameState,
    error: Option<Error>,
}

impl<'f, C: Connector> FrameTransfer<'f, C> {
    /// Arguments:
    /// - `frame` - the frame region, normally [`sdram_frame()`]
    /// - `connector` - opens the connection to the host
    /// - `config` - segment size
    pub fn new(frame: &'f [u8], connector: C, config: FrameTransferConfig) -> Self {
        Self {
            frame,
            connector,
            segment_size: config.segment_size.max(1),
            connection: None,
            session: TransferSession::default(),
            state: FrameState::Idle,
            error: None,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn session(&self) -> TransferSession {
        self.session
    }

    /// Connect to `remote` and reset the session to the start of the frame.
    pub fn init(&mut self, remote: SocketAddrV4) -> Result<()> {
        if self.connection.is_some() {
            warn!("Frame transfer: abort init, transfer in progress");
            return Err(Error::Busy);
        }

        self.error = None;
        self.session = TransferSession {
            bytes_remaining: self.frame.len(),
            segment_index: 0,
        };

        match self.connector.connect(Protocol::Tcp, remote) {
            Ok(connection) => {
                debug!("Frame transfer: connected to {remote}");
                self.connection = Some(connection);
                self.state = FrameState::Init;
                Ok(())
            }
            Err(e) => {
                warn!("Frame transfer: connect to {remote} failed: {e}");
                Err(self.fail(e))
            }
        }
    }

    /// Send the next segment with one blocking write.
    ///
    /// The connection is closed once the transfer reaches `Complete` or `Error`.
    pub fn send_segment(&mut self) -> TransferStatus {
        let status = self.write_segment();
        if status != TransferStatus::Incomplete {
            self.close();
        }
        status
    }

    fn write_segment(&mut self) -> TransferStatus {
        if !matches!(self.state, FrameState::Init | FrameState::Sending) {
            warn!("Frame transfer: send in state {:?}", self.state);
            self.fail(Error::InvalidOperation);
            return TransferStatus::Error;
        }
        let Some(connection) = self.connection.as_mut() else {
            self.fail(Error::InvalidOperation);
            return TransferStatus::Error;
        };

        let remaining = self.session.bytes_remaining;
        if remaining == 0 {
            self.state = FrameState::Complete;
            return TransferStatus::Complete;
        }

        let segment = remaining.min(self.segment_size);
        let offset = self.session.segment_index * self.segment_size;
        let result = connection.write(&self.frame[offset..offset + segment]);
        self.session.segment_index += 1;

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                warn!(
                    "Frame transfer: segment {} write failed: {e}",
                    self.session.segment_index - 1
                );
                self.fail(e);
                return TransferStatus::Error;
            }
        };
        if written != segment {
            warn!("Frame transfer: short write, {written} of {segment} bytes");
            self.fail(Error::ShortWrite);
            return TransferStatus::Error;
        }

        self.session.bytes_remaining -= written;
        if written < self.segment_size && self.session.bytes_remaining > 0 {
            warn!("Frame transfer: partial segment with {} bytes left", self.session.bytes_remaining);
            self.fail(Error::ShortWrite);
            return TransferStatus::Error;
        }

        if self.session.bytes_remaining == 0 {
            self.state = FrameState::Complete;
            TransferStatus::Complete
        } else {
            self.state = FrameState::Sending;
            TransferStatus::Incomplete
        }
    }

    /// Send all remaining segments, then close the connection.
    ///
    /// Succeeds only if the whole frame was sent.
    pub fn send_frame(&mut self) -> Result<()> {
        let status = loop {
            match self.send_segment() {
                TransferStatus::Incomplete => continue,
                status => break status,
            }
        };

        match status {
            TransferStatus::Complete => {
                info!(
                    "Frame transfer: sent {} bytes in {} segments",
                    self.frame.len(),
                    self.session.segment_index
                );
                Ok(())
            }
            _ => Err(self.error.unwrap_or(Error::Transport)),
        }
    }

    fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                debug!("Frame transfer: close failed: {e}");
            }
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        self.state = FrameState::Error;
        self.error.get_or_insert(error);
        error
    }
}

impl<C: Connector> FrameRequest for FrameTransfer<'_, C> {
    fn request_transfer(&mut self, remote: SocketAddrV4) -> Result<()> {
        self.init(remote)?;
        self.send_frame()
    }
}
