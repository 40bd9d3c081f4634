//! Blocking command server.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::Runnable;
use crate::command::{Capabilities, CommandPacket, dispatch};
use crate::config::{COMMAND_RECEIVE_BUFFER_SIZE, COMMAND_REPLY_BUFFER_SIZE};
use crate::transport::{Connection, Listener};
use crate::{Error, Result};

/// Turn received request bytes into encoded reply bytes.
///
/// A request which cannot be decoded gets a failure reply with request id 0 and
/// command id [`crate::command::CommandId::UNDEFINED`].  Returns the number of reply
/// bytes written to `reply`.
///
/// Arguments:
/// - `caps` - collaborators the command acts on
/// - `request` - bytes received from the host
/// - `reply` - buffer for the encoded reply
pub fn process(caps: &mut Capabilities<'_>, request: &[u8], reply: &mut [u8]) -> Result<usize> {
    let response = match CommandPacket::decode(request) {
        Ok(packet) => {
            trace!("Request: {packet:?}");
            dispatch(caps, &packet)
        }
        Err(e) => {
            warn!("Undecodable request of {} bytes: {e}", request.len());
            CommandPacket::decode_failure()
        }
    };
    trace!("Reply: {response:?}");
    response.encode(reply)
}

/// Serves one request per connection, one connection at a time.
pub struct CommandServer<'a, L: Listener> {
    listener: L,
    capabilities: Capabilities<'a>,
    rx_buf: [u8; COMMAND_RECEIVE_BUFFER_SIZE],
    tx_buf: [u8; COMMAND_REPLY_BUFFER_SIZE],
}

impl<'a, L: Listener> CommandServer<'a, L> {
    /// Create the server.
    ///
    /// Arguments:
    /// - `listener` - socket bound to the command port
    /// - `capabilities` - collaborators commands act on
    pub fn new(listener: L, capabilities: Capabilities<'a>) -> Self {
        Self {
            listener,
            capabilities,
            rx_buf: [0; COMMAND_RECEIVE_BUFFER_SIZE],
            tx_buf: [0; COMMAND_REPLY_BUFFER_SIZE],
        }
    }

    /// Accept a connection, serve one request on it and close it.
    ///
    /// The connection is closed whether or not the exchange succeeded.  A connection
    /// closed by the host before sending anything gets no reply.
    pub fn serve_one(&mut self) -> Result<()> {
        let mut conn = self.listener.accept()?;
        let result = self.exchange(&mut conn);
        let closed = conn.close();
        result.and(closed)
    }

    fn exchange(&mut self, conn: &mut L::Connection) -> Result<()> {
        let received = conn.read(&mut self.rx_buf)?;
        if received == 0 {
            debug!("Connection closed before a request arrived");
            return Ok(());
        }

        let len = process(
            &mut self.capabilities,
            &self.rx_buf[..received],
            &mut self.tx_buf,
        )?;
        let written = conn.write(&self.tx_buf[..len])?;
        if written != len {
            warn!("Reply short write, {written} of {len} bytes");
            return Err(Error::ShortWrite);
        }
        Ok(())
    }

    /// The collaborators, for use between requests
    pub fn capabilities(&mut self) -> &mut Capabilities<'a> {
        &mut self.capabilities
    }
}

impl<L: Listener> Runnable for CommandServer<'_, L> {
    fn run(&mut self) {
        if let Err(e) = self.serve_one() {
            warn!("Command connection failed: {e}");
        }
    }
}
