//! Async command server, for network stacks with an async socket API.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::command::{Capabilities, process};
use crate::config::{COMMAND_RECEIVE_BUFFER_SIZE, COMMAND_REPLY_BUFFER_SIZE};
use crate::transport::{AsyncConnection, AsyncListener};
use crate::{Error, Result};

/// Async version of [`crate::command::CommandServer`]
pub struct AsyncCommandServer<'a, L: AsyncListener> {
    listener: L,
    capabilities: Capabilities<'a>,
    rx_buf: [u8; COMMAND_RECEIVE_BUFFER_SIZE],
    tx_buf: [u8; COMMAND_REPLY_BUFFER_SIZE],
}

impl<'a, L: AsyncListener> AsyncCommandServer<'a, L> {
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

    /// Accept a connection, serve one request on it and close it, whatever the
    /// outcome.
    pub async fn serve_one(&mut self) -> Result<()> {
        let mut conn = self.listener.accept().await?;
        self.serve_connection(&mut conn).await
    }

    /// Serve connections until accepting one fails, returning that error.  Failures
    /// on an accepted connection are logged and serving continues.
    pub async fn serve(&mut self) -> Error {
        loop {
            let mut conn = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Command server accept failed: {e}");
                    return e;
                }
            };
            if let Err(e) = self.serve_connection(&mut conn).await {
                warn!("Command connection failed: {e}");
            }
        }
    }

    async fn serve_connection(&mut self, conn: &mut L::Connection) -> Result<()> {
        let result = self.exchange(conn).await;
        let closed = conn.close().await;
        result.and(closed)
    }

    async fn exchange(&mut self, conn: &mut L::Connection) -> Result<()> {
        let received = conn.read(&mut self.rx_buf).await?;
        if received == 0 {
            debug!("Connection closed before a request arrived");
            return Ok(());
        }

        let len = process(
            &mut self.capabilities,
            &self.rx_buf[..received],
            &mut self.tx_buf,
        )?;
        let written = conn.write(&self.tx_buf[..len]).await?;
        if written != len {
            warn!("Reply short write, {written} of {len} bytes");
            return Err(Error::ShortWrite);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec;

    use alloc::boxed::Box;
    use async_trait::async_trait;

    use super::*;
    use crate::command::capability::test_support::Rig;

    #[derive(Default)]
    struct Shared {
        requests: VecDeque<Vec<u8>>,
        replies: Vec<Vec<u8>>,
        closes: usize,
    }

    struct Listener(Rc<RefCell<Shared>>);
    struct Conn(Rc<RefCell<Shared>>);

    #[async_trait(?Send)]
    impl AsyncConnection for Conn {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let request = self.0.borrow_mut().requests.pop_front().unwrap_or_default();
            buf[..request.len()].copy_from_slice(&request);
            Ok(request.len())
        }

        async fn write(&mut self, data: &[u8]) -> Result<usize> {
            self.0.borrow_mut().replies.push(data.to_vec());
            Ok(data.len())
        }

        async fn close(&mut self) -> Result<()> {
            self.0.borrow_mut().closes += 1;
            Ok(())
        }
    }

    #[async_trait(?Send)]
    impl AsyncListener for Listener {
        type Connection = Conn;

        async fn accept(&mut self) -> Result<Conn> {
            if self.0.borrow().requests.is_empty() {
                return Err(Error::Transport);
            }
            Ok(Conn(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn serves_until_accept_fails() {
        let shared = Rc::new(RefCell::new(Shared::default()));
        {
            let mut s = shared.borrow_mut();
            s.requests.push_back([7, 0x52, 0, 1, 200].to_vec());
            s.requests.push_back([8, 0x52, 0, 0].to_vec());
            s.requests.push_back([9, 0x52].to_vec());
        }

        let mut rig = Rig::default();
        let mut server = AsyncCommandServer::new(Listener(shared.clone()), rig.capabilities());
        assert_eq!(server.serve().await, Error::Transport);
        drop(server);

        let s = shared.borrow();
        assert_eq!(s.closes, 3);
        assert_eq!(
            s.replies,
            [
                [7, 0x52, 1, 0].to_vec(),
                [8, 0x52, 0, 0].to_vec(),
                [0, 0xFF, 0, 0].to_vec(),
            ]
        );
        assert_eq!(rig.pipeline.calls, ["threshold 200"]);
    }
}
