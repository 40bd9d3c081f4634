//! Asynchronous socket traits, for network stacks with an async API.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use alloc::boxed::Box;
use async_trait::async_trait;

use crate::Result;

/// Async version of [`crate::transport::Connection`]
#[async_trait(?Send)]
pub trait AsyncConnection {
    /// Read into `buf`, returning the number of bytes read.  0 means the peer closed
    /// the connection.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `data`, returning the number of bytes accepted.
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    async fn close(&mut self) -> Result<()>;
}

/// Async version of [`crate::transport::Listener`]
#[async_trait(?Send)]
pub trait AsyncListener {
    type Connection: AsyncConnection;

    /// Wait for a client to connect.
    async fn accept(&mut self) -> Result<Self::Connection>;
}
