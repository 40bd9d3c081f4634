//! Blocking socket traits.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::net::SocketAddrV4;

use crate::Result;
use crate::transport::Protocol;

/// An open connection, TCP or UDP.
pub trait Connection {
    /// Read into `buf`, returning the number of bytes read.  0 means the peer closed
    /// the connection.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `data` in a single operation, returning the number of bytes accepted.  May
    /// be fewer than `data.len()`.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    fn close(&mut self) -> Result<()>;
}

/// A listening socket.
pub trait Listener {
    type Connection: Connection;

    /// Block until a client connects.
    fn accept(&mut self) -> Result<Self::Connection>;
}

/// Opens outgoing connections.
pub trait Connector {
    type Connection: Connection;

    /// Connect to `remote`.  For UDP this only fixes the destination of later writes.
    fn connect(&mut self, protocol: Protocol, remote: SocketAddrV4) -> Result<Self::Connection>;
}

impl<C: Connector + ?Sized> Connector for &mut C {
    type Connection = C::Connection;

    fn connect(&mut self, protocol: Protocol, remote: SocketAddrV4) -> Result<Self::Connection> {
        (**self).connect(protocol, remote)
    }
}
