//! [`crate::transport`] over `std::net`, for running on a host.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddrV4, TcpListener, TcpStream, UdpSocket};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::transport::{Connection, Connector, Listener, Protocol};
use crate::{Error, Result};

fn transport_error(context: &str, e: std::io::Error) -> Error {
    warn!("{context} failed: {e}");
    Error::Transport
}

/// A `std::net` TCP stream or connected UDP socket
#[derive(Debug)]
pub enum StdConnection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Connection for StdConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            StdConnection::Tcp(stream) => stream.read(buf),
            StdConnection::Udp(socket) => socket.recv(buf),
        }
        .map_err(|e| transport_error("Read", e))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self {
            StdConnection::Tcp(stream) => stream.write(data),
            StdConnection::Udp(socket) => socket.send(data),
        }
        .map_err(|e| transport_error("Write", e))
    }

    fn close(&mut self) -> Result<()> {
        match self {
            StdConnection::Tcp(stream) => stream
                .shutdown(Shutdown::Both)
                .map_err(|e| transport_error("Close", e)),
            // Dropping the socket closes it
            StdConnection::Udp(_) => Ok(()),
        }
    }
}

/// TCP listener
#[derive(Debug)]
pub struct StdListener {
    listener: TcpListener,
}

impl StdListener {
    pub fn bind(addr: SocketAddrV4) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| transport_error("Bind", e))?;
        debug!("Listening on {addr}");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| transport_error("Local address", e))
    }
}

impl Listener for StdListener {
    type Connection = StdConnection;

    fn accept(&mut self) -> Result<StdConnection> {
        let (stream, peer) = self
            .listener
            .accept()
            .map_err(|e| transport_error("Accept", e))?;
        debug!("Accepted connection from {peer}");
        Ok(StdConnection::Tcp(stream))
    }
}

/// Outgoing connections, TCP or UDP
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConnector;

impl Connector for StdConnector {
    type Connection = StdConnection;

    fn connect(&mut self, protocol: Protocol, remote: SocketAddrV4) -> Result<StdConnection> {
        match protocol {
            Protocol::Tcp => TcpStream::connect(remote)
                .map(StdConnection::Tcp)
                .map_err(|e| transport_error("TCP connect", e)),
            Protocol::Udp => {
                let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| transport_error("UDP bind", e))?;
                socket
                    .connect(remote)
                    .map_err(|e| transport_error("UDP connect", e))?;
                Ok(StdConnection::Udp(socket))
            }
        }
    }
}
