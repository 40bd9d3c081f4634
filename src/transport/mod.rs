//! Socket traits over the network stack.
//!
//! The board's network stack is only reached through these traits, so the command
//! server, frame transfer and blob forwarder can run against in-memory doubles, or
//! against `std::net` on a host (see [`std_net`], `std` feature).
//!
//! All operations block.  Sockets are IPv4 only.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;
#[cfg(feature = "std")]
pub mod std_net;
pub mod sync;

#[cfg(feature = "async")]
pub use futures::{AsyncConnection, AsyncListener};
pub use sync::{Connection, Connector, Listener};

/// Transport protocol for an outgoing connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Tcp,
    #[default]
    Udp,
}
