// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Doubles shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use vision_addon::handoff::RxPeripheral;
use vision_addon::network::NetInterface;
use vision_addon::pool::DmaRegion;
use vision_addon::transport::{Connection, Connector, Listener, Protocol};
use vision_addon::{Error, Result};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Delay which returns immediately
#[derive(Debug, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Default)]
struct Dma {
    armed: Option<DmaRegion>,
    remaining: usize,
}

/// Receive peripheral which copies data in by software
#[derive(Clone, Default)]
pub struct SoftPeripheral {
    dma: Rc<RefCell<Dma>>,
}

impl SoftPeripheral {
    /// Deliver `data` into the armed region.
    pub fn deliver(&self, data: &[u8]) {
        let mut dma = self.dma.borrow_mut();
        let region = dma.armed.expect("not armed");
        // SAFETY: the handler keeps the buffer until it disarms us
        let dst = unsafe { region.as_mut_slice() };
        dst[..data.len()].copy_from_slice(data);
        dma.remaining = region.len() - data.len();
    }

    pub fn is_armed(&self) -> bool {
        self.dma.borrow().armed.is_some()
    }
}

impl RxPeripheral for SoftPeripheral {
    fn arm(&mut self, region: DmaRegion) -> Result<()> {
        let mut dma = self.dma.borrow_mut();
        dma.armed = Some(region);
        dma.remaining = region.len();
        Ok(())
    }

    fn disarm(&mut self) -> Result<()> {
        self.dma.borrow_mut().armed = None;
        Ok(())
    }

    fn remaining(&mut self) -> usize {
        self.dma.borrow().remaining
    }
}

/// One outgoing connection as seen by the remote end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub protocol: Protocol,
    pub remote: SocketAddrV4,
    pub data: Vec<u8>,
    pub closed: bool,
}

/// Connector recording everything sent over its connections
#[derive(Clone, Default)]
pub struct RecordingConnector {
    pub sent: Rc<RefCell<Vec<Sent>>>,
}

pub struct RecordingConnection {
    sent: Rc<RefCell<Vec<Sent>>>,
    index: usize,
}

impl Connector for RecordingConnector {
    type Connection = RecordingConnection;

    fn connect(&mut self, protocol: Protocol, remote: SocketAddrV4) -> Result<RecordingConnection> {
        let mut sent = self.sent.borrow_mut();
        sent.push(Sent {
            protocol,
            remote,
            data: Vec::new(),
            closed: false,
        });
        Ok(RecordingConnection {
            sent: self.sent.clone(),
            index: sent.len() - 1,
        })
    }
}

impl Connection for RecordingConnection {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.sent.borrow_mut()[self.index].data.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self) -> Result<()> {
        self.sent.borrow_mut()[self.index].closed = true;
        Ok(())
    }
}

/// Request/reply exchange on one accepted connection
#[derive(Debug, Default)]
pub struct Exchange {
    pub request: Vec<u8>,
    pub reply: Vec<u8>,
    pub closed: bool,
}

/// Listener handing out queued requests, failing once they run out
#[derive(Default)]
pub struct ScriptedListener {
    pending: VecDeque<Rc<RefCell<Exchange>>>,
}

impl ScriptedListener {
    pub fn request(&mut self, request: &[u8]) -> Rc<RefCell<Exchange>> {
        let exchange = Rc::new(RefCell::new(Exchange {
            request: request.to_vec(),
            ..Default::default()
        }));
        self.pending.push_back(exchange.clone());
        exchange
    }
}

pub struct ScriptedConnection(Rc<RefCell<Exchange>>);

impl Listener for ScriptedListener {
    type Connection = ScriptedConnection;

    fn accept(&mut self) -> Result<ScriptedConnection> {
        self.pending
            .pop_front()
            .map(ScriptedConnection)
            .ok_or(Error::Transport)
    }
}

impl Connection for ScriptedConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let exchange = self.0.borrow();
        let len = exchange.request.len().min(buf.len());
        buf[..len].copy_from_slice(&exchange.request[..len]);
        Ok(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.0.borrow_mut().reply.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self) -> Result<()> {
        self.0.borrow_mut().closed = true;
        Ok(())
    }
}

/// Live interface double
#[derive(Debug, Clone, Copy)]
pub struct Interface {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for Interface {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl NetInterface for Interface {
    fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    fn set_ip(&mut self, ip: Ipv4Addr) {
        self.ip = ip;
    }

    fn netmask(&self) -> Ipv4Addr {
        self.netmask
    }

    fn set_netmask(&mut self, netmask: Ipv4Addr) {
        self.netmask = netmask;
    }

    fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    fn set_gateway(&mut self, gateway: Ipv4Addr) {
        self.gateway = gateway;
    }
}
