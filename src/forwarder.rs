//! Task which forwards received chunks to the host.
//!
//! Drains the handoff queue filled by a [`crate::handoff`] receive handler, and sends
//! each chunk to the host over its own short-lived connection.  Drops are never
//! retried - a chunk which fails to send is logged and its buffer returned.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use heapless::spsc::Consumer;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::ForwarderConfig;
use crate::handoff::{IsrMessage, RxSource};
use crate::transport::{Connection, Connector};
use crate::{Error, Result, Runnable};

/// Forwards chunks from one receive handler.
///
/// Arguments to [`Self::new()`]:
/// - `consumer` - task end of the handler's queue
/// - `source` - the handler, which turns messages back into bytes
/// - `connector` - opens a connection per chunk
/// - `config` - protocol and destination
pub struct BlobForwarder<'a, S: RxSource, C, const Q: usize> {
    consumer: Consumer<'a, IsrMessage<S::Buffer>, Q>,
    source: &'a S,
    connector: C,
    config: ForwarderConfig,
    forwarded: u32,
    failed: u32,
}

impl<'a, S: RxSource, C: Connector, const Q: usize> BlobForwarder<'a, S, C, Q> {
    pub fn new(
        consumer: Consumer<'a, IsrMessage<S::Buffer>, Q>,
        source: &'a S,
        connector: C,
        config: ForwarderConfig,
    ) -> Self {
        Self {
            consumer,
            source,
            connector,
            config,
            forwarded: 0,
            failed: 0,
        }
    }

    /// Chunks sent successfully
    pub fn forwarded(&self) -> u32 {
        self.forwarded
    }

    /// Chunks which could not be sent
    pub fn failed(&self) -> u32 {
        self.failed
    }

    /// Forward one waiting chunk, if any.  Returns whether a chunk was taken from the
    /// queue.
    pub fn forward_one(&mut self) -> bool {
        let waiting = self.consumer.len();
        if waiting > 1 {
            warn!("Forwarder: {waiting} chunks waiting, falling behind");
        }

        let Some(message) = self.consumer.dequeue() else {
            return false;
        };

        let source = self.source;
        let connector = &mut self.connector;
        let config = self.config;
        let mut result = Ok(());
        source.consume(message, &mut |data| {
            result = send(connector, config, data);
        });

        match result {
            Ok(()) => self.forwarded = self.forwarded.wrapping_add(1),
            Err(e) => {
                warn!("Forwarder: chunk to {} dropped: {e}", config.target);
                self.failed = self.failed.wrapping_add(1);
            }
        }
        true
    }
}

fn send<C: Connector>(connector: &mut C, config: ForwarderConfig, data: &[u8]) -> Result<()> {
    trace!("Forwarder: {} bytes to {}", data.len(), config.target);
    let mut conn = connector.connect(config.protocol, config.target)?;
    let written = conn.write(data);
    let closed = conn.close();

    let written = written?;
    if written != data.len() {
        warn!("Forwarder: short write, {written} of {} bytes", data.len());
        return Err(Error::ShortWrite);
    }
    closed
}

impl<S: RxSource, C: Connector, const Q: usize> Runnable for BlobForwarder<'_, S, C, Q> {
    fn run(&mut self) {
        self.forward_one();
    }
}
