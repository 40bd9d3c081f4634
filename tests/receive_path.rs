// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Received data from interrupt to host.

mod common;

use heapless::spsc::Queue;
use vision_addon::Runnable;
use vision_addon::config::{BLOB_TARGET, ForwarderConfig};
use vision_addon::forwarder::BlobForwarder;
use vision_addon::handoff::{
    ExtiRxHandler, InterruptHandler, IsrMessage, RegistryBuilder, Transfer, TransferState,
    UartEvent, UartRxHandler,
};
use vision_addon::pool::{BufferHandle, BufferPool, CyclicPool, CyclicSlot};
use vision_addon::transport::Protocol;

use common::{RecordingConnector, SoftPeripheral, init_logging};

#[test]
fn uart_chunks_reach_host_in_order() {
    init_logging();
    let pool: BufferPool<2, 64> = BufferPool::new();
    let mut queue: Queue<IsrMessage<BufferHandle>, 4> = Queue::new();
    let (producer, consumer) = queue.split();
    let peripheral = SoftPeripheral::default();
    let handler = UartRxHandler::new(peripheral.clone(), &pool, producer);
    let connector = RecordingConnector::default();
    let mut forwarder = BlobForwarder::new(
        consumer,
        &handler,
        connector.clone(),
        ForwarderConfig::default(),
    );

    assert_eq!(handler.start(), TransferState::Armed);

    for chunk in [&b"first"[..], b"second", b"third"] {
        peripheral.deliver(chunk);
        handler.handle_interrupt(UartEvent::Idle {
            received: chunk.len(),
        });
        assert!(peripheral.is_armed());
        forwarder.run();
    }

    let sent = connector.sent.borrow();
    let payloads: Vec<&[u8]> = sent.iter().map(|s| s.data.as_slice()).collect();
    assert_eq!(payloads, [&b"first"[..], b"second", b"third"]);
    assert!(
        sent.iter()
            .all(|s| s.closed && s.protocol == Protocol::Udp && s.remote == BLOB_TARGET)
    );

    // Only the buffer armed for the next reception is held
    assert_eq!(pool.held(), 1);
    assert_eq!(forwarder.forwarded(), 3);
}

#[test]
fn uart_pool_exhaustion_stops_reception_until_restarted() {
    init_logging();
    let pool: BufferPool<2, 16> = BufferPool::new();
    let mut queue: Queue<IsrMessage<BufferHandle>, 4> = Queue::new();
    let (producer, consumer) = queue.split();
    let peripheral = SoftPeripheral::default();
    let handler = UartRxHandler::new(peripheral.clone(), &pool, producer);
    let connector = RecordingConnector::default();
    let mut forwarder = BlobForwarder::new(
        consumer,
        &handler,
        connector.clone(),
        ForwarderConfig::default(),
    );

    handler.start();
    peripheral.deliver(b"a");
    handler.handle_interrupt(UartEvent::Idle { received: 1 });
    peripheral.deliver(b"b");
    handler.handle_interrupt(UartEvent::Idle { received: 1 });

    // Both buffers queued, none left to arm
    assert!(!handler.is_active());
    assert!(!peripheral.is_armed());

    forwarder.run();
    forwarder.run();
    assert_eq!(pool.available(), 2);

    assert_eq!(handler.start(), TransferState::Armed);
    assert_eq!(connector.sent.borrow().len(), 2);
}

#[test]
fn exti_chunks_dispatched_through_registry() {
    init_logging();
    let mut slots: CyclicPool<3, 32> = CyclicPool::new();
    let mut queue: Queue<IsrMessage<CyclicSlot>, 4> = Queue::new();
    let (producer, consumer) = queue.split();
    let peripheral = SoftPeripheral::default();
    let handler = ExtiRxHandler::new(peripheral.clone(), &mut slots, producer);
    let connector = RecordingConnector::default();
    let config = ForwarderConfig {
        protocol: Protocol::Tcp,
        ..Default::default()
    };
    let mut forwarder = BlobForwarder::new(consumer, &handler, connector.clone(), config);

    const EXTI_LINE: u8 = 4;
    let mut builder: RegistryBuilder<'_, u8, (), 4> = RegistryBuilder::new();
    builder.register(EXTI_LINE, &handler).unwrap();
    let registry = builder.freeze();

    handler.start();
    peripheral.deliver(b"spi frame");
    assert!(registry.dispatch(&EXTI_LINE, ()));
    forwarder.run();

    // Unregistered line reaches nothing
    assert!(!registry.dispatch(&7, ()));

    let sent = connector.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].protocol, Protocol::Tcp);
    assert_eq!(sent[0].data, b"spi frame");
}
