//! UART receive-to-idle DMA handler, backed by a shared [`BufferPool`].

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use heapless::spsc::Producer;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::handoff::{
    InterruptHandler, IsrMessage, RxPeripheral, RxSource, Transfer, TransferState,
};
use crate::pool::{BufferHandle, BufferPool};

/// Receive event reported by the UART HAL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartEvent {
    /// Line went idle after `received` bytes
    Idle { received: usize },
    /// Buffer filled completely.  Buffers are sized so this never happens.
    TransferComplete,
    /// Half the buffer filled.  This interrupt is kept disabled.
    HalfTransfer,
    /// Anything else
    Unknown,
}

struct UartState<'a, P, const Q: usize> {
    peripheral: P,
    producer: Producer<'a, IsrMessage<BufferHandle>, Q>,
    in_flight: Option<BufferHandle>,
    phase: TransferState,
    dropped: u32,
}

/// Double-buffered UART receiver.
///
/// Each reception uses a whole buffer from `pool`.  On an idle event the buffer is
/// published and a new one acquired and armed.  If the pool is empty the handler goes
/// idle - this is the backpressure mechanism - and must be restarted with
/// [`Transfer::start()`] once the consumer has released buffers.
pub struct UartRxHandler<'a, P, const N: usize, const SIZE: usize, const Q: usize> {
    pool: &'a BufferPool<N, SIZE>,
    active: AtomicBool,
    state: Mutex<RefCell<UartState<'a, P, Q>>>,
}

impl<'a, P: RxPeripheral, const N: usize, const SIZE: usize, const Q: usize>
    UartRxHandler<'a, P, N, SIZE, Q>
{
    /// Create an idle handler.  Call [`Transfer::start()`] to begin receiving.
    pub fn new(
        peripheral: P,
        pool: &'a BufferPool<N, SIZE>,
        producer: Producer<'a, IsrMessage<BufferHandle>, Q>,
    ) -> Self {
        Self {
            pool,
            active: AtomicBool::new(false),
            state: Mutex::new(RefCell::new(UartState {
                peripheral,
                producer,
                in_flight: None,
                phase: TransferState::Idle,
                dropped: 0,
            })),
        }
    }

    /// Handle a receive event.  Called from interrupt context.
    pub fn on_event(&self, event: UartEvent) {
        match event {
            UartEvent::Idle { received } => {
                trace!("UART rx: idle event, {received} bytes received");
                if !self.publish(received) {
                    return;
                }
                self.active.store(false, Ordering::Release);
                self.start();
            }
            UartEvent::TransferComplete => {
                warn!("UART rx: transfer complete event should never happen");
            }
            UartEvent::HalfTransfer => {
                warn!("UART rx: half transfer event must be disabled");
            }
            UartEvent::Unknown => {
                warn!("UART rx: unknown event");
            }
        }
    }

    /// Number of messages dropped because the queue was full
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).dropped)
    }

    pub fn state(&self) -> TransferState {
        critical_section::with(|cs| self.state.borrow_ref(cs).phase)
    }

    // Returns false, leaving reception stopped, if nothing was armed.
    fn publish(&self, received: usize) -> bool {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.phase = TransferState::Draining;

            if let Err(e) = state.peripheral.disarm() {
                warn!("UART rx: stopping reception failed: {e}");
            }

            let Some(buffer) = state.in_flight.take() else {
                warn!("UART rx: idle event with no reception armed");
                state.phase = TransferState::Idle;
                return false;
            };

            let message = IsrMessage {
                buffer,
                bytes_received: received.min(SIZE),
            };
            if let Err(message) = state.producer.enqueue(message) {
                warn!(
                    "UART rx: queue full, dropping {} bytes",
                    message.bytes_received
                );
                state.dropped = state.dropped.wrapping_add(1);
                self.pool.release(message.buffer);
            }
            state.phase = TransferState::Idle;
            true
        })
    }

    // Called with the active flag claimed.  Clears it again on failure.
    fn arm(&self, state: &mut UartState<'a, P, Q>) -> TransferState {
        let Some(mut buffer) = self.pool.acquire(SIZE) else {
            warn!("UART rx: abort start, buffer acquire failed");
            self.active.store(false, Ordering::Release);
            return TransferState::Idle;
        };

        let region = self.pool.dma_region(&mut buffer);
        if let Err(e) = state.peripheral.arm(region) {
            error!("UART rx: arming reception failed: {e}");
            self.pool.release(buffer);
            self.active.store(false, Ordering::Release);
            return TransferState::Idle;
        }

        trace!("UART rx: armed buffer {}", buffer.index());
        state.in_flight = Some(buffer);
        TransferState::Armed
    }
}

impl<'a, P: RxPeripheral, const N: usize, const SIZE: usize, const Q: usize> Transfer
    for UartRxHandler<'a, P, N, SIZE, Q>
{
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn start(&self) -> TransferState {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("UART rx: abort start, transfer active");
            return TransferState::Armed;
        }

        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let phase = self.arm(&mut state);
            state.phase = phase;
            phase
        })
    }
}

impl<'a, P: RxPeripheral, const N: usize, const SIZE: usize, const Q: usize>
    InterruptHandler<UartEvent> for UartRxHandler<'a, P, N, SIZE, Q>
{
    fn handle_interrupt(&self, event: UartEvent) {
        self.on_event(event);
    }
}

impl<'a, P, const N: usize, const SIZE: usize, const Q: usize> RxSource
    for UartRxHandler<'a, P, N, SIZE, Q>
{
    type Buffer = BufferHandle;

    fn consume(&self, message: IsrMessage<BufferHandle>, f: &mut dyn FnMut(&[u8])) {
        let IsrMessage {
            buffer,
            bytes_received,
        } = message;
        f(&self.pool.buffer(&buffer)[..bytes_received]);
        self.pool.release(buffer);
    }
}
