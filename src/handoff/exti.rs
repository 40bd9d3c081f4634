//! SPI DMA reception, drained when an external interrupt fires.
//!
//! The sender raises a GPIO line at the end of each blob.  The EXTI handler for that
//! line stops the SPI DMA, works out how much arrived from the DMA controller's
//! remaining count, and publishes the slot.

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
use crate::pool::{CyclicPool, CyclicSlot};

struct ExtiState<'a, P, const M: usize, const SIZE: usize, const Q: usize> {
    peripheral: P,
    pool: &'a mut CyclicPool<M, SIZE>,
    producer: Producer<'a, IsrMessage<CyclicSlot>, Q>,
    in_flight: Option<CyclicSlot>,
    phase: TransferState,
    dropped: u32,
}

/// SPI receiver over a [`CyclicPool`] of `M` slots of `SIZE` bytes.
///
/// Every reception is armed for a full `SIZE` bytes.  Slots are reused in rotation, so
/// the consumer must keep no more than `M - 1` messages outstanding.
pub struct ExtiRxHandler<'a, P, const M: usize, const SIZE: usize, const Q: usize> {
    active: AtomicBool,
    state: Mutex<RefCell<ExtiState<'a, P, M, SIZE, Q>>>,
}

impl<'a, P: RxPeripheral, const M: usize, const SIZE: usize, const Q: usize>
    ExtiRxHandler<'a, P, M, SIZE, Q>
{
    /// Create an idle handler, taking exclusive use of `pool`.
    pub fn new(
        peripheral: P,
        pool: &'a mut CyclicPool<M, SIZE>,
        producer: Producer<'a, IsrMessage<CyclicSlot>, Q>,
    ) -> Self {
        Self {
            active: AtomicBool::new(false),
            state: Mutex::new(RefCell::new(ExtiState {
                peripheral,
                pool,
                producer,
                in_flight: None,
                phase: TransferState::Idle,
                dropped: 0,
            })),
        }
    }

    /// Handle the end-of-blob interrupt.  Called from interrupt context.
    pub fn on_interrupt(&self) {
        if !self.publish() {
            return;
        }
        self.active.store(false, Ordering::Release);
        self.start();
    }

    /// Number of messages dropped because the queue was full
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).dropped)
    }

    pub fn state(&self) -> TransferState {
        critical_section::with(|cs| self.state.borrow_ref(cs).phase)
    }

    // Returns false, leaving reception stopped, if nothing was armed.
    fn publish(&self) -> bool {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.phase = TransferState::Draining;

            if let Err(e) = state.peripheral.disarm() {
                warn!("SPI rx: stopping DMA failed: {e}");
            }
            let remaining = state.peripheral.remaining();

            let Some(slot) = state.in_flight.take() else {
                warn!("SPI rx: interrupt with no reception armed");
                state.phase = TransferState::Idle;
                return false;
            };

            let bytes_received = SIZE.saturating_sub(remaining);
            trace!(
                "SPI rx: slot {} received {bytes_received} bytes",
                slot.index()
            );

            let message = IsrMessage {
                buffer: slot,
                bytes_received,
            };
            if state.producer.enqueue(message).is_err() {
                warn!("SPI rx: queue full, dropping {bytes_received} bytes");
                state.dropped = state.dropped.wrapping_add(1);
            }
            state.phase = TransferState::Idle;
            true
        })
    }

    // Called with the active flag claimed.  Clears it again on failure.
    fn arm(&self, state: &mut ExtiState<'a, P, M, SIZE, Q>) -> TransferState {
        let Some(slot) = state.pool.acquire(SIZE) else {
            warn!("SPI rx: abort start, slot acquire failed");
            self.active.store(false, Ordering::Release);
            return TransferState::Idle;
        };

        let region = state.pool.dma_region(slot);
        if let Err(e) = state.peripheral.arm(region) {
            error!("SPI rx: arming DMA failed: {e}");
            self.active.store(false, Ordering::Release);
            return TransferState::Idle;
        }

        state.in_flight = Some(slot);
        TransferState::Armed
    }
}

impl<'a, P: RxPeripheral, const M: usize, const SIZE: usize, const Q: usize> Transfer
    for ExtiRxHandler<'a, P, M, SIZE, Q>
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
            warn!("SPI rx: abort start, transfer active");
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

impl<'a, P: RxPeripheral, const M: usize, const SIZE: usize, const Q: usize>
    InterruptHandler<()> for ExtiRxHandler<'a, P, M, SIZE, Q>
{
    fn handle_interrupt(&self, _event: ()) {
        self.on_interrupt();
    }
}

impl<'a, P, const M: usize, const SIZE: usize, const Q: usize> RxSource
    for ExtiRxHandler<'a, P, M, SIZE, Q>
{
    type Buffer = CyclicSlot;

    fn consume(&self, message: IsrMessage<CyclicSlot>, f: &mut dyn FnMut(&[u8])) {
        let len = message.bytes_received.min(SIZE);

        // Copy out so `f` can block without holding off interrupts
        let mut local = [0u8; SIZE];
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            local[..len].copy_from_slice(&state.pool.contents(message.buffer)[..len]);
        });
        f(&local[..len]);
    }
}

#[cfg(test)]
mod test {
    use heapless::spsc::Queue;

    use super::*;
    use crate::handoff::test_support::MockPeripheral;

    #[test]
    fn byte_count_from_remaining() {
        let mut pool: CyclicPool<2, 16> = CyclicPool::new();
        let mut queue: Queue<IsrMessage<CyclicSlot>, 4> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mock = MockPeripheral::default();
        let handler = ExtiRxHandler::new(mock.clone(), &mut pool, producer);

        assert_eq!(handler.start(), TransferState::Armed);
        mock.receive(b"blob data");
        handler.handle_interrupt(());

        let message = consumer.dequeue().unwrap();
        assert_eq!(message.bytes_received, 9);
        assert_eq!(message.buffer.index(), 0);

        let mut seen = std::vec::Vec::new();
        handler.consume(message, &mut |data| seen.extend_from_slice(data));
        assert_eq!(seen, b"blob data");

        // Re-armed into the next slot
        assert!(handler.is_active());
        assert!(mock.is_armed());
        assert_eq!(mock.state.borrow().disarm_calls, 1);
    }

    #[test]
    fn interrupt_while_stopped_does_not_arm() {
        let mut pool: CyclicPool<2, 16> = CyclicPool::new();
        let mut queue: Queue<IsrMessage<CyclicSlot>, 4> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mock = MockPeripheral::default();
        let handler = ExtiRxHandler::new(mock.clone(), &mut pool, producer);

        handler.on_interrupt();

        assert!(consumer.dequeue().is_none());
        assert_eq!(handler.state(), TransferState::Idle);
        assert!(!handler.is_active());
        assert!(!mock.is_armed());
        assert_eq!(mock.arm_calls(), 0);
    }

    #[test]
    fn slots_rotate() {
        let mut pool: CyclicPool<3, 8> = CyclicPool::new();
        let mut queue: Queue<IsrMessage<CyclicSlot>, 8> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mock = MockPeripheral::default();
        let handler = ExtiRxHandler::new(mock.clone(), &mut pool, producer);

        handler.start();
        let mut order = std::vec::Vec::new();
        for _ in 0..4 {
            mock.receive(b"x");
            handler.on_interrupt();
            order.push(consumer.dequeue().unwrap().buffer.index());
        }
        assert_eq!(order, [0, 1, 2, 0]);
    }

    #[test]
    fn full_queue_drops() {
        let mut pool: CyclicPool<4, 8> = CyclicPool::new();
        let mut queue: Queue<IsrMessage<CyclicSlot>, 2> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mock = MockPeripheral::default();
        let handler = ExtiRxHandler::new(mock.clone(), &mut pool, producer);

        handler.start();
        mock.receive(b"first");
        handler.on_interrupt();
        mock.receive(b"second");
        handler.on_interrupt();

        assert_eq!(handler.dropped(), 1);
        assert!(handler.is_active());

        let message = consumer.dequeue().unwrap();
        handler.consume(message, &mut |data| assert_eq!(data, b"first"));
        assert!(consumer.dequeue().is_none());
    }

    #[test]
    fn arm_failure_clears_active() {
        let mut pool: CyclicPool<2, 8> = CyclicPool::new();
        let mut queue: Queue<IsrMessage<CyclicSlot>, 4> = Queue::new();
        let (producer, _consumer) = queue.split();
        let mock = MockPeripheral::default();
        mock.set_fail_arm(true);
        let handler = ExtiRxHandler::new(mock.clone(), &mut pool, producer);

        assert_eq!(handler.start(), TransferState::Idle);
        assert!(!handler.is_active());

        mock.set_fail_arm(false);
        assert_eq!(handler.start(), TransferState::Armed);
        assert_eq!(handler.start(), TransferState::Armed);
        assert_eq!(mock.arm_calls(), 2);
    }
}
