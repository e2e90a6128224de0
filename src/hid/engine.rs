//! Protocol engine: one pixel transfer in flight at a time
//!
//! State machine:
//! - `Initializing` after construction or a recovery reset, until the device
//!   acknowledges init (0x11)
//! - `Idle` when nothing is in flight
//! - `Transferring` from begin-transfer until the device reports completion
//!
//! Queue and state share one lock. Callers enqueueing, the reader thread
//! handling acknowledgements, and the recovery timer all go through it.

use super::commands;
use super::queue::{TransferQueue, TransferRequest};
use super::transport::HidTransport;
use super::watchdog::RecoveryTimer;
use crate::core::config::EngineConfig;
use crate::core::events::{EventDispatcher, PadEvent};
use crate::error::TransportError;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Idle,
    Transferring,
}

struct EngineInner {
    state: EngineState,
    queue: TransferQueue,
    /// Recovery timer generation guarding the in-flight transfer
    armed: Option<u64>,
}

pub struct ProtocolEngine {
    inner: Mutex<EngineInner>,
    /// Signalled when the queue drains
    drained: Condvar,
    /// Control interface
    device: Arc<dyn HidTransport>,
    /// Display interface
    display: Arc<dyn HidTransport>,
    timer: RecoveryTimer,
    events: Arc<EventDispatcher>,
    closed: AtomicBool,
}

impl ProtocolEngine {
    /// Create the engine in `Initializing` state. No report is written until
    /// [`reset`](Self::reset) is called.
    pub fn new(
        device: Arc<dyn HidTransport>,
        display: Arc<dyn HidTransport>,
        events: Arc<EventDispatcher>,
        config: &EngineConfig,
    ) -> Arc<Self> {
        let timeout = Duration::from_millis(config.recovery_timeout_ms);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let timer = RecoveryTimer::spawn(timeout, move |generation| {
                if let Some(engine) = weak.upgrade() {
                    engine.on_recovery_timeout(generation);
                }
            });

            Self {
                inner: Mutex::new(EngineInner {
                    state: EngineState::Initializing,
                    queue: TransferQueue::new(),
                    armed: None,
                }),
                drained: Condvar::new(),
                device,
                display,
                timer,
                events,
                closed: AtomicBool::new(false),
            }
        })
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    /// Number of queued transfers, including the one in flight
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Queued key indices, head first
    pub fn pending_keys(&self) -> Vec<u8> {
        self.inner.lock().queue.key_indices()
    }

    /// Re-initialize the device link
    pub fn reset(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        self.reset_locked(&mut inner)
    }

    /// Queue a transfer, starting it right away if the engine is idle.
    ///
    /// Runs under the state lock; must not be called from an event handler
    /// that the engine itself is dispatching under that lock.
    pub fn enqueue(&self, request: TransferRequest) -> Result<(), TransportError> {
        let key_index = request.key_index;
        let mut inner = self.inner.lock();
        let was_empty = inner.queue.enqueue(request);
        debug!("Queued key {} ({} pending)", key_index, inner.queue.len());

        if was_empty && inner.state != EngineState::Initializing {
            self.start_transfer_locked(&mut inner, key_index)?;
        }
        Ok(())
    }

    /// Device acknowledged initialization (0x11)
    pub fn on_init_ack(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        info!("Device initialized");
        inner.state = EngineState::Idle;

        // Requests queued while initializing are still waiting
        if let Some(key_index) = inner.queue.peek_head().map(|r| r.key_index) {
            self.start_transfer_locked(&mut inner, key_index)?;
        }
        Ok(())
    }

    /// Device is ready for the head request's pixels (0x21 00 00)
    pub fn on_ready_for_pixels(&self) -> Result<(), TransportError> {
        let (key_index, pixels) = {
            let inner = self.inner.lock();
            if inner.state != EngineState::Transferring {
                debug!("Ignoring pixel request in state {:?}", inner.state);
                return Ok(());
            }
            match inner.queue.peek_head() {
                Some(head) => (head.key_index, head.pixels.clone()),
                None => {
                    warn!("Device requested pixels with nothing queued");
                    return Ok(());
                }
            }
        };

        // Only the reader thread removes the head, so it stays valid unlocked
        let frames = commands::build_image_frames(&pixels);
        debug!("Sending {} display frames for key {}", frames.len(), key_index);
        for frame in &frames {
            self.display.write(frame)?;
        }
        Ok(())
    }

    /// Device finished the in-flight transfer (0x21 00 FF)
    pub fn on_transfer_complete(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.state != EngineState::Transferring {
            debug!("Ignoring transfer completion in state {:?}", inner.state);
            return Ok(());
        }

        self.timer.cancel();
        inner.armed = None;

        if let Some(done) = inner.queue.dequeue_head() {
            debug!("Transfer complete for key {}", done.key_index);
        }

        match inner.queue.peek_head().map(|r| r.key_index) {
            Some(next) => self.start_transfer_locked(&mut inner, next)?,
            None => {
                inner.state = EngineState::Idle;
                self.drained.notify_all();
            }
        }
        Ok(())
    }

    /// Block until the queue is empty. Returns `false` on timeout or close.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !inner.queue.is_empty() {
            if self.closed.load(Ordering::Relaxed) {
                return false;
            }
            if self.drained.wait_until(&mut inner, deadline).timed_out() {
                return inner.queue.is_empty();
            }
        }
        true
    }

    /// Stop the recovery timer; later firings and waits return immediately
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.timer.shutdown();
        let _inner = self.inner.lock();
        self.drained.notify_all();
    }

    fn reset_locked(&self, inner: &mut EngineInner) -> Result<(), TransportError> {
        self.timer.cancel();
        inner.armed = None;
        inner.state = EngineState::Initializing;
        debug!("Sending init report");
        self.device.write(&commands::build_init())?;
        Ok(())
    }

    fn start_transfer_locked(
        &self,
        inner: &mut EngineInner,
        key_index: u8,
    ) -> Result<(), TransportError> {
        inner.armed = Some(self.timer.arm());
        inner.state = EngineState::Transferring;
        debug!("Starting transfer for key {}", key_index);
        self.device.write(&commands::build_begin_transfer(key_index))?;
        Ok(())
    }

    fn on_recovery_timeout(&self, generation: u64) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.armed != Some(generation) {
            debug!("Ignoring stale recovery timer (generation {})", generation);
            return;
        }

        warn!(
            "Transfer for key {:?} not acknowledged within {:?}, reinitializing",
            inner.queue.peek_head().map(|r| r.key_index),
            self.timer.timeout()
        );
        if let Err(e) = self.reset_locked(&mut inner) {
            drop(inner);
            error!("Recovery reset failed: {}", e);
            self.events.emit(&PadEvent::Error(e.into()));
        }
    }
}

impl Drop for ProtocolEngine {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mock::MockTransport;
    use crate::hid::pixels::PixelBuffer;
    use crate::hid::protocol::{INIT_REPORT, KEY_INDEX_OFFSET};

    struct Harness {
        device: Arc<MockTransport>,
        display: Arc<MockTransport>,
        engine: Arc<ProtocolEngine>,
    }

    fn harness(recovery_timeout_ms: u64) -> Harness {
        let device = Arc::new(MockTransport::new());
        let display = Arc::new(MockTransport::new());
        let config = EngineConfig {
            recovery_timeout_ms,
            ..EngineConfig::default()
        };
        let engine = ProtocolEngine::new(
            device.clone(),
            display.clone(),
            Arc::new(EventDispatcher::new()),
            &config,
        );
        Harness {
            device,
            display,
            engine,
        }
    }

    fn request(key_index: u8) -> TransferRequest {
        TransferRequest {
            key_index,
            pixels: PixelBuffer::empty(),
        }
    }

    fn begin_keys(writes: &[Vec<u8>]) -> Vec<u8> {
        writes
            .iter()
            .filter(|w| w.len() > KEY_INDEX_OFFSET && w[1] == 0x21)
            .map(|w| w[KEY_INDEX_OFFSET])
            .collect()
    }

    #[test]
    fn test_reset_writes_init() {
        let h = harness(1000);
        assert_eq!(h.engine.state(), EngineState::Initializing);
        h.engine.reset().unwrap();
        assert_eq!(h.device.writes(), vec![INIT_REPORT.to_vec()]);
        assert_eq!(h.engine.state(), EngineState::Initializing);
    }

    #[test]
    fn test_enqueue_while_initializing_waits_for_ack() {
        let h = harness(1000);
        h.engine.reset().unwrap();
        h.device.take_writes();

        h.engine.enqueue(request(4)).unwrap();
        assert!(h.device.writes().is_empty());

        h.engine.on_init_ack().unwrap();
        assert_eq!(begin_keys(&h.device.writes()), vec![4]);
        assert_eq!(h.engine.state(), EngineState::Transferring);
    }

    #[test]
    fn test_one_transfer_in_flight_fifo() {
        let h = harness(1000);
        h.engine.on_init_ack().unwrap();

        for key in [2, 0, 9] {
            h.engine.enqueue(request(key)).unwrap();
        }
        assert_eq!(begin_keys(&h.device.writes()), vec![2]);

        h.engine.on_transfer_complete().unwrap();
        assert_eq!(begin_keys(&h.device.writes()), vec![2, 0]);

        h.engine.on_transfer_complete().unwrap();
        h.engine.on_transfer_complete().unwrap();
        assert_eq!(begin_keys(&h.device.writes()), vec![2, 0, 9]);
        assert_eq!(h.engine.state(), EngineState::Idle);
        assert_eq!(h.engine.pending(), 0);
    }

    #[test]
    fn test_ready_for_pixels_writes_frames() {
        let h = harness(1000);
        h.engine.on_init_ack().unwrap();
        let pixels = PixelBuffer::solid_color(0, 0, 255).unwrap();
        h.engine
            .enqueue(TransferRequest {
                key_index: 1,
                pixels: pixels.clone(),
            })
            .unwrap();

        h.engine.on_ready_for_pixels().unwrap();
        assert_eq!(h.display.writes(), commands::build_image_frames(&pixels));
        assert_eq!(h.engine.pending(), 1);
    }

    #[test]
    fn test_acks_without_transfer_are_ignored() {
        let h = harness(1000);
        h.engine.on_init_ack().unwrap();
        h.engine.on_ready_for_pixels().unwrap();
        h.engine.on_transfer_complete().unwrap();
        assert!(h.display.writes().is_empty());
        assert_eq!(h.engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_stalled_transfer_resets_and_retries_head() {
        let h = harness(50);
        h.engine.on_init_ack().unwrap();
        h.engine.enqueue(request(6)).unwrap();
        assert_eq!(h.device.take_writes().len(), 1);

        // No acknowledgement: the recovery timer re-sends init
        assert!(h.device.wait_for_writes(1, Duration::from_secs(2)));
        assert_eq!(h.device.take_writes(), vec![INIT_REPORT.to_vec()]);
        assert_eq!(h.engine.state(), EngineState::Initializing);
        assert_eq!(h.engine.pending_keys(), vec![6]);

        h.engine.on_init_ack().unwrap();
        assert_eq!(begin_keys(&h.device.take_writes()), vec![6]);
        h.engine.on_transfer_complete().unwrap();
        assert_eq!(h.engine.pending(), 0);
    }

    #[test]
    fn test_completed_transfer_disarms_timer() {
        let h = harness(50);
        h.engine.on_init_ack().unwrap();
        h.engine.enqueue(request(0)).unwrap();
        h.engine.on_transfer_complete().unwrap();
        h.device.take_writes();

        std::thread::sleep(Duration::from_millis(150));
        assert!(h.device.writes().is_empty());
        assert_eq!(h.engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_wait_until_idle() {
        let h = harness(1000);
        assert!(h.engine.wait_until_idle(Duration::from_millis(10)));

        h.engine.on_init_ack().unwrap();
        h.engine.enqueue(request(3)).unwrap();
        assert!(!h.engine.wait_until_idle(Duration::from_millis(20)));

        let engine = Arc::clone(&h.engine);
        let completer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            engine.on_transfer_complete().unwrap();
        });
        assert!(h.engine.wait_until_idle(Duration::from_secs(2)));
        completer.join().unwrap();
    }

    #[test]
    fn test_failed_begin_transfer_surfaces_error() {
        let h = harness(1000);
        h.engine.on_init_ack().unwrap();
        h.device.set_fail_writes(true);
        assert_eq!(
            h.engine.enqueue(request(1)),
            Err(TransportError::Disconnected)
        );
        assert_eq!(h.engine.pending(), 1);
    }
}
