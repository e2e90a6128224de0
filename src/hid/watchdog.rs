//! Recovery timer for stalled transfers
//!
//! A single watchdog thread sleeps until the armed deadline. Every `arm()`
//! bumps a generation counter and the fire callback receives the generation
//! that expired, so a late firing can be told apart from the current one.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

struct TimerSlot {
    deadline: Option<Instant>,
    generation: u64,
    shutdown: bool,
}

struct TimerShared {
    slot: Mutex<TimerSlot>,
    wake: Condvar,
}

pub struct RecoveryTimer {
    timeout: Duration,
    shared: Arc<TimerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RecoveryTimer {
    /// Start the watchdog thread. `on_fire` runs on that thread, without any
    /// timer lock held.
    pub fn spawn<F>(timeout: Duration, on_fire: F) -> Self
    where
        F: Fn(u64) + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            slot: Mutex::new(TimerSlot {
                deadline: None,
                generation: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || run_watchdog(&worker_shared, on_fire));

        Self {
            timeout,
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arm (or re-arm) the timer. Returns the new generation.
    pub fn arm(&self) -> u64 {
        let mut slot = self.shared.slot.lock();
        slot.generation += 1;
        slot.deadline = Some(Instant::now() + self.timeout);
        self.shared.wake.notify_one();
        slot.generation
    }

    pub fn cancel(&self) {
        let mut slot = self.shared.slot.lock();
        if slot.deadline.take().is_some() {
            self.shared.wake.notify_one();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.shared.slot.lock().deadline.is_some()
    }

    /// Stop the watchdog thread. Pending deadlines never fire afterwards.
    pub fn shutdown(&self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            slot.deadline = None;
            self.shared.wake.notify_one();
        }

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        // The last engine handle may be dropped from inside the callback.
        if worker.thread().id() != thread::current().id() {
            let _ = worker.join();
        }
    }
}

impl Drop for RecoveryTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_watchdog<F: Fn(u64)>(shared: &TimerShared, on_fire: F) {
    let mut slot: MutexGuard<'_, TimerSlot> = shared.slot.lock();
    while !slot.shutdown {
        let deadline = slot.deadline;
        match deadline {
            None => shared.wake.wait(&mut slot),
            Some(deadline) if Instant::now() >= deadline => {
                slot.deadline = None;
                let generation = slot.generation;
                debug!("Recovery timer fired (generation {})", generation);
                MutexGuard::unlocked(&mut slot, || on_fire(generation));
            }
            Some(deadline) => {
                shared.wake.wait_until(&mut slot, deadline);
            }
        }
    }
    debug!("Recovery watchdog stopped");
}
