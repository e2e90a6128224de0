//! In-memory transport for running the engine without hardware

use super::transport::HidTransport;
use crate::error::TransportError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Records every write and replays injected reports on read
#[derive(Default)]
pub struct MockTransport {
    written: Mutex<Vec<Vec<u8>>>,
    write_signal: Condvar,
    inbox: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    inbox_signal: Condvar,
    closed: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a report for the next read
    pub fn push_report(&self, report: &[u8]) {
        self.inbox.lock().push_back(Ok(report.to_vec()));
        self.inbox_signal.notify_all();
    }

    /// Make a future read fail
    pub fn push_error(&self, error: TransportError) {
        self.inbox.lock().push_back(Err(error));
        self.inbox_signal.notify_all();
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Snapshot of everything written so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }

    /// Drain recorded writes
    pub fn take_writes(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.written.lock())
    }

    pub fn write_count(&self) -> usize {
        self.written.lock().len()
    }

    /// Block until at least `count` writes are recorded
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut written = self.written.lock();
        while written.len() < count {
            if self.write_signal.wait_until(&mut written, deadline).timed_out() {
                return written.len() >= count;
            }
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl HidTransport for MockTransport {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(TransportError::Disconnected);
        }
        self.written.lock().push(data.to_vec());
        self.write_signal.notify_all();
        Ok(data.len())
    }

    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut inbox = self.inbox.lock();
        if inbox.is_empty() {
            let timeout = Duration::from_millis(timeout_ms.max(0) as u64);
            self.inbox_signal.wait_for(&mut inbox, timeout);
        }

        match inbox.pop_front() {
            Some(Ok(report)) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.inbox_signal.notify_all();
    }
}
