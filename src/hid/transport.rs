//! Byte transport for one HID interface

use crate::error::TransportError;
use hidapi::HidDevice;
use parking_lot::Mutex;
use tracing::{debug, info};

/// A duplex connection to one HID interface.
///
/// `read_timeout` returns `Ok(0)` when nothing arrived within the timeout;
/// an `Err` means the interface is gone.
pub trait HidTransport: Send + Sync {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;

    fn close(&self);
}

/// `hidapi`-backed transport
pub struct HidapiTransport {
    /// Interface role, for logs
    label: &'static str,
    /// Open device handle; `None` once closed
    device: Mutex<Option<HidDevice>>,
}

impl HidapiTransport {
    pub fn new(label: &'static str, device: HidDevice) -> Self {
        Self {
            label,
            device: Mutex::new(Some(device)),
        }
    }
}

impl HidTransport for HidapiTransport {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let guard = self.device.lock();
        let device = guard.as_ref().ok_or(TransportError::Closed)?;
        let written = device.write(data)?;
        debug!("Wrote {} bytes to {} interface", written, self.label);
        Ok(written)
    }

    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        let guard = self.device.lock();
        let device = guard.as_ref().ok_or(TransportError::Closed)?;
        Ok(device.read_timeout(buf, timeout_ms)?)
    }

    fn close(&self) {
        if self.device.lock().take().is_some() {
            info!("Closed {} interface", self.label);
        }
    }
}
