//! DisplayPad handle: public API, background reader and shutdown

use super::discovery;
use super::engine::{EngineState, ProtocolEngine};
use super::input::ReportListener;
use super::pixels::PixelBuffer;
use super::protocol::{ICON_SIZE, NUM_KEYS};
use super::queue::TransferRequest;
use super::transport::HidTransport;
use crate::core::config::{EngineConfig, PadConfig};
use crate::core::events::{EventDispatcher, EventKind, PadEvent};
use crate::error::{PadError, Result, TransportError};
use crate::icon::{IconLoader, ImageDecoder};
use hidapi::HidApi;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Connection to one DisplayPad
pub struct DisplayPad {
    engine: Arc<ProtocolEngine>,
    /// Control interface
    device: Arc<dyn HidTransport>,
    /// Display interface
    display: Arc<dyn HidTransport>,
    /// Whether the reader thread should stop
    stop_listener: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl DisplayPad {
    /// Find the first connected pad and open it
    pub fn open(config: &PadConfig) -> Result<Self> {
        let api = HidApi::new().map_err(|e| PadError::HidApi(e.to_string()))?;
        let (device, display) = discovery::open_device_pair(&api, &config.hid)?;
        Self::with_transports(Arc::new(device), Arc::new(display), &config.engine)
    }

    /// Drive a pad over already-open transports.
    ///
    /// Starts the background reader and sends the init report.
    pub fn with_transports(
        device: Arc<dyn HidTransport>,
        display: Arc<dyn HidTransport>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let events = Arc::new(EventDispatcher::new());
        let engine = ProtocolEngine::new(
            Arc::clone(&device),
            Arc::clone(&display),
            events,
            config,
        );

        let stop_listener = Arc::new(AtomicBool::new(false));
        let listener = spawn_listener(
            Arc::clone(&engine),
            Arc::clone(&device),
            Arc::clone(&stop_listener),
            config,
        );

        let pad = Self {
            engine,
            device,
            display,
            stop_listener,
            listener: Mutex::new(Some(listener)),
            closed: AtomicBool::new(false),
        };

        pad.engine.reset()?;
        info!("DisplayPad ready");
        Ok(pad)
    }

    /// Fill a key with a solid color. Channels must be 0-255.
    pub fn fill_color(&self, key_index: usize, r: i32, g: i32, b: i32) -> Result<()> {
        let key = check_key_index(key_index)?;
        let pixels = PixelBuffer::solid_color(r, g, b)?;
        self.write_pixel_data(key, pixels)
    }

    /// Show an RGB icon (`ICON_SIZE x ICON_SIZE`, row-major) on a key
    pub fn fill_image(&self, key_index: usize, rgb: &[u8]) -> Result<()> {
        let key = check_key_index(key_index)?;
        let pixels = PixelBuffer::from_image(rgb)?;
        self.write_pixel_data(key, pixels)
    }

    /// Load, resize and show an image file on a key
    pub fn fill_image_file(&self, key_index: usize, path: &Path) -> Result<()> {
        self.fill_image_with(key_index, path, &IconLoader::default())
    }

    pub fn fill_image_with(
        &self,
        key_index: usize,
        path: &Path,
        decoder: &dyn ImageDecoder,
    ) -> Result<()> {
        check_key_index(key_index)?;
        let rgb = decoder.load_and_resize(path, ICON_SIZE as u32, ICON_SIZE as u32)?;
        self.fill_image(key_index, &rgb)
    }

    pub fn clear_key(&self, key_index: usize) -> Result<()> {
        let key = check_key_index(key_index)?;
        self.write_pixel_data(key, PixelBuffer::empty())
    }

    /// Queue a blank frame for every key, one transfer each
    pub fn clear_all_keys(&self) -> Result<()> {
        let empty = PixelBuffer::empty();
        for key in 0..NUM_KEYS as u8 {
            self.write_pixel_data(key, empty.clone())?;
        }
        Ok(())
    }

    /// Register an event handler. Handlers run on the reader thread and must
    /// not block it for long.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&PadEvent) + Send + Sync + 'static,
    {
        self.engine.events().on(kind, handler);
    }

    /// Receive all events through a channel
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PadEvent> {
        self.engine.events().subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    /// Transfers queued or in flight
    pub fn pending_transfers(&self) -> usize {
        self.engine.pending()
    }

    /// Block until every queued transfer is acknowledged
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.engine.wait_until_idle(timeout)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Stop the reader and recovery timer, then close both interfaces
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::Relaxed) {
            return;
        }

        self.stop_listener.store(true, Ordering::Relaxed);
        self.engine.shutdown();

        if let Some(listener) = self.listener.lock().take() {
            // close() may be called from an event handler on the reader thread
            if listener.thread().id() != thread::current().id() {
                let _ = listener.join();
            }
        }

        self.device.close();
        self.display.close();
        info!("DisplayPad closed");
    }

    fn write_pixel_data(&self, key_index: u8, pixels: PixelBuffer) -> Result<()> {
        if self.is_closed() {
            return Err(PadError::Transport(TransportError::Closed));
        }
        self.engine.enqueue(TransferRequest { key_index, pixels })?;
        Ok(())
    }
}

impl Drop for DisplayPad {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_key_index(key_index: usize) -> Result<u8> {
    if key_index < NUM_KEYS {
        Ok(key_index as u8)
    } else {
        Err(PadError::InvalidKeyIndex { index: key_index })
    }
}

/// Background reader: poll the control interface until stopped or failed
fn spawn_listener(
    engine: Arc<ProtocolEngine>,
    device: Arc<dyn HidTransport>,
    stop: Arc<AtomicBool>,
    config: &EngineConfig,
) -> JoinHandle<()> {
    let read_timeout_ms = config.read_timeout_ms;
    let read_size = config.report_read_size;

    thread::spawn(move || {
        info!("DisplayPad reader thread started");
        let mut listener = ReportListener::new(Arc::clone(&engine));
        let mut buffer = vec![0u8; read_size];

        while !stop.load(Ordering::Relaxed) {
            let result = match device.read_timeout(&mut buffer, read_timeout_ms) {
                Ok(0) => continue,
                Ok(n) => listener.dispatch(&buffer[..n]),
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                error!("DisplayPad transport failed: {}", e);
                engine.events().emit(&PadEvent::Error(e.into()));
                break;
            }
        }
        debug!("DisplayPad reader thread stopped");
    })
}
