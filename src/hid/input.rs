//! Inbound report handling: key state decoding and report dispatch

use super::engine::ProtocolEngine;
use super::protocol::{ControlReport, NUM_KEYS};
use crate::core::events::PadEvent;
use crate::error::TransportError;
use std::sync::Arc;
use tracing::{debug, trace};

/// (report byte, bitmask) for device keys 1..=12
const KEY_BITS: [(usize, u8); NUM_KEYS] = [
    // Row 1
    (42, 0x02),
    (42, 0x04),
    (42, 0x08),
    (42, 0x10),
    (42, 0x20),
    (42, 0x40),
    // Row 2
    (42, 0x80),
    (47, 0x01),
    (47, 0x02),
    (47, 0x04),
    (47, 0x08),
    (47, 0x10),
];

/// Smallest button-state report that covers every key bit
const MIN_BUTTON_REPORT_LEN: usize = 48;

/// Tracks key press state and turns snapshots into edge events.
///
/// The device repeats steady state on every poll; only changes produce
/// events.
#[derive(Debug, Clone)]
pub struct InputDecoder {
    /// Indexed by device key number (1-based); slot 0 unused
    key_state: [bool; NUM_KEYS + 1],
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDecoder {
    pub fn new() -> Self {
        Self {
            key_state: [false; NUM_KEYS + 1],
        }
    }

    /// Whether the key (zero-based) was last seen pressed
    pub fn is_pressed(&self, key_index: usize) -> bool {
        self.key_state.get(key_index + 1).copied().unwrap_or(false)
    }

    /// Apply a button-state report, returning one event per changed key
    pub fn decode(&mut self, report: &[u8]) -> Vec<PadEvent> {
        if report.len() < MIN_BUTTON_REPORT_LEN {
            debug!("Short button report ({} bytes), ignoring", report.len());
            return Vec::new();
        }

        let mut events = Vec::new();
        for (i, &(byte, mask)) in KEY_BITS.iter().enumerate() {
            let device_key = i + 1;
            let pressed = report[byte] & mask != 0;
            if pressed != self.key_state[device_key] {
                self.key_state[device_key] = pressed;
                events.push(if pressed {
                    PadEvent::Down(i)
                } else {
                    PadEvent::Up(i)
                });
            }
        }
        events
    }
}

/// Routes control-channel reports read by the background loop.
///
/// Owns the key state, so decoding needs no lock.
pub struct ReportListener {
    engine: Arc<ProtocolEngine>,
    decoder: InputDecoder,
}

impl ReportListener {
    pub fn new(engine: Arc<ProtocolEngine>) -> Self {
        Self {
            engine,
            decoder: InputDecoder::new(),
        }
    }

    pub fn decoder(&self) -> &InputDecoder {
        &self.decoder
    }

    /// Handle one report. An error means a transport write failed.
    pub fn dispatch(&mut self, report: &[u8]) -> Result<(), TransportError> {
        match ControlReport::parse(report) {
            ControlReport::ButtonState(data) => {
                for event in self.decoder.decode(data) {
                    debug!("Key event: {:?}", event);
                    self.engine.events().emit(&event);
                }
                Ok(())
            }
            ControlReport::InitAck => self.engine.on_init_ack(),
            ControlReport::ReadyForPixels => self.engine.on_ready_for_pixels(),
            ControlReport::TransferComplete => self.engine.on_transfer_complete(),
            ControlReport::Unknown => {
                trace!("Ignoring report {:02X?}", &report[..report.len().min(3)]);
                Ok(())
            }
        }
    }
}
