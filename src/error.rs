//! Error types for the DisplayPad driver

use thiserror::Error;

/// Errors raised by a HID transport (read/write on one interface)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HID error: {0}")]
    Hid(String),

    #[error("HID permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Transport closed")]
    Closed,
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::PermissionDenied(msg)
        } else {
            TransportError::Hid(msg)
        }
    }
}

/// Errors surfaced by the public pad API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PadError {
    #[error("Expected a valid color RGB value 0 - 255, got {0}")]
    InvalidColorValue(i32),

    #[error("Expected image buffer of length {expected}, got length {actual}")]
    InvalidBufferLength { expected: usize, actual: usize },

    #[error("Expected a valid keyIndex 0 - {max}, got {index}", max = crate::hid::NUM_KEYS - 1)]
    InvalidKeyIndex { index: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("No DisplayPad connected (VID: 0x{vendor_id:04X})")]
    NoDeviceFound { vendor_id: u16 },

    #[error("No DisplayPad display interface found (interface {0})")]
    NoDisplayInterface(i32),

    #[error("No DisplayPad control interface found (interface {0})")]
    NoControlInterface(i32),

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("HID API error: {0}")]
    HidApi(String),
}

pub type Result<T, E = PadError> = std::result::Result<T, E>;
