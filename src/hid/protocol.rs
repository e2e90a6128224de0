//! HID protocol definitions for DisplayPad communication
//!
//! Two HID interfaces are used:
//! - Control ("device") interface 3: init / begin-transfer requests out,
//!   button-state and acknowledgement reports in
//! - Display interface 1: raw image frames out
//!
//! Inbound reports carry their type in byte 0.

/// Number of keys on the pad
pub const NUM_KEYS: usize = 12;

/// Keys per physical row
pub const NUM_KEYS_PER_ROW: usize = 6;

/// Size of one key's pixel frame on the wire
pub const PACKET_SIZE: usize = 31438;

/// Size of the (zeroed) header block sent ahead of the pixel payload
pub const HEADER_SIZE: usize = 306;

/// Key icon edge length in pixels
pub const ICON_SIZE: usize = 102;

/// Pixels per key icon
pub const NUM_TOTAL_PIXELS: usize = ICON_SIZE * ICON_SIZE;

/// Length of an RGB image buffer accepted for one key
pub const IMAGE_BUFFER_LEN: usize = NUM_TOTAL_PIXELS * 3;

/// Display-channel chunk size (before the framing byte)
pub const CHUNK_SIZE: usize = 1024;

/// Read size for control-channel reports
pub const REPORT_SIZE: usize = 64;

/// USB Vendor ID (Mountain)
pub const VENDOR_ID: u16 = 0x3282;

/// Known DisplayPad product IDs
pub const PRODUCT_IDS: &[u16] = &[0x0009];

/// HID interface carrying image frames
pub const DISPLAY_INTERFACE: i32 = 1;

/// HID interface carrying control reports
pub const DEVICE_INTERFACE: i32 = 3;

/// Offset of the key index within [`BEGIN_TRANSFER_REPORT`]
pub const KEY_INDEX_OFFSET: usize = 5;

/// Length of [`INIT_REPORT`]
pub const INIT_REPORT_LEN: usize = 64;

/// Length of [`BEGIN_TRANSFER_REPORT`]
pub const BEGIN_TRANSFER_LEN: usize = 65;

/// Device initialization request
pub const INIT_REPORT: [u8; INIT_REPORT_LEN] = report_template(&[0x00, 0x11, 0x80, 0x00, 0x00, 0x01]);

/// Begin-transfer request; byte [`KEY_INDEX_OFFSET`] is patched with the key index
pub const BEGIN_TRANSFER_REPORT: [u8; BEGIN_TRANSFER_LEN] = report_template(&[
    0x00, 0x21, 0x00, 0x00, 0x00, 0xFF, 0x3D, 0x00, 0x00, 0x65, 0x65,
]);

const _: () = assert!(IMAGE_BUFFER_LEN <= PACKET_SIZE);
const _: () = assert!(NUM_KEYS <= u8::MAX as usize);

/// Zero-filled report with the given prefix
const fn report_template<const N: usize>(prefix: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let mut i = 0;
    while i < prefix.len() {
        out[i] = prefix[i];
        i += 1;
    }
    out
}

/// Inbound report types (byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReportType {
    /// Button state snapshot
    ButtonState = 0x01,
    /// Initialization acknowledged
    InitAck = 0x11,
    /// Transfer acknowledgement (sub-code in bytes 1-2)
    TransferAck = 0x21,
}

impl ReportType {
    /// Convert report type to byte value
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Parse report type from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(ReportType::ButtonState),
            0x11 => Some(ReportType::InitAck),
            0x21 => Some(ReportType::TransferAck),
            _ => None,
        }
    }
}

/// A classified control-channel report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReport<'a> {
    /// Button state snapshot (full report bytes)
    ButtonState(&'a [u8]),
    /// Device finished initializing
    InitAck,
    /// Device is ready to receive pixels for the in-flight transfer
    ReadyForPixels,
    /// Device finished receiving the in-flight transfer
    TransferComplete,
    /// Anything else; ignored
    Unknown,
}

impl<'a> ControlReport<'a> {
    /// Classify a raw report
    pub fn parse(data: &'a [u8]) -> Self {
        let Some(report_type) = data.first().copied().and_then(ReportType::from_byte) else {
            return ControlReport::Unknown;
        };

        match report_type {
            ReportType::ButtonState => ControlReport::ButtonState(data),
            ReportType::InitAck => ControlReport::InitAck,
            ReportType::TransferAck => match (data.get(1).copied(), data.get(2).copied()) {
                (Some(0x00), Some(0x00)) => ControlReport::ReadyForPixels,
                (Some(0x00), Some(0xFF)) => ControlReport::TransferComplete,
                _ => ControlReport::Unknown,
            },
        }
    }
}
