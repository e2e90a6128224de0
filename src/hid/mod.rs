//! HID module - USB HID communication with the DisplayPad

pub mod commands;
pub mod device;
pub mod discovery;
pub mod engine;
pub mod input;
pub mod mock;
pub mod pixels;
pub mod protocol;
pub mod queue;
pub mod transport;
mod watchdog;

pub use device::DisplayPad;
pub use discovery::{find_device_paths, DevicePaths, Endpoint};
pub use engine::{EngineState, ProtocolEngine};
pub use input::{InputDecoder, ReportListener};
pub use pixels::PixelBuffer;
pub use protocol::{
    ControlReport, ReportType, CHUNK_SIZE, DEVICE_INTERFACE, DISPLAY_INTERFACE, HEADER_SIZE,
    ICON_SIZE, IMAGE_BUFFER_LEN, NUM_KEYS, NUM_KEYS_PER_ROW, NUM_TOTAL_PIXELS, PACKET_SIZE,
    PRODUCT_IDS, REPORT_SIZE, VENDOR_ID,
};
pub use queue::{TransferQueue, TransferRequest};
pub use transport::{HidTransport, HidapiTransport};
