//! DisplayPad driver
//!
//! Drives the Mountain DisplayPad: twelve keys, each with its own 102x102 RGB
//! display, over two USB HID interfaces.
//!
//! # Features
//! - Fill keys with solid colors, RGB buffers or image files
//! - Serialized pixel transfers with automatic re-initialization when the
//!   device stalls
//! - Key press/release events via callbacks or a tokio channel
//!
//! ```no_run
//! use displaypad::{DisplayPad, EventKind, PadConfig, PadEvent};
//!
//! let pad = DisplayPad::open(&PadConfig::default())?;
//! pad.on(EventKind::Down, |event| {
//!     if let PadEvent::Down(key) = event {
//!         println!("Key {} pressed", key);
//!     }
//! });
//! pad.clear_all_keys()?;
//! pad.fill_color(0, 255, 0, 0)?;
//! # Ok::<(), displaypad::PadError>(())
//! ```

pub mod core;
pub mod error;
pub mod hid;
pub mod icon;

pub use self::core::config::{EngineConfig, HidConfig, PadConfig};
pub use self::core::events::{EventDispatcher, EventKind, PadEvent};
pub use error::{PadError, TransportError};
pub use hid::{DisplayPad, EngineState, PixelBuffer};
pub use icon::{IconLoader, ImageDecoder};
