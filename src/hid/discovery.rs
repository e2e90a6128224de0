//! Locate and open the DisplayPad's two HID interfaces

use super::transport::HidapiTransport;
use crate::core::config::HidConfig;
use crate::error::{PadError, Result};
use hidapi::{DeviceInfo, HidApi};
use std::ffi::CString;
use tracing::{debug, info};

/// One enumerated HID interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface_number: i32,
    pub path: CString,
}

impl From<&DeviceInfo> for Endpoint {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            interface_number: info.interface_number(),
            path: info.path().to_owned(),
        }
    }
}

/// Paths of the display and control interfaces of one pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    pub display: CString,
    pub device: CString,
}

/// Pick the display and control interfaces from an enumeration.
///
/// The first matching endpoint wins for each interface.
pub fn find_device_paths<I>(endpoints: I, config: &HidConfig) -> Result<DevicePaths>
where
    I: IntoIterator<Item = Endpoint>,
{
    let pads: Vec<Endpoint> = endpoints
        .into_iter()
        .filter(|e| e.vendor_id == config.vendor_id && config.product_ids.contains(&e.product_id))
        .collect();

    if pads.is_empty() {
        return Err(PadError::NoDeviceFound {
            vendor_id: config.vendor_id,
        });
    }

    let interface_path = |number: i32| {
        pads.iter()
            .find(|e| e.interface_number == number)
            .map(|e| e.path.clone())
    };

    let display = interface_path(config.display_interface)
        .ok_or(PadError::NoDisplayInterface(config.display_interface))?;
    let device = interface_path(config.device_interface)
        .ok_or(PadError::NoControlInterface(config.device_interface))?;

    Ok(DevicePaths { display, device })
}

/// Enumerate, select and open both interfaces. Returns `(device, display)`.
pub fn open_device_pair(
    api: &HidApi,
    config: &HidConfig,
) -> Result<(HidapiTransport, HidapiTransport)> {
    let endpoints = api.device_list().map(Endpoint::from);
    let paths = find_device_paths(endpoints, config)?;
    debug!("DisplayPad paths: {:?}", paths);

    let display = api
        .open_path(&paths.display)
        .map_err(|e| PadError::HidApi(format!("Failed to open display interface: {}", e)))?;
    let device = api
        .open_path(&paths.device)
        .map_err(|e| PadError::HidApi(format!("Failed to open control interface: {}", e)))?;

    info!(
        "Opened DisplayPad: {} {}",
        device
            .get_manufacturer_string()
            .ok()
            .flatten()
            .unwrap_or_else(|| "Unknown".to_string()),
        device
            .get_product_string()
            .ok()
            .flatten()
            .unwrap_or_else(|| "Unknown".to_string())
    );

    Ok((
        HidapiTransport::new("control", device),
        HidapiTransport::new("display", display),
    ))
}
