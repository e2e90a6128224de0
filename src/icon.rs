//! Key icon loading

use crate::error::{PadError, Result};
use crate::hid::ICON_SIZE;
use image::imageops::FilterType;
use std::path::Path;

/// Decodes an image file into a packed RGB buffer of `width * height * 3` bytes
pub trait ImageDecoder: Send + Sync {
    fn load_and_resize(&self, path: &Path, width: u32, height: u32) -> Result<Vec<u8>>;
}

/// `image`-crate decoder (PNG and JPEG)
#[derive(Debug, Clone, Copy)]
pub struct IconLoader {
    filter: FilterType,
}

impl Default for IconLoader {
    fn default() -> Self {
        Self {
            filter: FilterType::CatmullRom,
        }
    }
}

impl IconLoader {
    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Load an icon sized for one key
    pub fn load_icon(&self, path: &Path) -> Result<Vec<u8>> {
        self.load_and_resize(path, ICON_SIZE as u32, ICON_SIZE as u32)
    }
}

impl ImageDecoder for IconLoader {
    fn load_and_resize(&self, path: &Path, width: u32, height: u32) -> Result<Vec<u8>> {
        let img = image::open(path)
            .map_err(|e| PadError::ImageDecode(format!("{}: {}", path.display(), e)))?;
        Ok(img.resize_exact(width, height, self.filter).to_rgb8().into_raw())
    }
}
