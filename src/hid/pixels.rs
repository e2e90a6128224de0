//! Pixel codec: RGB input to the device's BGR wire frame

use super::protocol::{ICON_SIZE, IMAGE_BUFFER_LEN, PACKET_SIZE};
use crate::error::{PadError, Result};
use std::fmt;
use std::sync::Arc;

/// One key's frame in wire byte order, always [`PACKET_SIZE`] bytes.
///
/// Immutable and cheap to clone, so the same frame can be queued for
/// several keys without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Arc<[u8]>,
}

impl PixelBuffer {
    /// Solid fill. Each channel must lie in 0..=255.
    ///
    /// The frame is built from repeated `(b, g, r)` triples; the trailing
    /// byte that does not complete a triple stays zero.
    pub fn solid_color(r: i32, g: i32, b: i32) -> Result<Self> {
        let (r, g, b) = (channel(r)?, channel(g)?, channel(b)?);

        let mut data = vec![0u8; PACKET_SIZE];
        for pixel in data.chunks_exact_mut(3) {
            pixel.copy_from_slice(&[b, g, r]);
        }
        Ok(Self { data: data.into() })
    }

    /// Convert a row-major RGB icon of `ICON_SIZE x ICON_SIZE` pixels.
    ///
    /// Red and blue are swapped per pixel; the rest of the frame past the
    /// icon data is zero.
    pub fn from_image(buffer: &[u8]) -> Result<Self> {
        if buffer.len() != IMAGE_BUFFER_LEN {
            return Err(PadError::InvalidBufferLength {
                expected: IMAGE_BUFFER_LEN,
                actual: buffer.len(),
            });
        }

        let mut data = vec![0u8; PACKET_SIZE];
        let row_len = ICON_SIZE * 3;
        for (src_row, dst_row) in buffer
            .chunks_exact(row_len)
            .zip(data.chunks_exact_mut(row_len))
        {
            for (src, dst) in src_row.chunks_exact(3).zip(dst_row.chunks_exact_mut(3)) {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            }
        }
        Ok(Self { data: data.into() })
    }

    /// All-zero frame (key cleared)
    pub fn empty() -> Self {
        Self {
            data: vec![0u8; PACKET_SIZE].into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether every byte is zero
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("len", &self.data.len())
            .field("head", &&self.data[..self.data.len().min(6)])
            .finish()
    }
}

fn channel(value: i32) -> Result<u8> {
    u8::try_from(value).map_err(|_| PadError::InvalidColorValue(value))
}
