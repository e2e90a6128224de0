//! Outbound report builders

use super::pixels::PixelBuffer;
use super::protocol::{
    BEGIN_TRANSFER_LEN, BEGIN_TRANSFER_REPORT, CHUNK_SIZE, HEADER_SIZE, INIT_REPORT,
    INIT_REPORT_LEN, KEY_INDEX_OFFSET,
};

/// Framing byte in front of each display chunk
const CHUNK_PREFIX: u8 = 0x00;

/// Initialization request for the control interface
pub fn build_init() -> [u8; INIT_REPORT_LEN] {
    INIT_REPORT
}

/// Begin-transfer request for one key
pub fn build_begin_transfer(key_index: u8) -> [u8; BEGIN_TRANSFER_LEN] {
    let mut report = BEGIN_TRANSFER_REPORT;
    report[KEY_INDEX_OFFSET] = key_index;
    report
}

/// Header block followed by the frame payload
pub fn build_image_payload(pixels: &PixelBuffer) -> Vec<u8> {
    let mut payload = Vec::with_capacity(HEADER_SIZE + pixels.len());
    payload.resize(HEADER_SIZE, 0);
    payload.extend_from_slice(pixels.as_bytes());
    payload
}

/// Display-interface writes for one frame, in order.
///
/// The payload goes out as `CHUNK_SIZE` pieces each prefixed with a framing
/// byte, then once more as a single unprefixed write. The firmware expects
/// both.
pub fn build_image_frames(pixels: &PixelBuffer) -> Vec<Vec<u8>> {
    let payload = build_image_payload(pixels);

    let mut frames: Vec<Vec<u8>> = payload
        .chunks(CHUNK_SIZE)
        .map(|chunk| {
            let mut frame = Vec::with_capacity(chunk.len() + 1);
            frame.push(CHUNK_PREFIX);
            frame.extend_from_slice(chunk);
            frame
        })
        .collect();
    frames.push(payload);
    frames
}
