//! Decoded video frames.
//!
//! - `Frame`: one RGB24 picture produced by a source, plus its sequence number.
//! - `FrameStats`: running counters shared by every source flavour.
//!
//! Frames flow from `ingest` into the detection loop by value. The overlay
//! renderer borrows the pixels once per tick and the frame is dropped afterwards;
//! nothing keeps decoded frames beyond the current tick.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::Instant;

/// One decoded RGB24 frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1-based position of this frame in its source.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap packed RGB24 pixels. Fails if the buffer does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// Packed RGB24 pixels, row major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Milliseconds since the source produced this frame.
    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }

    /// Consume the frame into an `image` buffer for drawing.
    pub fn into_image(self) -> Result<RgbImage> {
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.data)
            .ok_or_else(|| anyhow!("frame buffer does not fit {}x{}", width, height))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Counters reported by every frame source.
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    pub frames_captured: u64,
    /// Device path, URL or file path the frames come from.
    pub origin: String,
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(3))
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))
}

/// Deterministic test pattern used by every `stub://` source.
pub(crate) fn synthetic_pixels(width: u32, height: u32, frame_count: u64) -> Vec<u8> {
    let pixel_count = (width as usize) * (height as usize) * 3;
    let mut pixels = vec![0u8; pixel_count];
    for (i, pixel) in pixels.iter_mut().enumerate() {
        *pixel = ((i as u64 + frame_count) % 256) as u8;
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, 1).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2, 1).is_ok());
    }

    #[test]
    fn frame_converts_to_image() -> Result<()> {
        let frame = Frame::new(synthetic_pixels(4, 3, 0), 4, 3, 7)?;
        assert_eq!(frame.sequence, 7);
        let image = frame.into_image()?;
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(1, 0).0, [3, 4, 5]);
        Ok(())
    }

    #[test]
    fn synthetic_pixels_shift_with_frame_count() {
        let a = synthetic_pixels(2, 2, 0);
        let b = synthetic_pixels(2, 2, 1);
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }
}
