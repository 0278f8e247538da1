//! Motion-JPEG framing shared by the network and file sources.
//!
//! An MJPEG stream is a sequence of complete JPEG images, either bare
//! (`.mjpeg` files, which is also what the recorder writes) or wrapped in
//! `multipart/x-mixed-replace` parts (HTTP camera servers). Both are split the
//! same way: scan for an SOI marker, then for the following EOI marker, and
//! ignore whatever sits between images.

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;
use std::io::Read;

pub(crate) const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

const READ_CHUNK: usize = 8192;

pub(crate) struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    pub(crate) fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Read the next complete JPEG. Returns `None` once the reader is exhausted.
    pub(crate) fn read_next_jpeg(&mut self) -> Result<Option<Vec<u8>>> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(Some(frame));
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

/// Decode a JPEG into packed RGB24 pixels.
pub(crate) fn decode_jpeg(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    if bytes.len() > MAX_JPEG_BYTES {
        return Err(anyhow!(
            "jpeg of {} bytes exceeds the {} byte limit",
            bytes.len(),
            MAX_JPEG_BYTES
        ));
    }
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
        .context("decode jpeg")?;
    let (width, height) = image.dimensions();
    let rgb = image.into_rgb8();
    Ok((rgb.into_raw(), width, height))
}

pub(crate) fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}
