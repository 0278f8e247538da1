//! Uploaded file playback using FFmpeg.
//!
//! Decodes the best video stream of any container FFmpeg understands and
//! converts each picture to RGB24. Playback ends at end of file.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::time::{Duration, Instant};

use super::file::FileConfig;
use crate::frame::{Frame, FrameStats};

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    flush: Flush,
    ended: bool,
}

/// End-of-input flush. FFmpeg accepts EOF once per decoder; afterwards the
/// decoder only hands out the pictures it still holds.
#[derive(Debug, Default)]
struct Flush {
    sent: bool,
}

impl Flush {
    /// True the first time only: the caller must send EOF now.
    fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.sent, true)
    }

    fn is_sent(&self) -> bool {
        self.sent
    }
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open uploaded video '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            last_frame_at: None,
            connected_at: None,
            flush: Flush::default(),
            ended: false,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        self.connected_at = Some(Instant::now());
        log::info!("FileSource: opened {} (ffmpeg)", self.config.path);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.ended {
            return Ok(None);
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        // Drain pictures the decoder already holds before feeding more packets.
        if self.decoder.receive_frame(&mut decoded).is_ok() {
            return self.convert(&decoded, &mut rgb_frame).map(Some);
        }

        if !self.flush.is_sent() {
            let mut received = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                if self.decoder.receive_frame(&mut decoded).is_ok() {
                    received = true;
                    break;
                }
            }
            if received {
                return self.convert(&decoded, &mut rgb_frame).map(Some);
            }

            if self.flush.begin() {
                self.decoder.send_eof().context("flush ffmpeg decoder")?;
            }
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded, &mut rgb_frame).map(Some);
            }
        }

        // Flushed and drained: a failed receive is the end of the file.
        self.ended = true;
        log::info!(
            "FileSource: {} ended after {} frames",
            self.config.path,
            self.frame_count
        );
        Ok(None)
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.ended {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= crate::ingest::network::health_grace(self.config.target_fps)
    }

    pub(crate) fn stats(&self) -> FrameStats {
        FrameStats {
            frames_captured: self.frame_count,
            origin: self.config.path.clone(),
        }
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg::frame::Video,
        rgb_frame: &mut ffmpeg::frame::Video,
    ) -> Result<Frame> {
        self.scaler
            .run(decoded, rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(rgb_frame)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Frame::new(pixels, width, height, self.frame_count)
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
