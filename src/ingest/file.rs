//! Uploaded file source.
//!
//! `FileSource` plays back a video file chosen by the user. The file is read in
//! place; nothing is re-encoded or copied.
//! - `.mjpeg` / `.mjpg` files (including recordings made by this crate) are
//!   split and decoded in-process
//! - other containers are decoded with FFmpeg (feature: ingest-file-ffmpeg)
//! - `stub://` paths play a short synthetic clip
//!
//! Unlike a camera, a file ends: `next_frame` returns `None` after the last frame.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::mjpeg::{decode_jpeg, MjpegStream};
use crate::frame::{synthetic_pixels, Frame, FrameStats};

/// Number of frames in a synthetic `stub://` clip.
pub const SYNTHETIC_CLIP_FRAMES: u64 = 50;

/// Configuration for an uploaded file.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "/home/user/clip.mjpeg").
    pub path: String,
    /// Nominal playback rate, used for stall detection.
    pub target_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 10,
        }
    }
}

/// Uploaded file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    Mjpeg(MjpegFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "uploaded video must be a local path (no URL schemes): '{}'",
                config.path
            ));
        }
        if config.path.starts_with("stub://") {
            return Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)),
            });
        }
        if is_mjpeg_path(&config.path) {
            return Ok(Self {
                backend: FileBackend::Mjpeg(MjpegFileSource::new(config)),
            });
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "'{}' is not an MJPEG file; other containers require the ingest-file-ffmpeg feature",
                config.path
            ))
        }
    }

    /// Open the file for playback.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            FileBackend::Mjpeg(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Next frame, or `None` at end of file.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            FileBackend::Mjpeg(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(source) => source.frame_count < SYNTHETIC_CLIP_FRAMES,
            FileBackend::Mjpeg(source) => source.stream.is_some() && !source.ended,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> FrameStats {
        match &self.backend {
            FileBackend::Synthetic(source) => FrameStats {
                frames_captured: source.frame_count,
                origin: source.config.path.clone(),
            },
            FileBackend::Mjpeg(source) => FrameStats {
                frames_captured: source.frame_count,
                origin: source.config.path.clone(),
            },
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic clip (stub://) for tests
// ----------------------------------------------------------------------------

const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;

struct SyntheticFileSource {
    config: FileConfig,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: opened {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= SYNTHETIC_CLIP_FRAMES {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = synthetic_pixels(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, self.frame_count);
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, self.frame_count).map(Some)
    }
}

// ----------------------------------------------------------------------------
// MJPEG file
// ----------------------------------------------------------------------------

struct MjpegFileSource {
    config: FileConfig,
    stream: Option<MjpegStream>,
    frame_count: u64,
    ended: bool,
}

impl MjpegFileSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            stream: None,
            frame_count: 0,
            ended: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let file = std::fs::File::open(&self.config.path)
            .with_context(|| format!("open uploaded video {}", self.config.path))?;
        self.stream = Some(MjpegStream::new(Box::new(std::io::BufReader::new(file))));
        log::info!("FileSource: opened {} (mjpeg)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("file source not opened; call connect() first"))?;
        let Some(jpeg) = stream.read_next_jpeg()? else {
            self.ended = true;
            return Ok(None);
        };
        let (pixels, width, height) = decode_jpeg(&jpeg)
            .with_context(|| format!("frame {} of {}", self.frame_count + 1, self.config.path))?;
        self.frame_count += 1;
        Frame::new(pixels, width, height, self.frame_count).map(Some)
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

fn is_mjpeg_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mjpeg") || ext.eq_ignore_ascii_case("mjpg"))
        .unwrap_or(false)
}
