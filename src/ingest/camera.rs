//! Local camera source.
//!
//! `CameraSource` opens a local capture device (V4L2 on Linux, feature
//! `ingest-v4l2`) and hands out decoded RGB frames. Device paths starting with
//! `stub://` produce a synthetic scene instead, which is what tests use.
//!
//! Opening the device is the permission step: a refused open becomes
//! `CaptureError::PermissionDenied`, a missing node (or a build without camera
//! support) becomes `CaptureError::DeviceUnavailable`.

use anyhow::Result;

use crate::error::CaptureError;
use crate::frame::{synthetic_pixels, Frame, FrameStats};

/// Configuration for a local camera.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0").
    pub device: String,
    /// Requested frame rate.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Local camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(v4l2::DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(v4l2::DeviceCamera::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(CaptureError::DeviceUnavailable(format!(
                "{}: local camera capture requires the ingest-v4l2 feature",
                config.device
            ))
            .into())
        }
    }

    /// Open the device and start streaming.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Capture the next frame. A live camera never ends, so this is always `Some`.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame().map(Some),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame().map(Some),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> FrameStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => FrameStats {
                frames_captured: source.frame_count,
                origin: source.config.device.clone(),
            },
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    /// `stub://denied` and `stub://missing` simulate the two acquisition failures.
    fn connect(&mut self) -> Result<()> {
        match self.config.device.as_str() {
            "stub://denied" => {
                Err(CaptureError::PermissionDenied(self.config.device.clone()).into())
            }
            "stub://missing" => Err(CaptureError::DeviceUnavailable(format!(
                "{}: no such device",
                self.config.device
            ))
            .into()),
            _ => {
                log::info!("CameraSource: connected to {} (synthetic)", self.config.device);
                Ok(())
            }
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let pixels = synthetic_pixels(self.config.width, self.config.height, self.frame_count);
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }
}

// ----------------------------------------------------------------------------
// V4L2 device
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod v4l2 {
    use anyhow::{Context, Result};
    use ouroboros::self_referencing;
    use std::time::Instant;

    use super::CameraConfig;
    use crate::error::CaptureError;
    use crate::frame::{Frame, FrameStats};
    use crate::ingest::normalize::{normalize_to_rgb, PixelFormat};

    pub(super) struct DeviceCamera {
        config: CameraConfig,
        state: Option<DeviceState>,
        frame_count: u64,
        last_frame_at: Option<Instant>,
        last_error: Option<String>,
        active_width: u32,
        active_height: u32,
        active_format: PixelFormat,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCamera {
        pub(super) fn new(config: CameraConfig) -> Self {
            Self {
                active_width: config.width,
                active_height: config.height,
                active_format: PixelFormat::Rgb24,
                config,
                state: None,
                frame_count: 0,
                last_frame_at: None,
                last_error: None,
            }
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&self.config.device).map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(CaptureError::from_device_io(&self.config.device, &err))
            })?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set RGB3 on {}: {}",
                        self.config.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };

            self.active_format = match &format.fourcc.repr {
                b"RGB3" => PixelFormat::Rgb24,
                b"YUYV" => PixelFormat::Yuyv,
                b"NV12" => PixelFormat::Nv12,
                b"MJPG" => PixelFormat::Mjpeg,
                other => {
                    return Err(CaptureError::DeviceUnavailable(format!(
                        "{}: unsupported pixel format {}",
                        self.config.device,
                        String::from_utf8_lossy(other)
                    ))
                    .into())
                }
            };

            if self.config.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "CameraSource: failed to set fps on {}: {}",
                        self.config.device,
                        err
                    );
                }
            }

            self.active_width = format.width;
            self.active_height = format.height;
            self.last_error = None;

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?;
            self.state = Some(state);

            log::info!(
                "CameraSource: connected to {} ({}x{} {:?})",
                self.config.device,
                self.active_width,
                self.active_height,
                self.active_format
            );
            Ok(())
        }

        pub(super) fn next_frame(&mut self) -> Result<Frame> {
            use v4l::io::traits::CaptureStream;

            let state = self.state.as_mut().context("camera not connected")?;
            let (buf, _meta) = state
                .with_mut(|fields| fields.stream.next())
                .map_err(|err| {
                    self.last_error = Some(err.to_string());
                    anyhow::Error::new(err).context("capture v4l2 frame")
                })?;

            let (pixels, width, height) = normalize_to_rgb(
                buf,
                self.active_width,
                self.active_height,
                self.active_format,
            )?;

            self.frame_count += 1;
            self.last_frame_at = Some(Instant::now());
            Frame::new(pixels, width, height, self.frame_count)
        }

        pub(super) fn is_healthy(&self) -> bool {
            if self.last_error.is_some() {
                return false;
            }
            let Some(last_frame_at) = self.last_frame_at else {
                return true;
            };
            last_frame_at.elapsed() <= crate::ingest::network::health_grace(self.config.target_fps)
        }

        pub(super) fn stats(&self) -> FrameStats {
            FrameStats {
                frames_captured: self.frame_count,
                origin: self.config.device.clone(),
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::capture_error;

    fn stub_config(device: &str) -> CameraConfig {
        CameraConfig {
            device: device.to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn camera_source_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config("stub://webcam"))?;
        source.connect()?;

        let frame = source.next_frame()?.expect("live camera frame");
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.sequence, 1);
        assert!(source.is_healthy());
        Ok(())
    }

    #[test]
    fn denied_camera_reports_permission_error() -> Result<()> {
        let mut source = CameraSource::new(stub_config("stub://denied"))?;
        let err = source.connect().unwrap_err();
        assert!(matches!(
            capture_error(&err),
            Some(CaptureError::PermissionDenied(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_camera_reports_device_unavailable() -> Result<()> {
        let mut source = CameraSource::new(stub_config("stub://missing"))?;
        let err = source.connect().unwrap_err();
        assert!(matches!(
            capture_error(&err),
            Some(CaptureError::DeviceUnavailable(_))
        ));
        Ok(())
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_device_needs_v4l2_feature() {
        let err = CameraSource::new(stub_config("/dev/video0"))
            .err()
            .expect("no camera support compiled in");
        assert!(matches!(
            capture_error(&err),
            Some(CaptureError::DeviceUnavailable(_))
        ));
    }
}
