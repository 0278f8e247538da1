//! Source selection.
//!
//! The user picks one of three inputs; `SourceSelector` turns that choice into a
//! connected `MediaSource`. The first successful choice wins for the lifetime of
//! the page. A failed choice (refused camera, unreachable stream) leaves the
//! selector empty so the user can simply try again.

use anyhow::Result;

use super::camera::{CameraConfig, CameraSource};
use super::file::{FileConfig, FileSource};
use super::network::{NetworkConfig, NetworkSource};
use crate::error::CaptureError;
use crate::frame::{Frame, FrameStats};

/// What the user asked to watch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceIntent {
    LocalCamera,
    NetworkCamera,
    Upload(String),
}

impl SourceIntent {
    /// A chosen file overrides the camera buttons, matching the page's upload form.
    pub fn resolve(self, pending_upload: Option<&str>) -> Self {
        match pending_upload {
            Some(path) if !path.trim().is_empty() => SourceIntent::Upload(path.to_string()),
            _ => self,
        }
    }
}

/// A playable, connected input.
pub enum MediaSource {
    LocalCamera(CameraSource),
    NetworkCamera(NetworkSource),
    UploadedFile(FileSource),
}

impl MediaSource {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaSource::LocalCamera(_) => "local camera",
            MediaSource::NetworkCamera(_) => "network camera",
            MediaSource::UploadedFile(_) => "uploaded file",
        }
    }

    fn connect(&mut self) -> Result<()> {
        match self {
            MediaSource::LocalCamera(source) => source.connect(),
            MediaSource::NetworkCamera(source) => source.connect(),
            MediaSource::UploadedFile(source) => source.connect(),
        }
    }

    /// Next frame, or `None` once the input has nothing more to play.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self {
            MediaSource::LocalCamera(source) => source.next_frame(),
            MediaSource::NetworkCamera(source) => source.next_frame(),
            MediaSource::UploadedFile(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match self {
            MediaSource::LocalCamera(source) => source.is_healthy(),
            MediaSource::NetworkCamera(source) => source.is_healthy(),
            MediaSource::UploadedFile(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> FrameStats {
        match self {
            MediaSource::LocalCamera(source) => source.stats(),
            MediaSource::NetworkCamera(source) => source.stats(),
            MediaSource::UploadedFile(source) => source.stats(),
        }
    }
}

/// Fires once, on the first "data loaded" notification.
#[derive(Debug, Default)]
pub struct PlaybackGate {
    opened: bool,
}

impl PlaybackGate {
    /// Returns true the first time only; repeated notifications are ignored.
    pub fn on_loaded_data(&mut self) -> bool {
        if self.opened {
            return false;
        }
        self.opened = true;
        true
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

/// Maps a `SourceIntent` to a connected `MediaSource`.
pub struct SourceSelector {
    camera: CameraConfig,
    network: NetworkConfig,
    file_fps: u32,
    active: Option<MediaSource>,
    gate: PlaybackGate,
}

impl SourceSelector {
    pub fn new(camera: CameraConfig, network: NetworkConfig) -> Self {
        let file_fps = camera.target_fps;
        Self {
            camera,
            network,
            file_fps,
            active: None,
            gate: PlaybackGate::default(),
        }
    }

    /// Build and connect the source for `intent`.
    ///
    /// Rejected with `SourceAlreadySelected` once a source is active. On failure
    /// nothing is kept and the next call starts from scratch.
    pub fn select(&mut self, intent: SourceIntent) -> Result<&mut MediaSource> {
        if let Some(active) = &self.active {
            return Err(CaptureError::SourceAlreadySelected(active.kind().to_string()).into());
        }

        let mut source = match intent {
            SourceIntent::LocalCamera => MediaSource::LocalCamera(CameraSource::new(
                self.camera.clone(),
            )?),
            SourceIntent::NetworkCamera => MediaSource::NetworkCamera(NetworkSource::new(
                self.network.clone(),
            )?),
            SourceIntent::Upload(path) => MediaSource::UploadedFile(FileSource::new(FileConfig {
                path,
                target_fps: self.file_fps,
            })?),
        };
        source.connect()?;
        log::info!("source selected: {} ({})", source.kind(), source.stats().origin);

        Ok(self.active.insert(source))
    }

    pub fn active(&mut self) -> Option<&mut MediaSource> {
        self.active.as_mut()
    }

    pub fn has_source(&self) -> bool {
        self.active.is_some()
    }

    pub fn gate(&mut self) -> &mut PlaybackGate {
        &mut self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::capture_error;

    fn selector(device: &str) -> SourceSelector {
        SourceSelector::new(
            CameraConfig {
                device: device.to_string(),
                target_fps: 10,
                width: 32,
                height: 24,
            },
            NetworkConfig {
                url: "stub://ipcam".to_string(),
                target_fps: 10,
            },
        )
    }

    #[test]
    fn first_successful_choice_wins() -> Result<()> {
        let mut selector = selector("stub://webcam");
        assert_eq!(selector.select(SourceIntent::NetworkCamera)?.kind(), "network camera");

        let err = selector.select(SourceIntent::LocalCamera).err().expect("second choice");
        assert!(matches!(
            capture_error(&err),
            Some(CaptureError::SourceAlreadySelected(_))
        ));
        Ok(())
    }

    #[test]
    fn failed_choice_can_be_retried() -> Result<()> {
        let mut selector = selector("stub://denied");
        let err = selector.select(SourceIntent::LocalCamera).err().expect("denied");
        assert!(matches!(
            capture_error(&err),
            Some(CaptureError::PermissionDenied(_))
        ));
        assert!(!selector.has_source());

        let source = selector.select(SourceIntent::Upload("stub://clip".to_string()))?;
        assert_eq!(source.kind(), "uploaded file");
        Ok(())
    }

    #[test]
    fn playback_gate_opens_once() {
        let mut gate = PlaybackGate::default();
        assert!(gate.on_loaded_data());
        assert!(!gate.on_loaded_data());
        assert!(gate.is_open());
    }

    #[test]
    fn pending_upload_overrides_camera_intent() {
        assert_eq!(
            SourceIntent::LocalCamera.resolve(Some("clip.mjpeg")),
            SourceIntent::Upload("clip.mjpeg".to_string())
        );
        assert_eq!(SourceIntent::NetworkCamera.resolve(None), SourceIntent::NetworkCamera);
        assert_eq!(SourceIntent::NetworkCamera.resolve(Some(" ")), SourceIntent::NetworkCamera);
    }
}
