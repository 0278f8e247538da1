use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::{CameraConfig, NetworkConfig};
use crate::recorder::{ArtifactNames, DEFAULT_JPEG_QUALITY, DEFAULT_REPORT_FILE, DEFAULT_VIDEO_FILE};

pub const DEFAULT_NETWORK_URL: &str = "http://192.168.1.3:8080/video";
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 10;
const DEFAULT_BACKEND: &str = "scripted";
const DEFAULT_OUTPUT_DIR: &str = ".";

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    video: Option<VideoConfigFile>,
    camera: Option<CameraConfigFile>,
    network: Option<NetworkConfigFile>,
    detector: Option<DetectorConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct NetworkConfigFile {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    video_file: Option<String>,
    report_file: Option<String>,
    jpeg_quality: Option<u8>,
    preview_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub video: VideoSettings,
    pub camera_device: String,
    pub network_url: String,
    pub detector: DetectorSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub script_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub video_file: String,
    pub report_file: String,
    pub jpeg_quality: u8,
    /// Rewritten with the composited surface every tick when set.
    pub preview_file: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_file(CaptureConfigFile::default())
    }
}

impl CaptureConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAPTURE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CaptureConfigFile) -> Self {
        let video = file.video.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        Self {
            video: VideoSettings {
                width: video.width.unwrap_or(DEFAULT_WIDTH),
                height: video.height.unwrap_or(DEFAULT_HEIGHT),
                target_fps: video.target_fps.unwrap_or(DEFAULT_FPS),
            },
            camera_device: file
                .camera
                .and_then(|camera| camera.device)
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            network_url: file
                .network
                .and_then(|network| network.url)
                .unwrap_or_else(|| DEFAULT_NETWORK_URL.to_string()),
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detector.model_path,
                script_path: detector.script_path,
            },
            output: OutputSettings {
                dir: output
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                video_file: output
                    .video_file
                    .unwrap_or_else(|| DEFAULT_VIDEO_FILE.to_string()),
                report_file: output
                    .report_file
                    .unwrap_or_else(|| DEFAULT_REPORT_FILE.to_string()),
                jpeg_quality: output.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
                preview_file: output.preview_file,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("CAPTURE_NETWORK_URL") {
            if !url.trim().is_empty() {
                self.network_url = url;
            }
        }
        if let Ok(device) = std::env::var("CAPTURE_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera_device = device;
            }
        }
        if let Ok(dir) = std::env::var("CAPTURE_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = PathBuf::from(dir);
            }
        }
        if let Ok(backend) = std::env::var("CAPTURE_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
        if let Ok(path) = std::env::var("CAPTURE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(fps) = std::env::var("CAPTURE_TARGET_FPS") {
            self.video.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAPTURE_TARGET_FPS must be a positive integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(anyhow!(
                "video dimensions must be non-zero (got {}x{})",
                self.video.width,
                self.video.height
            ));
        }
        if self.video.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero"));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(anyhow!(
                "jpeg_quality must be in 1..=100 (got {})",
                self.output.jpeg_quality
            ));
        }
        validate_network_url(&self.network_url)?;
        if self.output.video_file.trim().is_empty() || self.output.report_file.trim().is_empty() {
            return Err(anyhow!("output file names must not be empty"));
        }
        Ok(())
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.camera_device.clone(),
            target_fps: self.video.target_fps,
            width: self.video.width,
            height: self.video.height,
        }
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            url: self.network_url.clone(),
            target_fps: self.video.target_fps,
        }
    }

    pub fn artifact_names(&self) -> ArtifactNames {
        ArtifactNames {
            video: self.output.video_file.clone(),
            report: self.output.report_file.clone(),
        }
    }
}

/// Accepts http(s) URLs and `stub://` placeholders.
fn validate_network_url(raw: &str) -> Result<()> {
    if raw.starts_with("stub://") {
        return Ok(());
    }
    let url = url::Url::parse(raw).map_err(|e| anyhow!("invalid network url {}: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!(
            "network url must use http or https (got {}://)",
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CaptureConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.network_url, DEFAULT_NETWORK_URL);
        assert_eq!(cfg.video, VideoSettings { width: 640, height: 480, target_fps: 10 });
        assert_eq!(cfg.artifact_names(), ArtifactNames::default());
        assert!(cfg.output.preview_file.is_none());
    }

    #[test]
    fn network_url_scheme_is_checked() {
        assert!(validate_network_url("https://cam.local/mjpeg").is_ok());
        assert!(validate_network_url("stub://ipcam").is_ok());
        assert!(validate_network_url("rtsp://cam.local/stream").is_err());
        assert!(validate_network_url("not a url").is_err());
    }

    #[test]
    fn zero_fps_is_rejected() {
        let mut cfg = CaptureConfig::default();
        cfg.video.target_fps = 0;
        assert!(cfg.validate().is_err());
    }
}
