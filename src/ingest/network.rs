//! Networked camera source.
//!
//! `NetworkSource` reads an IP camera that serves video over plain HTTP, the
//! way phone "IP webcam" apps and ESP32 camera boards do:
//! - `multipart/x-mixed-replace` responses are read as a continuous MJPEG stream
//! - any other response is treated as a JPEG snapshot and re-fetched per frame
//!
//! No handshake or protocol negotiation happens here. Whether the server sends
//! something decodable is the server's business; a stream that cannot be
//! reached surfaces as `CaptureError::SourceUnavailable`.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use url::Url;

use super::mjpeg::{decode_jpeg, MjpegStream};
use crate::error::CaptureError;
use crate::frame::{synthetic_pixels, Frame, FrameStats};

/// Configuration for a networked camera.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Stream URL (e.g., "http://192.168.1.3:8080/video"), or `stub://` for tests.
    pub url: String,
    /// Target frame rate. Frames arriving faster than this are dropped.
    pub target_fps: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: crate::config::DEFAULT_NETWORK_URL.to_string(),
            target_fps: 10,
        }
    }
}

/// Networked camera frame source.
pub struct NetworkSource {
    backend: NetworkBackend,
}

enum NetworkBackend {
    Synthetic(SyntheticNetworkSource),
    Http(HttpNetworkSource),
}

impl NetworkSource {
    pub fn new(config: NetworkConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: NetworkBackend::Synthetic(SyntheticNetworkSource::new(config)),
            });
        }
        let url = Url::parse(&config.url).context("parse network camera url")?;
        match url.scheme() {
            "http" | "https" => Ok(Self {
                backend: NetworkBackend::Http(HttpNetworkSource::new(config)),
            }),
            other => Err(anyhow!(
                "unsupported network camera scheme '{}'; expected http(s)",
                other
            )),
        }
    }

    /// Open the stream. Unreachable servers map to `SourceUnavailable`.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            NetworkBackend::Synthetic(source) => source.connect(),
            NetworkBackend::Http(source) => source.connect(),
        }
    }

    /// Next frame, or `None` when the server closed the stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            NetworkBackend::Synthetic(source) => source.next_frame().map(Some),
            NetworkBackend::Http(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            NetworkBackend::Synthetic(_) => true,
            NetworkBackend::Http(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> FrameStats {
        match &self.backend {
            NetworkBackend::Synthetic(source) => FrameStats {
                frames_captured: source.frame_count,
                origin: source.config.url.clone(),
            },
            NetworkBackend::Http(source) => FrameStats {
                frames_captured: source.frame_count,
                origin: source.config.url.clone(),
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;

struct SyntheticNetworkSource {
    config: NetworkConfig,
    frame_count: u64,
}

impl SyntheticNetworkSource {
    fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        if self.config.url.starts_with("stub://offline") {
            return Err(CaptureError::SourceUnavailable(self.config.url.clone()).into());
        }
        log::info!("NetworkSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let pixels = synthetic_pixels(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, self.frame_count);
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, self.frame_count)
    }
}

// ----------------------------------------------------------------------------
// HTTP source
// ----------------------------------------------------------------------------

struct HttpNetworkSource {
    config: NetworkConfig,
    stream: Option<HttpStream>,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    frame_count: u64,
    last_error: Option<String>,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    /// Body of the connect request, served as the first frame.
    Snapshot { pending: Option<Vec<u8>> },
}

impl HttpNetworkSource {
    fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            stream: None,
            last_frame_at: None,
            connected_at: None,
            frame_count: 0,
            last_error: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.url).call().map_err(|err| {
            self.last_error = Some(err.to_string());
            anyhow::Error::new(CaptureError::SourceUnavailable(format!(
                "{}: {}",
                self.config.url, err
            )))
        })?;
        let content_type = response.header("Content-Type").unwrap_or("").to_lowercase();
        if content_type.contains("multipart") {
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(response.into_reader())));
        } else {
            let body = read_snapshot(response)?;
            self.stream = Some(HttpStream::Snapshot {
                pending: Some(body),
            });
        }
        self.connected_at = Some(Instant::now());
        self.last_error = None;
        log::info!(
            "NetworkSource: connected to {} ({})",
            self.config.url,
            if content_type.is_empty() {
                "no content type"
            } else {
                content_type.as_str()
            }
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("network source not connected; call connect() first"))?;
        let min_interval = frame_interval(self.config.target_fps);
        loop {
            let jpeg_bytes = match stream {
                HttpStream::Mjpeg(stream) => stream.read_next_jpeg()?,
                HttpStream::Snapshot { pending } => match pending.take() {
                    Some(bytes) => Some(bytes),
                    None => Some(fetch_snapshot(&self.config.url)?),
                },
            };
            let Some(jpeg_bytes) = jpeg_bytes else {
                self.last_error = Some("stream ended".to_string());
                log::warn!("NetworkSource: {} closed the stream", self.config.url);
                return Ok(None);
            };

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            let (pixels, width, height) = decode_jpeg(&jpeg_bytes)?;
            self.frame_count += 1;
            self.last_frame_at = Some(now);
            return Frame::new(pixels, width, height, self.frame_count).map(Some);
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }
}

fn fetch_snapshot(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    read_snapshot(response)
}

fn read_snapshot(response: ureq::Response) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

pub(crate) fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

pub(crate) fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::capture_error;
    use image::codecs::jpeg::JpegEncoder;
    use image::ExtendedColorType;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves the same JPEG to every request and counts them.
    fn serve_snapshots(requests: Arc<AtomicUsize>) -> String {
        let mut body = Vec::new();
        JpegEncoder::new_with_quality(&mut body, 90)
            .encode(&[90u8; 16 * 8 * 3], 16, 8, ExtendedColorType::Rgb8)
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut request = Vec::new();
                let mut byte = [0u8; 1];
                while !request.ends_with(b"\r\n\r\n") {
                    match stream.read(&mut byte) {
                        Ok(1) => request.push(byte[0]),
                        _ => break,
                    }
                }
                requests.fetch_add(1, Ordering::SeqCst);
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&body);
            }
        });
        format!("http://{}/shot.jpg", addr)
    }

    #[test]
    fn rejects_non_http_schemes() {
        let err = NetworkSource::new(NetworkConfig {
            url: "rtsp://camera/stream".to_string(),
            target_fps: 10,
        });
        assert!(err.is_err());
    }

    #[test]
    fn synthetic_stream_produces_frames() -> Result<()> {
        let mut source = NetworkSource::new(NetworkConfig {
            url: "stub://ipcam".to_string(),
            target_fps: 10,
        })?;
        source.connect()?;
        let frame = source.next_frame()?.expect("frame");
        assert_eq!((frame.width, frame.height), (SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT));
        assert_eq!(source.stats().frames_captured, 1);
        Ok(())
    }

    #[test]
    fn offline_stream_is_source_unavailable() -> Result<()> {
        let mut source = NetworkSource::new(NetworkConfig {
            url: "stub://offline".to_string(),
            target_fps: 10,
        })?;
        let err = source.connect().unwrap_err();
        assert!(matches!(
            capture_error(&err),
            Some(CaptureError::SourceUnavailable(_))
        ));
        Ok(())
    }

    #[test]
    fn frame_interval_handles_zero_fps() {
        assert_eq!(frame_interval(0), Duration::from_millis(0));
        assert_eq!(frame_interval(10), Duration::from_millis(100));
        assert_eq!(health_grace(10), Duration::from_millis(2_000));
    }

    #[test]
    fn snapshot_connect_body_is_the_first_frame() -> Result<()> {
        let requests = Arc::new(AtomicUsize::new(0));
        let url = serve_snapshots(requests.clone());
        let mut source = NetworkSource::new(NetworkConfig { url, target_fps: 0 })?;

        source.connect()?;
        let frame = source.next_frame()?.expect("first frame");
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        source.next_frame()?.expect("second frame");
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }
}
