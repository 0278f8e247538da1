//! Video inputs.
//!
//! Three ways to feed the page:
//! - Local camera (feature: ingest-v4l2)
//! - Networked camera serving MJPEG/JPEG over HTTP
//! - Uploaded local file (MJPEG built in, other containers with ingest-file-ffmpeg)
//!
//! Every flavour accepts a `stub://` location that produces synthetic frames so
//! the rest of the pipeline can be exercised without hardware.
//!
//! All sources hand out decoded RGB24 `Frame`s. `SourceSelector` picks exactly
//! one of them per page.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub(crate) mod mjpeg;
pub mod network;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod selector;

pub use camera::{CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource};
pub use network::{NetworkConfig, NetworkSource};
pub use selector::{MediaSource, PlaybackGate, SourceIntent, SourceSelector};
