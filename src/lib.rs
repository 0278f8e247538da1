//! Capture, annotate, record.
//!
//! This crate watches a video source, runs an object detector over every frame,
//! draws the confident detections onto a composited surface and, on request,
//! records that surface together with a text report of what was seen.
//!
//! # Pipeline
//!
//! ```text
//! MediaSource -> Model::detect -> score > 0.66 -> Session -> OverlayRenderer -> Recorder
//! ```
//!
//! One tick runs the whole pipeline synchronously on the caller's thread.
//! Start/stop/save controls are applied between ticks.
//!
//! # Module Structure
//!
//! - `ingest`: local camera, networked camera and uploaded-file sources
//! - `detect`: detector backends, the `Model` capability, predictions
//! - `detection_loop`: confidence filter and per-frame step
//! - `overlay`: the composited surface (boxes and labels)
//! - `session`, `recorder`, `report`: recording state and saved artifacts
//! - `page`: `CapturePage`, which owns all of the above
//! - `config`, `control`, `scheduler`: configuration, user commands, pacing

pub mod config;
pub mod control;
pub mod detect;
pub mod detection_loop;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod page;
pub mod recorder;
pub mod report;
pub mod scheduler;
pub mod session;

pub use config::CaptureConfig;
pub use control::Control;
pub use detect::{BBox, BackendRegistry, DetectorBackend, Model, Prediction, ScriptedBackend};
pub use detection_loop::{is_retained, retain_confident, DetectionLoop, CONFIDENCE_THRESHOLD};
pub use error::{capture_error, CaptureError};
pub use frame::{Frame, FrameStats};
pub use ingest::{MediaSource, SourceIntent, SourceSelector};
pub use overlay::{label_y, OverlayRenderer};
pub use page::{CapturePage, RunSummary, TickOutcome};
pub use recorder::{ArtifactNames, Recorder, RecorderState, SavedArtifacts};
pub use scheduler::{FrameScheduler, StopSignal};
pub use session::{DetectionRecord, DetectionTally, Session};
