//! Object detection.
//!
//! The model is an opaque capability: a `DetectorBackend` loads once into a
//! `Model`, and the model turns frames into `Prediction`s. Backends:
//! - `scripted`: replays predictions from a JSON script
//! - `tract`: ONNX SSD detector (feature: backend-tract)

mod backend;
pub mod backends;
mod labels;
mod registry;
mod result;

pub use backend::{DetectorBackend, Model};
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::coco_label;
pub use registry::BackendRegistry;
pub use result::{BBox, Prediction};
pub(crate) use result::score_percent;
