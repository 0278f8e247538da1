use anyhow::Result;

use crate::detect::result::Prediction;
use crate::frame::Frame;

/// A loaded detection model.
///
/// The only way to obtain one is `DetectorBackend::load`, so code holding a
/// `Model` never has to ask whether the model is ready.
pub trait Model: Send {
    /// Backend identifier, for logs.
    fn name(&self) -> &str;

    /// Run detection on a frame and return every prediction the model made,
    /// unfiltered. Boxes are in frame pixel coordinates.
    ///
    /// Implementations must treat the frame as read-only and must not keep
    /// references to it past the call.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Prediction>>;
}

/// Detector backend: something that can produce a `Model`.
///
/// Loading is where weights are read and graphs are optimised. It happens once
/// per process and may be slow.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Load the model, consuming the backend.
    fn load(self: Box<Self>) -> Result<Box<dyn Model>>;
}
