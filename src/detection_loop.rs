//! Per-frame detection step.
//!
//! One call to `DetectionLoop::step` is one tick of the page: ask the model for
//! predictions, keep the confident ones, account for them in the session and
//! repaint the overlay. The call blocks until the model answers, so inference
//! never overlaps.

use anyhow::{Context, Result};

use crate::detect::{Model, Prediction};
use crate::frame::Frame;
use crate::overlay::OverlayRenderer;
use crate::session::Session;

/// Predictions scoring at or below this are discarded.
pub const CONFIDENCE_THRESHOLD: f32 = 0.66;

pub fn is_retained(score: f32) -> bool {
    score > CONFIDENCE_THRESHOLD
}

pub fn retain_confident(predictions: Vec<Prediction>) -> Vec<Prediction> {
    predictions
        .into_iter()
        .filter(|prediction| is_retained(prediction.score))
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub predictions: u64,
    pub retained: u64,
}

#[derive(Debug, Default)]
pub struct DetectionLoop {
    stats: LoopStats,
}

impl DetectionLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the model on `frame`, record survivors and repaint the surface.
    ///
    /// Returns the retained predictions in model order.
    pub fn step(
        &mut self,
        model: &mut dyn Model,
        frame: &Frame,
        session: &mut Session,
        renderer: &mut OverlayRenderer,
    ) -> Result<Vec<Prediction>> {
        let predictions = model
            .detect(frame)
            .with_context(|| format!("model {} failed on frame {}", model.name(), frame.sequence))?;
        let seen = predictions.len() as u64;
        let retained = retain_confident(predictions);

        for prediction in &retained {
            session.record(prediction, frame.sequence);
        }
        renderer.render(frame, &retained)?;

        self.stats.frames += 1;
        self.stats.predictions += seen;
        self.stats.retained += retained.len() as u64;
        log::trace!(
            "frame {}: {} predictions, {} retained",
            frame.sequence,
            seen,
            retained.len()
        );
        Ok(retained)
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectorBackend, ScriptedBackend};

    fn frame(sequence: u64) -> Frame {
        Frame::new(vec![0u8; 200 * 200 * 3], 200, 200, sequence).unwrap()
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!is_retained(0.66));
        assert!(is_retained(0.6601));
        assert!(!is_retained(0.5));
        assert!(is_retained(1.0));
        assert!(!is_retained(0.0));
    }

    #[test]
    fn retain_keeps_order() {
        let kept = retain_confident(vec![
            Prediction::new("cat", 0.9, [0.0, 0.0, 1.0, 1.0]),
            Prediction::new("dog", 0.2, [0.0, 0.0, 1.0, 1.0]),
            Prediction::new("bird", 0.7, [0.0, 0.0, 1.0, 1.0]),
        ]);
        let classes: Vec<&str> = kept.iter().map(|p| p.class.as_str()).collect();
        assert_eq!(classes, vec!["cat", "bird"]);
    }

    #[test]
    fn step_records_only_confident_predictions() -> Result<()> {
        let mut model = Box::new(ScriptedBackend::from_frames(vec![
            vec![
                Prediction::new("person", 0.9, [10.0, 10.0, 50.0, 80.0]),
                Prediction::new("person", 0.5, [60.0, 60.0, 20.0, 20.0]),
            ],
            vec![Prediction::new("dog", 0.7, [100.0, 100.0, 40.0, 30.0])],
        ]))
        .load()?;
        let mut session = Session::new();
        let mut renderer = OverlayRenderer::new(200, 200)?;
        let mut detection = DetectionLoop::new();

        let first = detection.step(model.as_mut(), &frame(1), &mut session, &mut renderer)?;
        assert_eq!(first.len(), 1);
        detection.step(model.as_mut(), &frame(2), &mut session, &mut renderer)?;

        assert_eq!(session.tally().get("person"), 1);
        assert_eq!(session.tally().get("dog"), 1);
        assert_eq!(session.records().len(), 2);
        assert_eq!(session.records()[1].frame, 2);
        assert_eq!(
            detection.stats(),
            LoopStats {
                frames: 2,
                predictions: 3,
                retained: 2
            }
        );
        Ok(())
    }
}
