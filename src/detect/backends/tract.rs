#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, Model};
use crate::detect::labels::coco_label;
use crate::detect::result::{BBox, Prediction};
use crate::frame::Frame;

/// Input edge length of the zoo SSD MobileNet models.
pub const SSD_INPUT_SIZE: u32 = 300;

/// Tract-based backend for SSD-style ONNX detectors (e.g. SSD MobileNet from
/// the ONNX model zoo).
///
/// Expected graph:
/// - input: `uint8[1, H, W, 3]` RGB
/// - outputs: boxes `[1, N, 4]` as normalised `(ymin, xmin, ymax, xmax)`,
///   then classes `[1, N]` (COCO ids) and scores `[1, N]`, in that order
///
/// The model file is read from local disk; no network access.
pub struct TractBackend {
    model_path: PathBuf,
    input_width: u32,
    input_height: u32,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            input_width,
            input_height,
        }
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn load(self: Box<Self>) -> Result<Box<dyn Model>> {
        let path = &self.model_path;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to load ONNX model from {}", path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    u8::datum_type(),
                    tvec!(1, self.input_height as usize, self.input_width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "tract model ready: {} ({}x{} input)",
            path.display(),
            self.input_width,
            self.input_height
        );
        Ok(Box::new(TractModel {
            plan,
            input_width: self.input_width,
            input_height: self.input_height,
        }))
    }
}

struct TractModel {
    plan: TypedRunnableModel<TypedModel>,
    input_width: u32,
    input_height: u32,
}

impl TractModel {
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not fit {}x{}", frame.width, frame.height))?;
        let resized = image::imageops::resize(
            &image,
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );
        let width = self.input_width as usize;
        let raw = resized.as_raw();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, self.input_height as usize, width, 3),
            |(_, y, x, channel)| raw[(y * width + x) * 3 + channel],
        );
        Ok(input.into_tensor())
    }

    fn extract_predictions(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Prediction>> {
        let boxes = outputs
            .iter()
            .find(|t| t.rank() == 3 && t.shape()[2] == 4)
            .ok_or_else(|| anyhow!("model produced no [1, N, 4] box output"))?
            .to_array_view::<f32>()
            .context("box tensor was not f32")?;
        let mut per_box = outputs.iter().filter(|t| t.rank() == 2);
        let classes = per_box
            .next()
            .ok_or_else(|| anyhow!("model produced no class output"))?
            .cast_to::<f32>()
            .context("class tensor is not numeric")?;
        let scores = per_box
            .next()
            .ok_or_else(|| anyhow!("model produced no score output"))?
            .to_array_view::<f32>()
            .context("score tensor was not f32")?;
        let classes = classes.to_array_view::<f32>()?;

        let (fw, fh) = (frame.width as f32, frame.height as f32);
        let count = detection_count(boxes.shape()[1], classes.shape()[1], scores.shape()[1]);
        let mut predictions = Vec::with_capacity(count);
        for i in 0..count {
            let score = scores[[0, i]];
            if !score.is_finite() || score <= 0.0 {
                continue;
            }
            let class_id = classes[[0, i]].round() as u32;
            let Some(label) = coco_label(class_id) else {
                continue;
            };
            let (ymin, xmin) = (boxes[[0, i, 0]], boxes[[0, i, 1]]);
            let (ymax, xmax) = (boxes[[0, i, 2]], boxes[[0, i, 3]]);
            predictions.push(Prediction {
                class: label.to_string(),
                score: score.min(1.0),
                bbox: BBox::new(
                    xmin * fw,
                    ymin * fh,
                    (xmax - xmin).max(0.0) * fw,
                    (ymax - ymin).max(0.0) * fh,
                ),
            });
        }
        Ok(predictions)
    }
}

impl Model for TractModel {
    fn name(&self) -> &str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Prediction>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_predictions(outputs, frame)
    }
}

/// Entries readable from all three outputs; graphs may pad them differently.
fn detection_count(boxes: usize, classes: usize, scores: usize) -> usize {
    boxes.min(classes).min(scores)
}
