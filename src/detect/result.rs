use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box in frame pixel coordinates.
///
/// Serialized as `[x, y, width, height]`, the shape detection models emit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scale into another coordinate space (e.g., frame -> surface).
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// `x,y,width,height`, e.g. `10,10,50,80`.
impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// One model output for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    /// Confidence in [0, 1].
    pub score: f32,
    pub bbox: BBox,
}

impl Prediction {
    pub fn new(class: impl Into<String>, score: f32, bbox: impl Into<BBox>) -> Self {
        Self {
            class: class.into(),
            score,
            bbox: bbox.into(),
        }
    }

    /// `round(score * 100)`, as shown on labels and in reports.
    pub fn percent(&self) -> u32 {
        score_percent(self.score)
    }
}

pub(crate) fn score_percent(score: f32) -> u32 {
    (score * 100.0).round().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_displays_like_a_number_list() {
        assert_eq!(BBox::new(10.0, 10.0, 50.0, 80.0).to_string(), "10,10,50,80");
        assert_eq!(BBox::new(1.5, 0.0, 2.25, 3.0).to_string(), "1.5,0,2.25,3");
    }

    #[test]
    fn prediction_reads_model_json() {
        let json = r#"{"class":"dog","score":0.7,"bbox":[100,100,40,30]}"#;
        let prediction: Prediction = serde_json::from_str(json).unwrap();
        assert_eq!(prediction.class, "dog");
        assert_eq!(prediction.bbox, BBox::new(100.0, 100.0, 40.0, 30.0));
        assert_eq!(prediction.percent(), 70);
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(score_percent(0.9), 90);
        assert_eq!(score_percent(0.6601), 66);
        assert_eq!(score_percent(0.996), 100);
    }
}
