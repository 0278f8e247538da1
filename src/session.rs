//! Recording session state.
//!
//! A session groups everything that accumulates between a start-recording and
//! the following save: the per-class tally, the retained detections, and the
//! encoded media segments. `CapturePage` owns exactly one `Session`; starting a
//! new recording resets it in place.

use indexmap::IndexMap;

use crate::detect::{score_percent, BBox, Prediction};

/// One retained detection. Created once and never modified.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRecord {
    pub class: String,
    pub score: f32,
    pub bbox: BBox,
    /// Source frame the detection came from.
    pub frame: u64,
}

impl DetectionRecord {
    pub fn from_prediction(prediction: &Prediction, frame: u64) -> Self {
        Self {
            class: prediction.class.clone(),
            score: prediction.score,
            bbox: prediction.bbox,
            frame,
        }
    }

    pub fn percent(&self) -> u32 {
        score_percent(self.score)
    }
}

/// Running per-class counts, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionTally {
    counts: IndexMap<String, u64>,
}

impl DetectionTally {
    pub fn increment(&mut self, class: &str) {
        match self.counts.get_mut(class) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(class.to_string(), 1);
            }
        }
    }

    pub fn get(&self, class: &str) -> u64 {
        self.counts.get(class).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(class, count)| (class.as_str(), *count))
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// One encoded piece of the recorded stream.
#[derive(Clone, Debug)]
pub struct Segment {
    pub bytes: Vec<u8>,
}

/// Accumulators for one recording.
#[derive(Debug, Default)]
pub struct Session {
    tally: DetectionTally,
    records: Vec<DetectionRecord>,
    segments: Vec<Segment>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything from the previous recording.
    pub fn reset(&mut self) {
        self.tally.clear();
        self.records.clear();
        self.segments.clear();
    }

    /// Count and keep one retained detection.
    pub fn record(&mut self, prediction: &Prediction, frame: u64) {
        self.tally.increment(&prediction.class);
        self.records
            .push(DetectionRecord::from_prediction(prediction, frame));
    }

    /// Buffer an encoded segment. Empty segments are ignored.
    pub fn push_segment(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.segments.push(Segment { bytes });
    }

    pub fn tally(&self) -> &DetectionTally {
        &self.tally
    }

    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_bytes(&self) -> usize {
        self.segments.iter().map(|s| s.bytes.len()).sum()
    }
}
