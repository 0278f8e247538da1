use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::backend::{DetectorBackend, Model};
use crate::detect::result::Prediction;
use crate::frame::Frame;

/// On-disk script: one list of predictions per frame, in playback order.
///
/// ```json
/// { "looped": false,
///   "frames": [
///     [ {"class": "person", "score": 0.9, "bbox": [10, 10, 50, 80]} ],
///     [ {"class": "dog", "score": 0.7, "bbox": [100, 100, 40, 30]} ]
///   ] }
/// ```
#[derive(Debug, Deserialize, Default)]
struct ScriptFile {
    #[serde(default)]
    looped: bool,
    frames: Vec<Vec<Prediction>>,
}

enum ScriptOrigin {
    Inline(ScriptFile),
    Path(PathBuf),
}

/// Backend that replays predetermined predictions.
///
/// Stands in for a real model wherever the pixels do not matter: tests,
/// demos, and dry runs of the recording pipeline.
pub struct ScriptedBackend {
    origin: ScriptOrigin,
}

impl ScriptedBackend {
    /// Replay `frames` once; later frames get no predictions.
    pub fn from_frames(frames: Vec<Vec<Prediction>>) -> Self {
        Self {
            origin: ScriptOrigin::Inline(ScriptFile {
                looped: false,
                frames,
            }),
        }
    }

    /// Read the script from a JSON file at load time.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            origin: ScriptOrigin::Path(path.as_ref().to_path_buf()),
        }
    }

    /// Start over from the first frame when the script runs out.
    pub fn looped(mut self) -> Self {
        if let ScriptOrigin::Inline(script) = &mut self.origin {
            script.looped = true;
        }
        self
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::from_frames(Vec::new())
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn load(self: Box<Self>) -> Result<Box<dyn Model>> {
        let script = match self.origin {
            ScriptOrigin::Inline(script) => script,
            ScriptOrigin::Path(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("read detection script {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid detection script {}", path.display()))?
            }
        };
        log::info!(
            "scripted model ready: {} frames{}",
            script.frames.len(),
            if script.looped { " (looped)" } else { "" }
        );
        Ok(Box::new(ScriptedModel {
            script,
            position: 0,
        }))
    }
}

struct ScriptedModel {
    script: ScriptFile,
    position: usize,
}

impl Model for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Prediction>> {
        let frames = &self.script.frames;
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let index = if self.script.looped {
            self.position % frames.len()
        } else {
            self.position
        };
        self.position += 1;
        Ok(frames.get(index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::synthetic_pixels;
    use std::io::Write;

    fn frame(sequence: u64) -> Frame {
        Frame::new(synthetic_pixels(4, 4, sequence), 4, 4, sequence).unwrap()
    }

    #[test]
    fn replays_frames_in_order_then_goes_quiet() -> Result<()> {
        let backend = ScriptedBackend::from_frames(vec![
            vec![Prediction::new("person", 0.9, [10.0, 10.0, 50.0, 80.0])],
            vec![],
        ]);
        let mut model = Box::new(backend).load()?;

        assert_eq!(model.detect(&frame(1))?[0].class, "person");
        assert!(model.detect(&frame(2))?.is_empty());
        assert!(model.detect(&frame(3))?.is_empty());
        Ok(())
    }

    #[test]
    fn looped_script_wraps() -> Result<()> {
        let backend = ScriptedBackend::from_frames(vec![
            vec![Prediction::new("a", 0.9, [0.0, 0.0, 1.0, 1.0])],
            vec![Prediction::new("b", 0.9, [0.0, 0.0, 1.0, 1.0])],
        ])
        .looped();
        let mut model = Box::new(backend).load()?;
        let classes: Vec<String> = (1..=3)
            .map(|i| model.detect(&frame(i)).unwrap()[0].class.clone())
            .collect();
        assert_eq!(classes, vec!["a", "b", "a"]);
        Ok(())
    }

    #[test]
    fn loads_script_from_json_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"frames": [[{{"class": "dog", "score": 0.7, "bbox": [100, 100, 40, 30]}}]]}}"#
        )?;
        let mut model = Box::new(ScriptedBackend::from_path(file.path())).load()?;
        let predictions = model.detect(&frame(1))?;
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].bbox.to_string(), "100,100,40,30");
        Ok(())
    }

    #[test]
    fn missing_script_fails_to_load() {
        let backend = ScriptedBackend::from_path("/nonexistent/script.json");
        assert!(Box::new(backend).load().is_err());
    }
}
