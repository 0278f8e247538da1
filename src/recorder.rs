//! Recording of the composited surface.
//!
//! `Recorder` is the Idle/Recording state machine. While recording, every
//! rendered surface is JPEG-encoded into one segment of the session. Save
//! writes two independent files into the output directory:
//! - the video: all segments concatenated (a plain MJPEG stream)
//! - the report: see `crate::report`

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;
use crate::report;
use crate::session::Session;

pub const DEFAULT_VIDEO_FILE: &str = "recorded_video.mjpeg";
pub const DEFAULT_REPORT_FILE: &str = "recorded_data.txt";
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Output file names, relative to the save directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactNames {
    pub video: String,
    pub report: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            video: DEFAULT_VIDEO_FILE.to_string(),
            report: DEFAULT_REPORT_FILE.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedArtifacts {
    pub video: PathBuf,
    pub report: PathBuf,
    pub video_bytes: usize,
    pub segments: usize,
}

#[derive(Debug)]
pub struct Recorder {
    state: RecorderState,
    jpeg_quality: u8,
    has_recorded: bool,
}

impl Recorder {
    pub fn new(jpeg_quality: u8) -> Result<Self> {
        if !(1..=100).contains(&jpeg_quality) {
            return Err(anyhow!("jpeg quality must be in 1..=100 (got {})", jpeg_quality));
        }
        Ok(Self {
            state: RecorderState::Idle,
            jpeg_quality,
            has_recorded: false,
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Begin a new recording. The previous session is discarded.
    pub fn start(&mut self, session: &mut Session) -> Result<()> {
        if self.is_recording() {
            return Err(CaptureError::RecordingState("already recording".to_string()).into());
        }
        session.reset();
        self.state = RecorderState::Recording;
        self.has_recorded = true;
        log::info!("recording started");
        Ok(())
    }

    /// Stop capturing. Buffered segments stay in the session for `save`.
    pub fn stop(&mut self, session: &Session) -> Result<()> {
        if !self.is_recording() {
            return Err(CaptureError::RecordingState("not recording".to_string()).into());
        }
        self.state = RecorderState::Idle;
        log::info!(
            "recording stopped: {} segments, {} bytes",
            session.segments().len(),
            session.segment_bytes()
        );
        Ok(())
    }

    /// Encode the current surface into the session. No-op while idle.
    pub fn capture(&self, session: &mut Session, surface: &RgbImage) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }
        let segment = encode_jpeg(surface, self.jpeg_quality)?;
        session.push_segment(segment);
        Ok(())
    }

    /// Write the video and the report. The session is left untouched.
    pub fn save(
        &self,
        session: &Session,
        out_dir: &Path,
        names: &ArtifactNames,
    ) -> Result<SavedArtifacts> {
        if self.is_recording() {
            return Err(
                CaptureError::RecordingState("stop recording before saving".to_string()).into(),
            );
        }
        if !self.has_recorded {
            return Err(CaptureError::RecordingState("nothing has been recorded".to_string()).into());
        }

        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;

        let video = out_dir.join(&names.video);
        let mut file = fs::File::create(&video)
            .with_context(|| format!("failed to create {}", video.display()))?;
        for segment in session.segments() {
            file.write_all(&segment.bytes)
                .with_context(|| format!("failed to write {}", video.display()))?;
        }
        file.flush()?;

        let report_path = out_dir.join(&names.report);
        fs::write(&report_path, report::render(session))
            .with_context(|| format!("failed to write {}", report_path.display()))?;

        let saved = SavedArtifacts {
            video,
            report: report_path,
            video_bytes: session.segment_bytes(),
            segments: session.segments().len(),
        };
        log::info!(
            "saved {} ({} segments) and {}",
            saved.video.display(),
            saved.segments,
            saved.report.display()
        );
        Ok(saved)
    }
}

pub fn encode_jpeg(surface: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(
            surface.as_raw(),
            surface.width(),
            surface.height(),
            ExtendedColorType::Rgb8,
        )
        .context("jpeg encode failed")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Prediction;
    use crate::error::capture_error;

    fn is_state_error(err: &anyhow::Error) -> bool {
        matches!(capture_error(err), Some(CaptureError::RecordingState(_)))
    }

    #[test]
    fn stop_without_start_is_rejected() {
        let mut recorder = Recorder::new(80).unwrap();
        let err = recorder.stop(&Session::new()).unwrap_err();
        assert!(is_state_error(&err));
    }

    #[test]
    fn start_twice_is_rejected_and_keeps_session() {
        let mut recorder = Recorder::new(80).unwrap();
        let mut session = Session::new();
        recorder.start(&mut session).unwrap();
        session.record(&Prediction::new("dog", 0.7, [0.0, 0.0, 1.0, 1.0]), 1);

        let err = recorder.start(&mut session).unwrap_err();
        assert!(is_state_error(&err));
        assert_eq!(session.records().len(), 1);
    }

    #[test]
    fn start_resets_previous_session() {
        let mut recorder = Recorder::new(80).unwrap();
        let mut session = Session::new();
        session.record(&Prediction::new("person", 0.9, [0.0, 0.0, 1.0, 1.0]), 1);
        recorder.start(&mut session).unwrap();
        assert!(session.tally().is_empty());
        assert!(session.records().is_empty());
    }

    #[test]
    fn capture_only_while_recording() {
        let mut recorder = Recorder::new(80).unwrap();
        let mut session = Session::new();
        let surface = RgbImage::new(16, 16);

        recorder.capture(&mut session, &surface).unwrap();
        assert!(session.segments().is_empty());

        recorder.start(&mut session).unwrap();
        recorder.capture(&mut session, &surface).unwrap();
        recorder.capture(&mut session, &surface).unwrap();
        recorder.stop(&session).unwrap();
        recorder.capture(&mut session, &surface).unwrap();

        assert_eq!(session.segments().len(), 2);
        assert!(session.segments()[0].bytes.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn save_requires_a_stopped_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(80).unwrap();
        let mut session = Session::new();

        let err = recorder
            .save(&session, dir.path(), &ArtifactNames::default())
            .unwrap_err();
        assert!(is_state_error(&err));

        recorder.start(&mut session).unwrap();
        let err = recorder
            .save(&session, dir.path(), &ArtifactNames::default())
            .unwrap_err();
        assert!(is_state_error(&err));
    }

    #[test]
    fn save_writes_video_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(80).unwrap();
        let mut session = Session::new();
        recorder.start(&mut session).unwrap();
        session.record(&Prediction::new("dog", 0.7, [100.0, 100.0, 40.0, 30.0]), 1);
        recorder.capture(&mut session, &RgbImage::new(16, 16)).unwrap();
        recorder.stop(&session).unwrap();

        let saved = recorder
            .save(&session, dir.path(), &ArtifactNames::default())
            .unwrap();
        let video = fs::read(&saved.video).unwrap();
        assert_eq!(video.len(), saved.video_bytes);
        assert!(video.ends_with(&[0xFF, 0xD9]));

        let report = fs::read_to_string(&saved.report).unwrap();
        assert!(report.ends_with("dog - 70%: 100,100,40,30\n"));

        // Saving again works and the session is still intact.
        recorder
            .save(&session, dir.path(), &ArtifactNames::default())
            .unwrap();
        assert_eq!(session.records().len(), 1);
    }

    #[test]
    fn quality_is_validated() {
        assert!(Recorder::new(0).is_err());
        assert!(Recorder::new(101).is_err());
    }
}
