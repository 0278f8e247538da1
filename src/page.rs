//! The capture page.
//!
//! `CapturePage` owns every piece of page state:
//! - the loaded model (absent until `model_ready`)
//! - the composited surface
//! - the source selector and any pending file choice
//! - the session, recorder and detection counters
//!
//! Controls and ticks are handled on the calling thread only; `run` interleaves
//! them, draining queued controls before each tick.

use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use crate::config::CaptureConfig;
use crate::control::Control;
use crate::detect::{Model, Prediction};
use crate::detection_loop::{DetectionLoop, LoopStats};
use crate::error::CaptureError;
use crate::ingest::{SourceIntent, SourceSelector};
use crate::overlay::OverlayRenderer;
use crate::recorder::{encode_jpeg, Recorder, SavedArtifacts};
use crate::scheduler::{FrameScheduler, StopSignal};
use crate::session::Session;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// No source selected yet.
    Idle,
    /// A frame was processed and drawn.
    Rendered { retained: Vec<Prediction> },
    /// The source has nothing more to play.
    Ended,
}

pub struct CapturePage {
    config: CaptureConfig,
    model: Option<Box<dyn Model>>,
    renderer: Option<OverlayRenderer>,
    selector: SourceSelector,
    pending_upload: Option<String>,
    session: Session,
    recorder: Recorder,
    detection: DetectionLoop,
    saved: Vec<SavedArtifacts>,
    ended: bool,
}

impl CapturePage {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let selector = SourceSelector::new(config.camera_config(), config.network_config());
        let recorder = Recorder::new(config.output.jpeg_quality)?;
        Ok(Self {
            config,
            model: None,
            renderer: None,
            selector,
            pending_upload: None,
            session: Session::new(),
            recorder,
            detection: DetectionLoop::new(),
            saved: Vec::new(),
            ended: false,
        })
    }

    /// Install the loaded model and create the drawing surface.
    pub fn model_ready(&mut self, model: Box<dyn Model>) -> Result<()> {
        if self.renderer.is_none() {
            self.renderer = Some(OverlayRenderer::new(
                self.config.video.width,
                self.config.video.height,
            )?);
        }
        log::info!("model ready: {}", model.name());
        self.model = Some(model);
        Ok(())
    }

    pub fn is_model_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Remember a file choice. It takes precedence at the next source selection.
    pub fn choose_file(&mut self, path: impl Into<String>) {
        let path = path.into();
        log::info!("file chosen: {}", path);
        self.pending_upload = Some(path);
    }

    pub fn select_source(&mut self, intent: SourceIntent) -> Result<()> {
        if self.model.is_none() {
            return Err(CaptureError::ModelNotReady.into());
        }
        let intent = intent.resolve(self.pending_upload.as_deref());
        self.selector.select(intent)?;
        self.pending_upload = None;
        Ok(())
    }

    pub fn start_recording(&mut self) -> Result<()> {
        self.recorder.start(&mut self.session)
    }

    pub fn stop_recording(&mut self) -> Result<()> {
        self.recorder.stop(&self.session)
    }

    pub fn save(&mut self) -> Result<SavedArtifacts> {
        let saved = self.recorder.save(
            &self.session,
            &self.config.output.dir,
            &self.config.artifact_names(),
        )?;
        self.saved.push(saved.clone());
        Ok(saved)
    }

    /// Stop a recording that is still running and, with `save`, write it out.
    ///
    /// Meant for shutdown, including after `run` failed: the buffered session
    /// is still intact at that point.
    pub fn finish(&mut self, save: bool) -> Result<Option<SavedArtifacts>> {
        if !self.is_recording() {
            return Ok(None);
        }
        self.stop_recording()?;
        if !save {
            log::warn!("recording stopped at exit; it was not saved");
            return Ok(None);
        }
        self.save().map(Some)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn surface(&self) -> Option<&image::RgbImage> {
        self.renderer.as_ref().map(|renderer| renderer.surface())
    }

    /// Process one frame from the active source, if any.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.ended {
            return Ok(TickOutcome::Ended);
        }
        let frame = match self.selector.active() {
            None => return Ok(TickOutcome::Idle),
            Some(source) => source.next_frame()?,
        };
        let Some(frame) = frame else {
            log::info!("source finished after {} frames", self.detection.stats().frames);
            self.ended = true;
            return Ok(TickOutcome::Ended);
        };
        if self.selector.gate().on_loaded_data() {
            log::info!(
                "playback started ({}x{}), detection loop running",
                frame.width,
                frame.height
            );
        }

        let model = self.model.as_deref_mut().ok_or(CaptureError::ModelNotReady)?;
        let renderer = self
            .renderer
            .as_mut()
            .ok_or_else(|| anyhow!("drawing surface missing"))?;
        let retained = self
            .detection
            .step(model, &frame, &mut self.session, renderer)?;
        self.recorder.capture(&mut self.session, renderer.surface())?;

        if let Some(path) = &self.config.output.preview_file {
            let jpeg = encode_jpeg(renderer.surface(), self.config.output.jpeg_quality)?;
            std::fs::write(path, jpeg)
                .with_context(|| format!("failed to write preview {}", path.display()))?;
        }
        Ok(TickOutcome::Rendered { retained })
    }

    /// Apply one user control. Errors are for the caller to report.
    pub fn handle(&mut self, control: Control) -> Result<()> {
        match control {
            Control::ChooseFile(path) => {
                self.choose_file(path);
                Ok(())
            }
            Control::UseLocalCamera => self.select_source(SourceIntent::LocalCamera),
            Control::UseNetworkCamera => self.select_source(SourceIntent::NetworkCamera),
            Control::Upload(path) => {
                self.choose_file(path.clone());
                self.select_source(SourceIntent::Upload(path))
            }
            Control::StartRecording => self.start_recording(),
            Control::StopRecording => self.stop_recording(),
            Control::Save => self.save().map(|_| ()),
            Control::Quit => Ok(()),
        }
    }

    /// Drive the page until the source ends, `stop` is set, a `quit` control
    /// arrives, or `max_frames` frames have been rendered.
    pub fn run(
        &mut self,
        controls: &Receiver<Control>,
        stop: &StopSignal,
        max_frames: Option<u64>,
    ) -> Result<()> {
        let mut scheduler = FrameScheduler::new(self.config.video.target_fps);
        let mut controls_open = true;
        let mut last_health_log = Instant::now();

        while scheduler.wait(stop) {
            while controls_open {
                match controls.try_recv() {
                    Ok(Control::Quit) => {
                        log::info!("quit requested");
                        stop.stop();
                        break;
                    }
                    Ok(control) => {
                        if let Err(e) = self.handle(control) {
                            log::warn!("control rejected: {:#}", e);
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => controls_open = false,
                }
            }
            if stop.is_stopped() {
                break;
            }

            if self.tick()? == TickOutcome::Ended {
                break;
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                if let Some(source) = self.selector.active() {
                    let stats = source.stats();
                    log::debug!(
                        "{} health={} frames={} origin={}",
                        source.kind(),
                        source.is_healthy(),
                        stats.frames_captured,
                        stats.origin
                    );
                }
                last_health_log = Instant::now();
            }

            if let Some(limit) = max_frames {
                if self.detection.stats().frames >= limit {
                    log::info!("frame limit reached ({})", limit);
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            stats: self.detection.stats(),
            records: self.session.records().len(),
            saved: self
                .saved
                .iter()
                .flat_map(|saved| [saved.video.clone(), saved.report.clone()])
                .collect(),
        }
    }
}

/// What a run produced, printed at exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: LoopStats,
    /// Detections held by the current session.
    pub records: usize,
    pub saved: Vec<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames processed: {}", self.stats.frames)?;
        writeln!(
            f,
            "detections retained: {} (of {})",
            self.stats.retained, self.stats.predictions
        )?;
        if self.saved.is_empty() {
            write!(f, "files saved: none")
        } else {
            write!(f, "files saved:")?;
            for path in &self.saved {
                write!(f, "\n  {}", path.display())?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectorBackend, ScriptedBackend};
    use crate::error::capture_error;
    use std::sync::mpsc;

    fn config(out: &std::path::Path) -> CaptureConfig {
        let mut cfg = CaptureConfig::default();
        cfg.video.width = 64;
        cfg.video.height = 48;
        cfg.video.target_fps = 200;
        cfg.camera_device = "stub://webcam".to_string();
        cfg.network_url = "stub://ipcam".to_string();
        cfg.output.dir = out.to_path_buf();
        cfg
    }

    fn scripted(frames: Vec<Vec<Prediction>>) -> Box<dyn Model> {
        Box::new(ScriptedBackend::from_frames(frames)).load().unwrap()
    }

    #[test]
    fn sources_are_inert_until_model_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = CapturePage::new(config(dir.path())).unwrap();
        let err = page.select_source(SourceIntent::LocalCamera).unwrap_err();
        assert_eq!(capture_error(&err), Some(&CaptureError::ModelNotReady));
        assert_eq!(page.tick().unwrap(), TickOutcome::Idle);

        page.model_ready(scripted(Vec::new())).unwrap();
        page.select_source(SourceIntent::LocalCamera).unwrap();
        assert!(matches!(page.tick().unwrap(), TickOutcome::Rendered { .. }));
    }

    #[test]
    fn chosen_file_wins_over_camera() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = CapturePage::new(config(dir.path())).unwrap();
        page.model_ready(scripted(Vec::new())).unwrap();
        page.choose_file("stub://clip");
        page.select_source(SourceIntent::NetworkCamera).unwrap();

        let mut frames = 0;
        while let TickOutcome::Rendered { .. } = page.tick().unwrap() {
            frames += 1;
        }
        assert_eq!(frames, crate::ingest::file::SYNTHETIC_CLIP_FRAMES);
        assert_eq!(page.tick().unwrap(), TickOutcome::Ended);
    }

    #[test]
    fn rejected_controls_leave_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = CapturePage::new(config(dir.path())).unwrap();
        page.model_ready(scripted(Vec::new())).unwrap();

        let err = page.handle(Control::StopRecording).unwrap_err();
        assert!(matches!(capture_error(&err), Some(CaptureError::RecordingState(_))));
        page.handle(Control::StartRecording).unwrap();
        assert!(page.handle(Control::StartRecording).is_err());
        assert!(page.is_recording());
    }

    #[test]
    fn run_stops_on_quit_and_frame_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = CapturePage::new(config(dir.path())).unwrap();
        page.model_ready(scripted(Vec::new())).unwrap();
        page.select_source(SourceIntent::LocalCamera).unwrap();

        let (tx, rx) = mpsc::channel();
        let stop = StopSignal::new();
        page.run(&rx, &stop, Some(3)).unwrap();
        assert_eq!(page.summary().stats.frames, 3);

        tx.send(Control::Quit).unwrap();
        page.run(&rx, &stop, None).unwrap();
        assert!(stop.is_stopped());
        assert_eq!(page.summary().stats.frames, 3);
    }

    #[test]
    fn finish_without_save_only_stops() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut page = CapturePage::new(config(&out)).unwrap();
        assert_eq!(page.finish(true).unwrap(), None);

        page.start_recording().unwrap();
        assert_eq!(page.finish(false).unwrap(), None);
        assert!(!page.is_recording());
        assert!(!out.exists());
    }

    #[test]
    fn preview_file_is_rewritten_each_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        let preview = dir.path().join("preview.jpg");
        cfg.output.preview_file = Some(preview.clone());
        let mut page = CapturePage::new(cfg).unwrap();
        page.model_ready(scripted(Vec::new())).unwrap();
        page.select_source(SourceIntent::LocalCamera).unwrap();
        page.tick().unwrap();
        let bytes = std::fs::read(&preview).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
    }
}
