//! capture_annotate - watch a video source, draw detections, record on demand
//!
//! Sources: local camera (V4L2), networked camera (HTTP MJPEG/JPEG), or a
//! local file. Recording controls come from stdin one command per line:
//!
//!   local | network | upload <path> | file <path> | start | stop | save | quit
//!
//! Configuration is read from the JSON file named by `CAPTURE_CONFIG` with
//! `CAPTURE_*` environment overrides; flags below override both.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::mpsc;

#[cfg(feature = "backend-tract")]
use capture_annotate::detect::{backends::tract::SSD_INPUT_SIZE, TractBackend};
use capture_annotate::{
    control, BackendRegistry, CaptureConfig, CapturePage, ScriptedBackend, SourceIntent,
    StopSignal,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    Local,
    Network,
    Upload,
}

#[derive(Parser, Debug)]
#[command(name = "capture_annotate", author, version, about)]
struct Args {
    /// Source to select at startup (local|network|upload). Omit to choose via stdin.
    #[arg(long, value_enum)]
    source: Option<SourceArg>,
    /// File to play. Takes precedence over camera sources.
    #[arg(long, value_name = "PATH")]
    file: Option<String>,
    /// Start recording right away; stop and save on exit.
    #[arg(long)]
    record: bool,
    /// Stop after this many processed frames.
    #[arg(long, value_name = "N")]
    frames: Option<u64>,
    /// Output directory for the recorded video and report.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
    /// Detection backend name (scripted, tract).
    #[arg(long, value_name = "NAME")]
    backend: Option<String>,
    /// Prediction script for the scripted backend.
    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,
    /// Ignore stdin; run from flags only.
    #[arg(long)]
    no_stdin: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = CaptureConfig::load()?;
    if let Some(out) = &args.out {
        cfg.output.dir = out.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.clone();
    }
    if let Some(script) = &args.script {
        cfg.detector.script_path = Some(script.clone());
    }

    let interactive = !args.no_stdin && std::io::stdin().is_terminal();
    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal(), interactive);

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.stop())?;
    }

    let mut page = CapturePage::new(cfg.clone())?;

    let stage = ui.stage("Load detection model");
    let mut registry = build_registry(&cfg);
    stage.detail(&format!("available: {}", registry.list().join(", ")));
    registry.set_default(&cfg.detector.backend)?;
    page.model_ready(registry.load_default()?)?;
    stage.done();

    if let Some(path) = &args.file {
        page.choose_file(path.clone());
    }
    if let Some(intent) = startup_intent(&args)? {
        let stage = ui.stage("Select source");
        match page.select_source(intent) {
            Ok(()) => stage.done(),
            Err(e) if !args.no_stdin => {
                drop(stage);
                log::warn!("source not available: {:#}; choose another via stdin", e);
            }
            Err(e) => return Err(e),
        }
    }
    if args.record {
        page.start_recording()?;
    }

    let (tx, rx) = mpsc::channel();
    if args.no_stdin {
        drop(tx);
    } else {
        control::spawn_stdin_reader(tx)?;
        eprintln!("commands: local | network | upload <path> | file <path> | start | stop | save | quit");
    }

    log::info!(
        "running at {} fps, output dir {}",
        cfg.video.target_fps,
        cfg.output.dir.display()
    );
    let run_result = page.run(&rx, &stop, args.frames);
    if let Err(e) = &run_result {
        log::error!("capture stopped: {:#}", e);
    }
    let finish_result = page.finish(args.record);

    println!("{}", page.summary());
    run_result?;
    finish_result?;
    Ok(())
}

fn build_registry(cfg: &CaptureConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(match &cfg.detector.script_path {
        Some(path) => ScriptedBackend::from_path(path),
        None => ScriptedBackend::default(),
    });
    #[cfg(feature = "backend-tract")]
    if let Some(path) = &cfg.detector.model_path {
        registry.register(TractBackend::new(path, SSD_INPUT_SIZE, SSD_INPUT_SIZE));
    }
    registry
}

fn startup_intent(args: &Args) -> Result<Option<SourceIntent>> {
    let intent = match (args.source, &args.file) {
        (Some(SourceArg::Local), _) => SourceIntent::LocalCamera,
        (Some(SourceArg::Network), _) => SourceIntent::NetworkCamera,
        (Some(SourceArg::Upload), Some(path)) | (None, Some(path)) => {
            SourceIntent::Upload(path.clone())
        }
        (Some(SourceArg::Upload), None) => {
            return Err(anyhow!("--source upload needs --file <PATH>"));
        }
        (None, None) => return Ok(None),
    };
    Ok(Some(intent))
}
