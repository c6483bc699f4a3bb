mod app;
mod display;
mod settings;

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facecap_core::detection::domain::cascade_classifier::DetectionParams;
use facecap_core::detection::face_detector::{DetectorConfig, FaceDetector};
use facecap_core::pipeline::capture_config::CaptureConfig;
use facecap_core::pipeline::pipeline_controller::PipelineController;
use facecap_core::pipeline::session_logger::LogSessionLogger;
use facecap_core::shared::constants::CASCADE_NAME;
use facecap_core::shared::resource_resolver::default_search_dirs;
use facecap_core::video::infrastructure::ffmpeg_source::FfmpegRuntime;

use crate::app::{Session, SessionEnd, SessionOptions};
use crate::settings::Settings;

/// Live face capture from a camera or video file.
///
/// Detected faces are outlined and each one is saved as an image under the
/// output directory.
#[derive(Parser, Debug)]
#[command(name = "facecap")]
struct Cli {
    /// Capture device index (e.g. 0) or path to a video file.
    #[arg(long)]
    source: Option<String>,

    /// Directory receiving face crops.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Cascade XML file to use instead of searching for the bundled one.
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Stop after this many frames (default: until end of stream or Ctrl-C).
    #[arg(long)]
    max_frames: Option<u64>,

    /// Write the last annotated frame to this image file on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Pyramid scale step between detection passes (> 1.0).
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Neighboring hits a detection needs to be kept.
    #[arg(long)]
    min_neighbors: Option<u32>,

    /// Smallest face to report, as N or WxH pixels.
    #[arg(long, value_parser = parse_size)]
    min_size: Option<(u32, u32)>,

    /// Frames buffered for the detector before new ones are dropped.
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Pace file playback by timestamps instead of decoding flat out.
    #[arg(long)]
    sync: bool,

    /// Store the effective settings as the new defaults.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = apply_overrides(Settings::load(), &cli);
    validate(&settings)?;

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }

    let mut controller = PipelineController::new(
        Box::new(FfmpegRuntime::new()),
        capture_config(&settings),
    );
    controller.set_source(&settings.source)?;
    let detector = FaceDetector::new(&detector_config(&settings));

    let (interrupt_tx, interrupt_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })?;

    let options = SessionOptions {
        max_frames: cli.max_frames,
        snapshot: cli.snapshot,
    };
    let mut session = Session::new(
        controller,
        detector,
        Box::new(LogSessionLogger::default()),
        options,
    );
    let end = session.run(&interrupt_rx)?;
    match end {
        SessionEnd::EndOfStream => log::info!("End of stream"),
        SessionEnd::FrameLimit => log::info!("Frame limit reached"),
        SessionEnd::Interrupted => log::info!("Stopped by user"),
    }
    eprintln!(
        "Processed {} frames, faces saved to {}",
        session.processed(),
        settings.output_dir.display()
    );
    Ok(())
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(source) = &cli.source {
        settings.source = source.clone();
    }
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = dir.clone();
    }
    if let Some(cascade) = &cli.cascade {
        settings.cascade = Some(cascade.clone());
    }
    if let Some(factor) = cli.scale_factor {
        settings.scale_factor = factor;
    }
    if let Some(n) = cli.min_neighbors {
        settings.min_neighbors = n;
    }
    if let Some(size) = cli.min_size {
        settings.min_size = size;
    }
    if let Some(capacity) = cli.queue_capacity {
        settings.queue_capacity = capacity;
    }
    if cli.sync {
        settings.sync = true;
    }
    settings
}

fn validate(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if settings.source.trim().is_empty() {
        return Err("Source must be a device index or a file path".into());
    }
    if settings.scale_factor.is_nan() || settings.scale_factor <= 1.0 {
        return Err(format!(
            "Scale factor must be greater than 1.0, got {}",
            settings.scale_factor
        )
        .into());
    }
    if settings.queue_capacity == 0 {
        return Err("Queue capacity must be at least 1".into());
    }
    if let Some(cascade) = &settings.cascade {
        if !cascade.is_file() {
            return Err(format!("Cascade file not found: {}", cascade.display()).into());
        }
    }
    Ok(())
}

fn capture_config(settings: &Settings) -> CaptureConfig {
    CaptureConfig {
        frame_queue_capacity: settings.queue_capacity,
        sync: settings.sync,
        ..CaptureConfig::default()
    }
}

fn detector_config(settings: &Settings) -> DetectorConfig {
    let (cascade_name, search_dirs) = match &settings.cascade {
        Some(path) => split_cascade_path(path),
        None => (CASCADE_NAME.to_string(), default_search_dirs()),
    };
    DetectorConfig {
        cascade_name,
        search_dirs,
        output_dir: settings.output_dir.clone(),
        params: DetectionParams {
            scale_factor: settings.scale_factor,
            min_neighbors: settings.min_neighbors,
            min_size: settings.min_size,
            max_size: None,
        },
        ..DetectorConfig::default()
    }
}

fn split_cascade_path(path: &Path) -> (String, Vec<PathBuf>) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| CASCADE_NAME.to_string());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (name, vec![dir])
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid size {value:?}, expected N or WxH"))
    };
    match value.split_once(|c: char| c == 'x' || c == 'X') {
        Some((w, h)) => Ok((parse(w)?, parse(h)?)),
        None => {
            let n = parse(value)?;
            Ok((n, n))
        }
    }
}
