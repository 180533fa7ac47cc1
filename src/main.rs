//! videofx command-line driver.

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};
use videofx::capture::{read_image, CameraSource, FrameSource};
use videofx::config::{InputKind, RunConfig, RunPlan};
use videofx::effect::{EffectRuntime, HostRuntime};
use videofx::frame::duration_string;
use videofx::output::{FrameSink, ImageFileSink, Preview, PreviewWindow};
use videofx::progress::{console_progress, ProgressReporter};
use videofx::video::{FfmpegSink, FfmpegSource};
use videofx::{EffectSession, FxError, FxResult, StreamOutputs};

const WINDOW_TITLE: &str = "videofx";

/// Apply a video effect to an image, a video file or a webcam stream.
#[derive(Parser, Debug)]
#[command(name = "videofx", version)]
#[command(about = "Apply artifact reduction, super resolution or upscaling to images and video")]
struct Args {
    /// Input image or video file
    #[arg(long = "in-file", visible_alias = "in")]
    in_file: Option<PathBuf>,

    /// Use the webcam as input
    #[arg(long)]
    webcam: bool,

    /// Output image or video file
    #[arg(long = "out-file", visible_alias = "out")]
    out_file: Option<PathBuf>,

    /// Effect: Transfer, ArtifactReduction, SuperRes or Upscale
    #[arg(long)]
    effect: Option<String>,

    /// Show the processed frames in a window
    #[arg(long)]
    show: bool,

    /// Enhancement strength for SuperRes and Upscale, in [0, 1]
    #[arg(long)]
    strength: Option<f32>,

    /// 0 = conservative, 1 = aggressive
    #[arg(long)]
    mode: Option<u32>,

    /// Camera resolution as [WIDTHx]HEIGHT
    #[arg(long)]
    cam_res: Option<String>,

    /// Output height for SuperRes and Upscale
    #[arg(long)]
    resolution: Option<u32>,

    /// Directory holding the effect models
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Four-character code of the output video codec
    #[arg(long)]
    codec: Option<String>,

    /// Print progress
    #[arg(long)]
    progress: bool,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,

    /// Trace-level logging
    #[arg(long)]
    debug: bool,

    /// YAML file with default values for the options above
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available effects and exit
    #[arg(long)]
    list_effects: bool,

    /// List available cameras and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            in_file: self.in_file.clone(),
            webcam: self.webcam,
            out_file: self.out_file.clone(),
            effect: self.effect.clone(),
            show: self.show,
            strength: self.strength,
            mode: self.mode,
            cam_res: self.cam_res.clone(),
            resolution: self.resolution,
            model_dir: self.model_dir.clone(),
            codec: self.codec.clone(),
            progress: self.progress,
            verbose: self.verbose,
            debug: self.debug,
        }
    }
}

fn main() {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => RunConfig::load(path),
        None => Ok(RunConfig::default()),
    };
    let config = file_config.map(|file| file.merge(args.run_config()));

    let (verbose, debug) = match &config {
        Ok(c) => (c.verbose, c.debug),
        Err(_) => (args.verbose, args.debug),
    };
    let level = if debug {
        Level::TRACE
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let result = config.and_then(|config| run(&args, config));
    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e.description());
            e.code()
        }
    };
    std::process::exit(code);
}

fn run(args: &Args, config: RunConfig) -> FxResult<()> {
    let runtime = HostRuntime::new();

    if args.list_effects {
        print!("{}", runtime.info());
        return Ok(());
    }
    if args.list_devices {
        let devices = CameraSource::list_devices().map_err(|e| FxError::Read(e.to_string()))?;
        println!("Available cameras:");
        for device in devices {
            println!("  [{}] {}", device.index, device.name);
        }
        return Ok(());
    }

    let plan = config.validate().inspect_err(|e| {
        if matches!(e, FxError::Argument(_)) {
            let _ = Args::command().print_help();
        }
    })?;
    debug!("Effects:\n{}", runtime.info());

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    let mut print_progress = console_progress();
    let callback: Option<&mut dyn FnMut(f32)> = if plan.progress {
        Some(&mut print_progress)
    } else {
        None
    };
    let mut progress = ProgressReporter::new(callback);

    let mut session = EffectSession::create(&runtime, plan.effect, plan.model_dir.as_deref())?;
    match &plan.input {
        InputKind::Image(path) => run_image(&mut session, &plan, path, &mut progress),
        InputKind::Video(path) => {
            let mut source = FfmpegSource::open(path).map_err(|e| FxError::Read(format!("{:?}: {:#}", path, e)))?;
            log_stream_info(&path.display().to_string(), &source);
            if !source.info().codec.is_h264() {
                warn!("Filters only target H264 videos, not {}", source.info().codec);
            }
            run_stream(&mut session, &plan, &mut source, &mut progress, &cancel)
        }
        InputKind::Webcam => {
            let mut source = CameraSource::open(plan.camera)?;
            log_stream_info("webcam", &source);
            run_stream(&mut session, &plan, &mut source, &mut progress, &cancel)
        }
    }
}

fn run_image(
    session: &mut EffectSession,
    plan: &RunPlan,
    path: &std::path::Path,
    progress: &mut ProgressReporter<'_>,
) -> FxResult<()> {
    let frame = read_image(path)?;
    let mut sink = plan.output.as_ref().map(ImageFileSink::new);
    let mut preview = open_preview(plan)?;

    let outputs = StreamOutputs {
        sink: sink.as_mut().map(|s| s as &mut dyn FrameSink),
        preview: preview.as_mut().map(|p| p as &mut dyn Preview),
    };
    session.process_image(&frame, &plan.effect_config, outputs, progress)?;

    if let Some(preview) = preview.as_mut() {
        preview.hold().map_err(|e| FxError::Write(e.to_string()))?;
    }
    Ok(())
}

fn run_stream(
    session: &mut EffectSession,
    plan: &RunPlan,
    source: &mut dyn FrameSource,
    progress: &mut ProgressReporter<'_>,
    cancel: &AtomicBool,
) -> FxResult<()> {
    let info = source.info().clone();
    let (width, height) = session.allocate(info.width, info.height, &plan.effect_config)?;

    let mut sink = match &plan.output {
        Some(path) => match FfmpegSink::create(path, plan.codec, width, height, info.frame_rate) {
            Ok(sink) => Some(sink),
            Err(e) if plan.show => {
                warn!("Cannot write {:?} ({}), continuing with preview only", path, e);
                None
            }
            Err(e) => return Err(FxError::Write(format!("{:?}: {}", path, e))),
        },
        None => None,
    };
    let mut preview = open_preview(plan)?;

    let outputs = StreamOutputs {
        sink: sink.as_mut().map(|s| s as &mut dyn FrameSink),
        preview: preview.as_mut().map(|p| p as &mut dyn Preview),
    };
    let summary = session.process_stream(source, &plan.effect_config, outputs, progress, Some(cancel))?;

    if let Some(sink) = sink.as_mut() {
        sink.finish().map_err(|e| FxError::Write(e.to_string()))?;
    }
    info!("Processed {} frames", summary.frames);
    if cancel.load(Ordering::SeqCst) {
        return Err(FxError::Quit);
    }
    Ok(())
}

fn open_preview(plan: &RunPlan) -> FxResult<Option<PreviewWindow>> {
    if !plan.show {
        return Ok(None);
    }
    PreviewWindow::new(WINDOW_TITLE)
        .map(Some)
        .map_err(|e| FxError::Write(format!("preview window: {}", e)))
}

fn log_stream_info(name: &str, source: &dyn FrameSource) {
    let info = source.info();
    debug!("Input:      {}", name);
    debug!("Codec:      {}", info.codec);
    debug!("Width:      {}", info.width);
    debug!("Height:     {}", info.height);
    debug!("Frame rate: {:.3}", info.frame_rate);
    match (info.frame_count, info.duration_secs()) {
        (Some(count), Some(secs)) => {
            debug!("Frames:     {}", count);
            debug!("Duration:   {}", duration_string(secs));
        }
        _ => debug!("Frames:     unknown"),
    }
}
