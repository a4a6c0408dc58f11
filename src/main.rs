use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use dmconvert_rs::depth_pipeline::{
    BackendKind, CameraConfig, CameraSource, DepthBlur, DepthPipeline, FrameSink, FrameSource,
    ImageDirSink, ImageDirSource, ImageFormat, ImageSinkConfig, ModelConfig, ModelKind,
    RunOutcome, ScreenSink, ShiftDirection, SinkContent, StabilizerConfig, StereoConfig,
    StereoSynthesizer, TemporalStabilizer, TiffCompression, VideoFileSink, VideoFileSource,
    load_estimator,
};
use dmconvert_rs::logger;

/// Exit status after a batch run cut short by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Video,
    Camera,
    Images,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Screen,
    Images,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    Right,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Tract,
    Luma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Png,
    Tiff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VideoContent {
    Image,
    Depth,
}

/// Converts video, camera or image streams into depth maps and anaglyphs.
#[derive(Parser, Debug)]
#[command(name = "dmconvert", version)]
struct Cli {
    #[arg(value_enum)]
    mode: Mode,

    /// Video file, camera device (`/dev/video0`, `0`, `stub://demo`) or image directory
    source: String,

    /// Output targets, repeatable
    #[arg(long = "targets", value_enum, num_args = 1.., default_values_t = [Target::Screen])]
    targets: Vec<Target>,

    /// Directory for image output, or the video file when video is the only file target
    #[arg(long, default_value = "dm_output")]
    output: PathBuf,

    /// Append the red/cyan stereo synthesizer
    #[arg(long)]
    anaglyph: bool,

    #[arg(long, default_value_t = 23)]
    max_offset: u32,

    #[arg(long, value_enum, default_value_t = Direction::Right)]
    direction: Direction,

    /// Gaussian blur of the depth map before stereo synthesis
    #[arg(long)]
    smooth_depth: bool,

    /// Depth blur strength as a box size, 1 to 30; implies --smooth-depth
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=30))]
    blur_strength: Option<u32>,

    /// Temporal stabilisation of depth maps over static scenes
    #[arg(long)]
    stabilize: bool,

    #[arg(long, default_value_t = 5)]
    window: usize,

    #[arg(long, default_value_t = 0)]
    return_index: usize,

    #[arg(long, default_value_t = 2.0)]
    motion_threshold: f64,

    /// Use the large model instead of the small one
    #[arg(long)]
    large_model: bool,

    /// Explicit model file
    #[arg(long)]
    model: Option<PathBuf>,

    /// Depth backend, tract when compiled in and luma otherwise
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    image_format: OutputFormat,

    #[arg(long)]
    write_depth: bool,

    #[arg(long)]
    write_image: bool,

    #[arg(long)]
    write_concat: bool,

    #[arg(long, value_enum, default_value_t = VideoContent::Image)]
    video_content: VideoContent,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn open_source(cli: &Cli) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match cli.mode {
        Mode::Video => Box::new(
            VideoFileSource::open(&cli.source)
                .with_context(|| format!("open video {}", cli.source))?,
        ),
        Mode::Camera => Box::new(
            CameraSource::open(CameraConfig {
                device: cli.source.clone(),
                ..CameraConfig::default()
            })
            .with_context(|| format!("open camera {}", cli.source))?,
        ),
        Mode::Images => Box::new(
            ImageDirSource::open(&cli.source)
                .with_context(|| format!("open image directory {}", cli.source))?,
        ),
    };
    Ok(source)
}

fn video_path(cli: &Cli) -> PathBuf {
    if cli.targets.contains(&Target::Images) || cli.output.extension().is_none() {
        cli.output.join("depth.mp4")
    } else {
        cli.output.clone()
    }
}

fn build_sinks(cli: &Cli) -> Result<Vec<Box<dyn FrameSink>>> {
    let mut sinks: Vec<Box<dyn FrameSink>> = Vec::new();
    let mut targets: Vec<Target> = Vec::new();
    for target in &cli.targets {
        if !targets.contains(target) {
            targets.push(*target);
        }
    }

    for target in targets {
        match target {
            Target::Screen => sinks.push(Box::new(ScreenSink::default())),
            Target::Images => {
                let format = match cli.image_format {
                    OutputFormat::Png => ImageFormat::Png,
                    OutputFormat::Tiff => ImageFormat::Tiff(TiffCompression::DeflateBalanced),
                };
                // Depth maps are the default product when nothing is picked.
                let nothing_picked = !(cli.write_depth || cli.write_image || cli.write_concat);
                let config = ImageSinkConfig::builder()
                    .write_depth(cli.write_depth || nothing_picked)
                    .write_image(cli.write_image)
                    .write_concat(cli.write_concat)
                    .format(format)
                    .build();
                sinks.push(Box::new(ImageDirSink::new(&cli.output, config)));
            }
            Target::Video => {
                let path = video_path(cli);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
                let content = match cli.video_content {
                    VideoContent::Image => SinkContent::Image,
                    VideoContent::Depth => SinkContent::Depth,
                };
                let sink = VideoFileSink::create(&path, content)
                    .with_context(|| format!("create video output {}", path.display()))?;
                sinks.push(Box::new(sink));
            }
        }
    }
    Ok(sinks)
}

fn depth_blur(cli: &Cli) -> Option<DepthBlur> {
    match cli.blur_strength {
        Some(strength) => Some(DepthBlur::from_strength(strength)),
        None if cli.smooth_depth => Some(DepthBlur::default()),
        None => None,
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let model = ModelConfig {
        backend: match cli.backend {
            Some(Backend::Tract) => BackendKind::Tract,
            Some(Backend::Luma) => BackendKind::Luma,
            None => BackendKind::default(),
        },
        kind: if cli.large_model {
            ModelKind::Large
        } else {
            ModelKind::Small
        },
        path: cli.model.clone(),
        ..ModelConfig::default()
    };
    let estimator = load_estimator(&model).context("load depth estimator")?;
    let source = open_source(&cli)?;

    let mut pipeline = DepthPipeline::new(source, estimator);
    for sink in build_sinks(&cli)? {
        pipeline.add_sink(sink);
    }
    if cli.stabilize {
        let config = StabilizerConfig::builder()
            .window_size(cli.window)
            .return_index(cli.return_index)
            .motion_threshold_percent(cli.motion_threshold)
            .build();
        pipeline = pipeline.with_postprocessor(Arc::new(TemporalStabilizer::new(config)));
    }
    if let Some(blur) = depth_blur(&cli) {
        pipeline = pipeline.with_postprocessor(Arc::new(blur));
    }
    if cli.anaglyph {
        let config = StereoConfig {
            max_offset: cli.max_offset,
            direction: match cli.direction {
                Direction::Right => ShiftDirection::Right,
                Direction::Left => ShiftDirection::Left,
            },
        };
        pipeline = pipeline.with_postprocessor(Arc::new(StereoSynthesizer::new(config)));
    }

    let handle = pipeline.handle();
    ctrlc::set_handler(move || handle.interrupt()).context("install Ctrl-C handler")?;

    let report = pipeline.start().context("pipeline run failed")?;
    info!(frames = report.frames_processed, outcome = ?report.outcome, "Done");

    if report.outcome == RunOutcome::Interrupted && cli.mode != Mode::Camera {
        warn!("Interrupted before the end of the input");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.verbose {
        logger::init_with_default("debug");
    } else {
        logger::init();
    }

    info!(mode = ?cli.mode, source = %cli.source, targets = ?cli.targets, "Starting dmconvert");
    run(cli)
}
