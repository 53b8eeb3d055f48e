//! depth-markers CLI: detect AR markers in a color frame and, with a depth
//! frame and a camera, their poses and the camera movement.

use clap::{Args, Parser, Subcommand, ValueEnum};
use depth_markers::io::{load_color, load_depth};
use depth_markers::pose::{
    BuiltinCalibrations, CalibrationProvider, CameraCalibration, CaptureNegotiation,
    StreamSettings,
};
use depth_markers::{read_json, Frame, FrameOutput, PipelineBuilder, PipelineConfig};
use serde::Serialize;
use std::path::PathBuf;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "depth-markers")]
#[command(about = "Detect square AR markers and track the camera with a depth sensor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect markers in a frame and write a JSON report.
    Detect(DetectArgs),

    /// Print the built-in calibration matching a camera label as JSON.
    Calibration {
        /// Device label, e.g. "Intel RealSense SR300".
        #[arg(long)]
        camera: String,
    },
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Color frame.
    #[arg(long)]
    color: PathBuf,

    /// 16-bit depth frame in raw sensor units. Enables pose estimation.
    #[arg(long)]
    depth: Option<PathBuf>,

    /// Device label selecting a built-in calibration.
    #[arg(long, conflicts_with = "calibration")]
    camera: Option<String>,

    /// Calibration JSON file, instead of a built-in one.
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Pipeline config JSON; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report path. The report goes to stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Structured JSON logs (needs the `tracing` feature).
    #[arg(long)]
    json_log: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Serialize)]
struct DetectReport {
    color: PathBuf,
    depth: Option<PathBuf>,
    width: usize,
    height: usize,
    #[serde(flatten)]
    output: FrameOutput,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => {
            init_logging(args.log_level, args.json_log);
            run_detect(&args)
        }
        Commands::Calibration { camera } => run_calibration(&camera),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(level: LogLevel, json: bool) {
    let _ = tracing_log::LogTracer::init_with_filter(level.into());
    depth_markers::core::init_tracing(json);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LogLevel, json: bool) {
    let _ = depth_markers::core::init_with_level(level.into());
    if json {
        log::warn!("--json-log needs the `tracing` feature, using plain logs");
    }
}

fn run_calibration(camera: &str) -> CliResult<()> {
    let calibration = BuiltinCalibrations.calibration(camera)?;
    println!("{}", serde_json::to_string_pretty(&calibration)?);
    Ok(())
}

fn resolve_calibration(args: &DetectArgs) -> CliResult<CameraCalibration> {
    match (&args.camera, &args.calibration) {
        (Some(label), _) => Ok(BuiltinCalibrations.calibration(label)?),
        (None, Some(path)) => Ok(read_json(path)?),
        (None, None) => Err("--depth needs --camera or --calibration".into()),
    }
}

/// Still frames carry no frame rate.
fn still(width: usize, height: usize) -> StreamSettings {
    StreamSettings {
        width,
        height,
        frame_rate: 0.0,
    }
}

fn run_detect(args: &DetectArgs) -> CliResult<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load_json(path)?,
        None => PipelineConfig::default(),
    };

    log::info!("loading color frame {}", args.color.display());
    let color = load_color(&args.color).map_err(|e| -> CliError {
        format!("failed to open {}: {e}", args.color.display()).into()
    })?;
    let depth = match &args.depth {
        Some(path) => {
            log::info!("loading depth frame {}", path.display());
            Some(load_depth(path).map_err(|e| -> CliError {
                format!("failed to open {}: {e}", path.display()).into()
            })?)
        }
        None => None,
    };

    let mut builder = PipelineBuilder::new(config);
    if let Some(depth) = &depth {
        let negotiation = CaptureNegotiation {
            depth: still(depth.width, depth.height),
            color: still(color.width, color.height),
        };
        builder = builder.calibration(resolve_calibration(args)?, negotiation);
    }
    let mut pipeline = builder.build()?;

    let mut frame = Frame::new(color.as_view());
    if let Some(depth) = &depth {
        frame = frame.with_depth(depth.as_view());
    }
    let output = pipeline.process(&frame)?;
    log::info!(
        "detected {} markers, {} with a pose",
        output.markers.len(),
        output.poses.len()
    );

    let report = DetectReport {
        color: args.color.clone(),
        depth: args.depth.clone(),
        width: color.width,
        height: color.height,
        output,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            log::info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
