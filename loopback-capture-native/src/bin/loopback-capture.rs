//! loopback-capture CLI
//!
//! Detect capture capabilities, list devices, probe the setup and record
//! system audio to a file.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use loopback_capture_core::models::device::classify_devices;
use loopback_capture_core::{
    AudioLevels, CapabilityRecord, CaptureConfig, CaptureEngine, Collaborators, DeviceDescriptor, LevelCallback,
    MediaDevices, PermissionState, PlatformFamily, Quality, SetupReport,
};
use loopback_capture_native::permissions::check_microphone_permission;
use loopback_capture_native::{
    CpalMediaDevices, DriverOptions, NativeLoopbackDriver, NativeLoopbackStrategy, SystemProbe,
};

const DEFAULT_RECORD_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QualityArg {
    /// 16 kHz
    Low,
    /// 44.1 kHz
    Medium,
    /// 48 kHz
    High,
    /// 96 kHz
    Ultra,
}

impl From<QualityArg> for Quality {
    fn from(q: QualityArg) -> Self {
        match q {
            QualityArg::Low => Quality::Low,
            QualityArg::Medium => Quality::Medium,
            QualityArg::High => Quality::High,
            QualityArg::Ultra => Quality::Ultra,
        }
    }
}

#[derive(Parser)]
#[command(name = "loopback-capture")]
#[command(about = "Capture system audio through the best available method")]
#[command(version)]
struct Cli {
    /// JSON capture configuration; flags override its fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Capture tool to run for native loopback recording
    #[arg(long, global = true, default_value = "ffmpeg")]
    program: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected capability record
    Detect,

    /// List capture tool devices and native input endpoints
    Devices,

    /// Report which capture method would be used, without capturing
    Probe,

    /// Record a fixed-duration capture to a file
    Record {
        /// Output file
        #[arg(short, long, default_value = "capture.wav")]
        output: PathBuf,

        /// Recording length in seconds
        #[arg(short, long)]
        duration: Option<u32>,

        #[arg(short, long, value_enum)]
        quality: Option<QualityArg>,

        /// Output channel count (1 or 2)
        #[arg(long)]
        channels: Option<u16>,

        #[arg(short, long)]
        gain: Option<f32>,

        /// Device name handed to the capture tool
        #[arg(long)]
        device: Option<String>,

        /// Input endpoint for microphone fallback
        #[arg(long)]
        microphone_device: Option<String>,

        /// Record the microphone only
        #[arg(long)]
        microphone_only: bool,

        /// Fail instead of falling back to the microphone
        #[arg(long, conflicts_with = "microphone_only")]
        no_microphone_fallback: bool,

        /// Skip interactive capture methods
        #[arg(long)]
        automatic_only: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceListing {
    tool: Option<String>,
    tool_devices: Vec<DeviceDescriptor>,
    endpoints: Vec<DeviceDescriptor>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport {
    #[serde(flatten)]
    setup: SetupReport,
    microphone: PermissionState,
    capabilities: CapabilityRecord,
}

type CliResult<T> = Result<T, Box<dyn Error>>;

fn load_config(path: Option<&Path>) -> CliResult<CaptureConfig> {
    let Some(path) = path else {
        return Ok(CaptureConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let config = serde_json::from_str(&text).map_err(|e| format!("invalid config {}: {}", path.display(), e))?;
    log::info!("loaded capture config from {}", path.display());
    Ok(config)
}

fn driver(program: &str) -> Option<NativeLoopbackDriver> {
    DriverOptions::for_platform(PlatformFamily::current())
        .map(|options| NativeLoopbackDriver::new(options.with_program(program)))
}

fn build_engine(program: &str) -> CaptureEngine {
    let capabilities = SystemProbe::with_program(program).detect();
    let mut collaborators = Collaborators::default().with_media(Arc::new(CpalMediaDevices::new()));
    if capabilities.has_native_loopback_tool {
        if let Some(driver) = driver(program) {
            collaborators = collaborators.with_platform_strategy(Arc::new(NativeLoopbackStrategy::new(driver)));
        }
    }
    CaptureEngine::new(capabilities, collaborators)
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_devices(program: &str) -> CliResult<()> {
    let mut listing = DeviceListing {
        tool: None,
        tool_devices: Vec::new(),
        endpoints: Vec::new(),
    };

    if let Some(driver) = driver(program) {
        match driver.check_available().await {
            Ok(version) => {
                listing.tool = Some(version);
                listing.tool_devices = driver.list_devices().await?;
            }
            Err(e) => log::warn!("{}", e),
        }
    }

    match CpalMediaDevices::new().enumerate_devices().await {
        Ok(endpoints) => listing.endpoints = classify_devices(endpoints),
        Err(e) => log::warn!("{}", e),
    }
    print_json(&listing)
}

async fn cmd_probe(program: &str, config: &CaptureConfig) -> CliResult<()> {
    let engine = build_engine(program);
    let setup = engine.probe_setup(config).await;
    print_json(&ProbeReport {
        setup,
        microphone: check_microphone_permission(),
        capabilities: engine.capabilities().clone(),
    })
}

async fn cmd_record(program: &str, config: CaptureConfig, output: &Path) -> CliResult<()> {
    let mut engine = build_engine(program);
    let on_levels: LevelCallback = Arc::new(|levels: &AudioLevels| {
        log::debug!("volume {:.3} peak {:.3}", levels.volume, levels.peak);
    });

    log::info!("recording {} s to {}", config.duration_secs, output.display());
    let payload = engine.capture_once(config, Some(on_levels)).await?;
    std::fs::write(output, &payload.bytes).map_err(|e| format!("cannot write {}: {}", output.display(), e))?;
    print_json(&payload.metadata)
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Detect => print_json(&SystemProbe::with_program(&cli.program).detect()),
        Commands::Devices => cmd_devices(&cli.program).await,
        Commands::Probe => cmd_probe(&cli.program, &config).await,
        Commands::Record {
            output,
            duration,
            quality,
            channels,
            gain,
            device,
            microphone_device,
            microphone_only,
            no_microphone_fallback,
            automatic_only,
        } => {
            if let Some(quality) = quality {
                config = config.with_quality(quality.into());
            }
            if let Some(channels) = channels {
                config.channels = channels;
            }
            if let Some(gain) = gain {
                config.gain = gain;
            }
            if device.is_some() {
                config.native_device = device;
            }
            if microphone_device.is_some() {
                config.microphone_device = microphone_device;
            }
            if microphone_only {
                config.prefer_system_audio = false;
                config.allow_microphone_fallback = true;
            }
            if no_microphone_fallback {
                config.allow_microphone_fallback = false;
            }
            config.automatic_only |= automatic_only;
            config.duration_secs = duration
                .or((config.duration_secs > 0).then_some(config.duration_secs))
                .unwrap_or(DEFAULT_RECORD_SECS);

            cmd_record(&cli.program, config, &output).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
