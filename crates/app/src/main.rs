use std::{path::PathBuf, thread, time::Duration};

use clap::{Parser, Subcommand};
use spectroscope_core::{dominant_bin, AppConfig, CaptureBackend, CpalBackend, Scope};
use tracing_subscriber::EnvFilter;

fn main() -> spectroscope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Run {
            device,
            config,
            scale,
            frames,
            fps,
        } => run(device, config.as_ref(), scale, frames, fps),
        Commands::InitConfig { output } => init_config(&output),
    }
}

fn list_devices() -> spectroscope_core::Result<()> {
    let backend = CpalBackend::new();
    for device in backend.devices()? {
        println!("Recording device {}: {}", device.index, device.name);
    }
    Ok(())
}

fn run(
    device: usize,
    config: Option<&PathBuf>,
    scale: Option<f32>,
    frames: Option<u64>,
    fps: f32,
) -> spectroscope_core::Result<()> {
    let mut config = match config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };
    if let Some(scale) = scale {
        config.analysis.scale = scale;
    }
    if !(fps.is_finite() && fps > 0.0) {
        return Err(format!("frame rate must be positive, got {fps}").into());
    }

    let mut scope = Scope::new(CpalBackend::new(), &config)?;
    let spec = scope.start(device)?.clone();
    let axes = scope.axes();
    tracing::info!(
        device = spec.index,
        name = %spec.name,
        sample_rate = spec.sample_rate,
        format = %spec.format,
        period = ?spec.period,
        channels = spec.channels,
        t0 = axes.period(),
        f0 = axes.resolution(),
        "capturing"
    );

    let frame_time = Duration::from_secs_f32(1.0 / fps);
    let mut rendered = 0u64;
    while frames.map_or(true, |limit| rendered < limit) {
        if scope.update()? {
            let frame = scope.frame();
            if let Some((bin, magnitude)) = dominant_bin(frame.spectrum) {
                tracing::info!(
                    frequency_hz = frame.frequency[bin],
                    magnitude,
                    "dominant frequency"
                );
            }
        }
        rendered += 1;
        thread::sleep(frame_time);
    }

    scope.stop();
    Ok(())
}

fn init_config(output: &PathBuf) -> spectroscope_core::Result<()> {
    tracing::info!(?output, "writing default configuration");
    AppConfig::default().write_to(output)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Live audio waveform and spectrum analyser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available recording devices.
    Devices,
    /// Capture from a device and report the dominant frequency every frame.
    Run {
        /// Index of the recording device, as printed by `devices`.
        #[arg(short, long, default_value_t = 0)]
        device: usize,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Spectrum scaling, overriding the configuration.
        #[arg(short, long)]
        scale: Option<f32>,
        /// Stop after this many frames instead of running forever.
        #[arg(short, long)]
        frames: Option<u64>,
        /// Polling rate of the consumer loop.
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
    },
    /// Write the default configuration to a file.
    InitConfig {
        /// Path of the configuration file to create.
        output: PathBuf,
    },
}
