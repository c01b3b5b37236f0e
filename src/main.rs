use anyhow::{Context, Result};
use appending_recorder::audio::SyntheticCapture;
use appending_recorder::{AppendingRecorder, ChannelObserver, Config, RecorderEvent};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Record from the microphone onto the end of a WAV file
#[derive(Parser, Debug)]
#[command(name = "appending-recorder")]
#[command(version)]
struct Cli {
    /// WAV file to create or append to
    #[arg(value_name = "FILE")]
    destination: PathBuf,

    /// Stop automatically after this many seconds (otherwise Ctrl+C)
    #[arg(short = 's', long, value_name = "SECS")]
    seconds: Option<f64>,

    /// Input device name (overrides the config file)
    #[arg(short = 'd', long, value_name = "NAME")]
    device: Option<String>,

    /// Record a test tone instead of the microphone
    #[arg(long, conflicts_with = "device")]
    synthetic: bool,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(device) = cli.device.clone() {
        config.input_device = Some(device);
    }
    config.validate()?;

    let mut builder = AppendingRecorder::builder(&cli.destination).config(config);
    if cli.synthetic {
        builder = builder.capture(SyntheticCapture::default());
    }
    let recorder = builder
        .build()
        .with_context(|| format!("Failed to open {:?}", cli.destination))?;

    let (observer, mut events) = ChannelObserver::new();
    recorder.set_observer(&observer);

    tracing::info!(
        "{:?} holds {:.2}s; recording, press Ctrl+C to stop",
        recorder.path(),
        recorder.duration()
    );
    recorder.record();

    let stop_after = async {
        match cli.seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop_after);
    let mut stopping = false;

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                RecorderEvent::Progress { duration } => {
                    tracing::debug!("Recorded {:.2}s", duration);
                }
                RecorderEvent::Stopped { duration } => {
                    tracing::info!("Saved {:?} ({:.2}s total)", recorder.path(), duration);
                    break;
                }
                RecorderEvent::Error(err) => {
                    return Err(anyhow::Error::new(err).context("Recording failed"));
                }
            },
            _ = tokio::signal::ctrl_c(), if !stopping => {
                tracing::info!("Received Ctrl+C, stopping");
                stopping = true;
                recorder.stop();
            }
            _ = &mut stop_after, if !stopping => {
                stopping = true;
                recorder.stop();
            }
        }
    }

    Ok(())
}
