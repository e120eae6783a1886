//! CLI entry point for SUMP captures.
//!
//! Builds a capture configuration from flags and either prints the resolved
//! protocol parameters or runs a capture against the simulated analyzer.
//!
//! # Usage
//!
//! Show what the device would be armed with:
//! ```bash
//! sump-capture params --rate 200000000 --channels 0x00ffffff --samples 8192
//! ```
//!
//! Capture with a deadline (cancelled when it expires):
//! ```bash
//! sump-capture capture --profile ols.toml --samples 65536 --timeout-ms 500
//! ```

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sump_acquisition::{
    AcquisitionController, AcquisitionOutcome, SumpDevice, VirtualBehavior, VirtualDevice,
};
use sump_core::{CaptureConfig, DeviceProfile};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sump-capture")]
#[command(about = "Configure and run SUMP logic analyzer captures", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved protocol parameters as JSON
    Params(CaptureArgs),

    /// Run a capture against the simulated analyzer
    Capture {
        #[command(flatten)]
        args: CaptureArgs,

        /// Cancel the capture if it runs longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Keep the transfer open until the deadline cancels it
        #[arg(long, requires = "timeout_ms")]
        hold: bool,
    },
}

#[derive(Args)]
struct CaptureArgs {
    /// Device profile (TOML); defaults to the Logic Sniffer profile
    #[arg(long, env = "SUMP_PROFILE")]
    profile: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 100_000_000)]
    rate: i64,

    /// Number of samples to capture
    #[arg(long, default_value_t = 4096)]
    samples: i64,

    /// Enabled channel mask, hex (0x...) or signed decimal
    #[arg(long, default_value = "0xffffffff", value_parser = parse_mask)]
    channels: u32,

    /// Trigger position as a fraction of the buffer
    #[arg(long, default_value_t = 0.5)]
    ratio: f64,

    /// Enable run-length encoding
    #[arg(long)]
    rle: bool,

    /// Enable the noise filter (ignored under double data rate)
    #[arg(long)]
    filter: bool,
}

impl CaptureArgs {
    fn profile(&self) -> Result<DeviceProfile> {
        match &self.profile {
            Some(path) => DeviceProfile::load(path)
                .with_context(|| format!("Failed to load profile {}", path.display())),
            None => Ok(DeviceProfile::default()),
        }
    }

    fn build_config(&self, profile: Arc<DeviceProfile>) -> Result<CaptureConfig> {
        let mut config = CaptureConfig::new(profile);
        config.set_sample_rate(self.rate)?;
        config.set_sample_count(self.samples)?;
        config.set_enabled_channels(self.channels);
        config.set_trigger_ratio(self.ratio)?;
        config.set_rle_enabled(self.rle);
        config.set_filter_enabled(self.filter);
        Ok(config)
    }
}

/// Parse a channel mask, keeping the bit pattern of negative decimals.
fn parse_mask(raw: &str) -> std::result::Result<u32, String> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u32::from_str_radix(&hex.replace('_', ""), 16).map_err(|e| e.to_string());
    }
    if raw.starts_with('-') {
        return raw.parse::<i32>().map(|v| v as u32).map_err(|e| e.to_string());
    }
    raw.parse::<u32>().map_err(|e| e.to_string())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Commands::Params(args) => {
            let config = args.build_config(Arc::new(args.profile()?))?;
            println!("{}", serde_json::to_string_pretty(&config.resolve())?);
        }
        Commands::Capture {
            args,
            timeout_ms,
            hold,
        } => {
            let mut device = VirtualDevice::new("virtual0").with_profile(args.profile()?);
            if hold {
                device = device.with_behavior(VirtualBehavior::HoldUntilCancelled);
            }
            let device = Arc::new(device);
            let config = args.build_config(device.profile())?;

            let outcome = run_capture(device, config, timeout_ms.map(Duration::from_millis)).await?;
            report(&outcome);
        }
    }

    Ok(())
}

async fn run_capture(
    device: Arc<VirtualDevice>,
    config: CaptureConfig,
    deadline: Option<Duration>,
) -> Result<AcquisitionOutcome> {
    let controller = Arc::new(AcquisitionController::new());
    let id = device.id();

    info!(device = %id, "Starting capture");
    let mut task = tokio::spawn(controller.clone().acquire_async(device, Some(config)));

    let outcome = match deadline {
        None => task.await.context("Capture task panicked")??,
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined.context("Capture task panicked")??,
            Err(_) => {
                warn!(device = %id, timeout_ms = limit.as_millis() as u64, "Deadline reached, cancelling");
                // The blocking task may not have armed the device yet
                while let Err(e) = controller.cancel(&id) {
                    if task.is_finished() {
                        warn!("Cancel after deadline: {}", e);
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                task.await.context("Capture task panicked")??
            }
        },
    };

    Ok(outcome)
}

fn report(outcome: &AcquisitionOutcome) {
    let result = outcome.result();
    let status = if outcome.is_cancelled() {
        "cancelled"
    } else {
        "complete"
    };

    println!("Capture {status}: {} samples in {:?}", result.len(), result.elapsed);
    println!(
        "  rate {} Hz, divider {}, {} channels, groups {:#06b}",
        result.parameters.sample_rate,
        result.parameters.divider,
        result.parameters.channel_count,
        result.parameters.group_mask
    );
    match result.trigger_position() {
        Some(position) => println!("  trigger at sample {position}"),
        None => println!("  trigger outside received buffer"),
    }
}
