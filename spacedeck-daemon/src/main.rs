//! Spacedeck - console host daemon
//!
//! Samples the console's switches and dials, mirrors every change to the
//! game coordinator and relays the coordinator's display instructions to
//! the LED controller board.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use spacedeck_core::config::ConsoleConfig;
use spacedeck_core::StateSampler;

use crate::config::Overrides;
use crate::inputs::{PinBank, SysfsGpioInputs};
use crate::link::{ControllerLink, NoResetLine, ResetLine, SysfsResetLine};
use crate::outputs::{LogSoundSink, LogTextSink, OutputStage};
use crate::scheduler::{SchedulerLoop, SchedulerOptions};
use crate::sync::{SyncClient, SyncOptions};
use crate::tasks::PanelPoller;
use crate::watchdog::Watchdog;

mod config;
mod error;
mod inputs;
mod link;
mod outputs;
mod scheduler;
mod sync;
mod tasks;
mod watchdog;

#[derive(Debug, Parser)]
#[command(name = "spacedeck", version, about = "Console host daemon")]
struct Cli {
    /// Console configuration file (defaults to the embedded console.toml)
    #[arg(long, env = "SPACEDECK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run without a coordinator, logging state changes instead
    #[arg(long)]
    local: bool,

    /// Controller serial device
    #[arg(long, value_name = "PATH")]
    serial: Option<String>,

    /// Coordinator address
    #[arg(long, value_name = "HOST:PORT")]
    server: Option<String>,

    /// sysfs GPIO wired to the controller's reset pin
    #[arg(long, value_name = "GPIO")]
    reset_pin: Option<u32>,
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = if let Ok(v) = std::env::var("RUST_LOG") {
        v
    } else if let Ok(v) = std::env::var("SPACEDECK_LOG") {
        match v.as_str() {
            "silent" => "off".to_string(),
            other => other.to_string(),
        }
    } else {
        "info".to_string()
    };

    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        serial: cli.serial,
        server: cli.server,
    };
    let config = config::load(cli.config.as_deref(), &overrides).context("loading configuration")?;
    info!(
        controls = config.controls.len(),
        port = %config.serial.port,
        local = cli.local,
        "spacedeck starting"
    );

    match cli.reset_pin {
        Some(pin) => serve(config, SysfsResetLine::new(pin), cli.local).await,
        None => serve(config, NoResetLine, cli.local).await,
    }
}

async fn serve<R: ResetLine>(config: ConsoleConfig, reset: R, local: bool) -> Result<()> {
    let link = Arc::new(ControllerLink::connect(&config.serial).context("opening controller link")?);
    let bank = Arc::new(PinBank::new());
    let stage = Arc::new(Mutex::new(OutputStage::new(&config.outputs)));
    let sync = (!local).then(|| SyncClient::new(SyncOptions::from(&config.sync)));

    let panel = PanelPoller::new(
        vec![SysfsGpioInputs::from_controls(&config.controls)],
        Arc::clone(&bank),
        Arc::clone(&stage),
        LogTextSink,
        LogSoundSink,
    );

    let mut scheduler = SchedulerLoop::new(
        SchedulerOptions::from(&config.scheduler),
        link,
        reset,
        StateSampler::from_config(&config.controls),
        bank,
        stage,
        sync,
        Watchdog::from_env(),
    );

    let stop = scheduler.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            stop.store(true, Ordering::Release);
        }
    });

    scheduler.run(panel).await.context("console session ended")?;
    info!("spacedeck stopped");
    Ok(())
}
