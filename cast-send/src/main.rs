//! cast-send - Background daemon for scheduled posting
//!
//! Watches the schedule queue and publishes content when it falls due.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use libcastlane::{CastlaneError, Config, PublishingService};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cast-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
cast-send - Background daemon for scheduled posting

DESCRIPTION:
    cast-send is a long-running daemon that watches the Castlane queue and
    publishes scheduled content when it falls due.

    Every poll interval it claims each due schedule, posts it through the
    matching platform adapter and records the outcome. Failed posts are not
    retried; reschedule them or post them with `cast-queue now`.

USAGE:
    # Run in foreground (logs to stderr)
    cast-send

    # Run with custom poll interval
    cast-send --poll-interval 30

    # Process whatever is due once and exit
    cast-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current pass)

CONFIGURATION:
    Configuration file: ~/.config/castlane/config.toml
    Database location: ~/.local/share/castlane/castlane.db

    [scheduler]
    poll_interval = 60   # seconds between passes
    claim_timeout = 900  # seconds before an unfinished dispatch is failed

LOGGING:
    CASTLANE_LOG_FORMAT  text (default), json or pretty
    CASTLANE_LOG_LEVEL   default level when RUST_LOG is unset

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration or database error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libcastlane::logging::init("info", cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<CastlaneError>()
            .map(CastlaneError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(seconds) = cli.poll_interval {
        config.scheduler.poll_interval = seconds;
    }

    let service = PublishingService::from_config(&config).await?;
    for platform in service.adapters().platforms() {
        if let Some(adapter) = service.adapters().get(platform) {
            if !adapter.is_configured() {
                warn!(platform = %platform, "Platform has no credentials; its schedules will fail");
            }
        }
    }

    let scheduler = service.scheduler(config.scheduler.clone());

    if cli.once {
        let report = scheduler.run_pass(Utc::now()).await?;
        println!(
            "due={} completed={} failed={} skipped={} interrupted={}",
            report.due, report.completed, report.failed, report.skipped, report.interrupted
        );
        return Ok(());
    }

    info!("cast-send daemon starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    setup_signal_handlers(shutdown_tx).context("Signal setup failed")?;

    scheduler.run(shutdown_rx).await;

    info!("cast-send daemon stopped");
    Ok(())
}

/// Flip `shutdown` on SIGINT or SIGTERM
#[cfg(unix)]
fn setup_signal_handlers(shutdown: watch::Sender<bool>) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Received shutdown signal, stopping after the current pass");
            let _ = shutdown.send(true);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: watch::Sender<bool>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping after the current pass");
            let _ = shutdown.send(true);
        }
    });
    Ok(())
}
