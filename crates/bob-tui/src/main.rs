//! `bob-tui` — Terminal dashboard for live BOB camera detections.
//!
//! Built on [ratatui](https://ratatui.rs). A `ModeController` from
//! `bob-core` decides between the live backend stream and the built-in
//! simulator; a render loop turns the detection buffer into a display
//! list that the dashboard paints onto a canvas scaled to the camera frame.
//!
//! Logs are written to a file (default `/tmp/bob-tui.log`) to avoid
//! corrupting the terminal UI.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use bob_core::ModeController;

use crate::app::App;

/// Terminal dashboard for the BOB bird detector.
#[derive(Parser, Debug)]
#[command(name = "bob-tui", version, about)]
struct Cli {
    /// Backend URL (e.g., http://camera.local:8000)
    #[arg(short = 'u', long, env = "BOB_URL")]
    url: Option<String>,

    /// Config file path (defaults to the platform config dir)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Skip the startup probe and run on simulated detections
    #[arg(long)]
    simulate: bool,

    /// Log file path (defaults to /tmp/bob-tui.log)
    #[arg(long, default_value = "/tmp/bob-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// File-only tracing; stdout belongs to the terminal UI. The returned
/// guard must outlive the app so buffered lines get flushed.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "bob_tui={log_level},bob_core={log_level},bob_api={log_level}"
        ))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("bob-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tui::install_hooks()?;
    let _log_guard = setup_tracing(&cli);

    // Priority: CLI flags > env > config file > defaults
    let config_path = cli.config.clone().unwrap_or_else(bob_config::config_path);
    let mut config = bob_config::load_config_from(&config_path)?;
    if let Some(url) = &cli.url {
        config.backend.url.clone_from(url);
    }

    let mut core = bob_config::to_core_config(&config)?;
    core.start_simulated = cli.simulate;

    info!(
        url = %core.backend_url,
        config = %config_path.display(),
        simulate = cli.simulate,
        "starting bob-tui"
    );

    let controller = ModeController::new(core)?;
    let mut app = App::new(controller, config, config_path);
    app.run().await?;

    Ok(())
}
