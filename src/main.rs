//! pg-change-monitor - PostgreSQL change monitor
//!
//! Snapshots every table and view on a fixed interval and reports what
//! changed since the previous snapshot. Settings are re-read every cycle,
//! so edits to the settings file take effect without a restart.

use anyhow::Context;
use clap::Parser;
use pg_change_monitor::config::{Settings, SettingsLoader};
use pg_change_monitor::connection::ConnectionParams;
use pg_change_monitor::monitor::Monitor;
use pg_change_monitor::report::{JsonReporter, LogReporter, Reporter};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pg-change-monitor")]
#[command(about = "Report table and row changes in a PostgreSQL database")]
#[command(version)]
struct Cli {
    /// Settings file, re-read before every cycle
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Print change events as JSON lines on stdout
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Validate the settings file and exit
    #[arg(long, default_value_t = false)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (ignore errors if file not found)
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    if cli.check {
        let settings = Settings::load(&cli.settings)
            .with_context(|| format!("invalid settings in {}", cli.settings.display()))?;
        info!(
            "Settings OK: {} every {:?}, {} allowed, {} excluded",
            ConnectionParams::from(&settings.database).to_display_string(),
            settings.interval,
            settings.only_detect.len(),
            settings.excluded.len()
        );
        return Ok(());
    }

    let reporter: Box<dyn Reporter> = if cli.json {
        Box::new(JsonReporter::new(std::io::stdout()))
    } else {
        Box::new(LogReporter)
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let mut monitor = Monitor::new(SettingsLoader::new(cli.settings), reporter);
    monitor.run(&cancel, cli.once).await;

    Ok(())
}

/// Initialize tracing with structured logging on stderr
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .init();
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }

    token.cancel();
}
