//! feedtap - remote-browser feed extraction and live media capture.
//!
//! Main entry point: loads configuration, sets up logging, and runs a
//! session against an already-running Chrome.

mod cli;
mod console;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use feedtap_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use feedtap_core::Hub;
use feedtap_site::Session;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

/// Initialize tracing with console and file output.
///
/// Log files rotate daily under the configured log directory. The returned
/// guard flushes the file writer when dropped.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let log_dir = logging.dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&logging.file_prefix)
        .max_log_files(14)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

fn load_config(path: &Path, endpoint: Option<String>) -> anyhow::Result<Config> {
    let mut config = ConfigLoader::load_or_default(path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(endpoint) = endpoint {
        config.browser.endpoint = endpoint;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config, cli.endpoint)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Run => {
            let _guard = init_tracing(&config.logging)?;
            run(config).await
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("Starting feedtap v{}", env!("CARGO_PKG_VERSION"));

    let warnings = ConfigValidator::validate(&config).into_result()?;
    for warning in warnings {
        warn!("config {}: {}", warning.path, warning.message);
    }

    let hub = Arc::new(Hub::new());
    let session = Session::connect(&config, hub, Arc::new(console::ConsoleSink))
        .await
        .with_context(|| format!("starting session on {}", config.browser.endpoint))?;

    let result = tokio::select! {
        result = console::run(&session) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    session.shutdown().await;
    result
}
