use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use formguard::config::FormguardConfig;
use formguard::http::{AppState, HttpServer};
use formguard::inquiry::{Dispatcher, LogSink};
use formguard::ratelimit::PolicyRegistry;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "formguard", version)]
#[command(about = "Rate-limited partner inquiry endpoint")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "FORMGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address from configuration
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match args.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting Formguard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = FormguardConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    let policies = PolicyRegistry::new(config.rate_limiting.store_options())
        .with_overrides(&config.rate_limiting.policies)?;
    info!(
        cleanup_interval_secs = config.rate_limiting.cleanup_interval_secs,
        "Rate limit policies initialized"
    );

    let dispatcher = Dispatcher::new(Arc::new(LogSink), config.mail.clone());
    let state = AppState::new(Arc::new(policies), Arc::new(dispatcher));

    HttpServer::new(config.server.listen_addr, state)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Formguard stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
