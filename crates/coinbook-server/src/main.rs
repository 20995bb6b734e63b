use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use coinbook::config::{default_config_path, Config};
use coinbook::PortfolioService;
use coinbook_server::{app_router, AppState};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "coinbook-server")]
#[command(about = "HTTP API for coinbook portfolio valuation")]
struct Cli {
    /// Path to coinbook config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7004")]
    listen: SocketAddr,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load_or_default(&cli.config)?.with_env_overrides()?;
    let service = PortfolioService::from_config(&config)?;
    let router = app_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!(addr = %cli.listen, config = %cli.config.display(), "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}
