use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coinbook::config::{default_config_path, Config};
use coinbook::format::render_snapshot;
use coinbook::portfolio::AggregatorOptions;
use coinbook::PortfolioService;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    coinbook::duration::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "coinbook")]
#[command(about = "Value crypto exchange balances in USD")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Value the balances held on one or more exchanges
    Value {
        /// Exchange identifiers, e.g. `binance kraken`
        #[arg(required = true)]
        exchanges: Vec<String>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Exchanges queried at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Overall request budget (e.g. "30s", "2m")
        #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
        timeout: Option<Duration>,
    },
    /// List supported exchanges
    Exchanges,
    /// Show the effective configuration
    Config,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load_or_default(&cli.config)?.with_env_overrides()?;

    match cli.command {
        Command::Value {
            exchanges,
            json,
            concurrency,
            timeout,
        } => {
            let service = PortfolioService::from_config(&config)?;
            let defaults = service.options().clone();
            let options = AggregatorOptions {
                concurrency: concurrency.unwrap_or(defaults.concurrency).max(1),
                request_timeout: timeout.or(defaults.request_timeout),
            };
            let service = service.with_options(options);

            let snapshot = service.portfolio_value(&exchanges).await;
            if json {
                let rendered = serde_json::to_string_pretty(&snapshot)
                    .context("Failed to serialize snapshot")?;
                println!("{rendered}");
            } else {
                print!("{}", render_snapshot(&snapshot, &config.display));
            }
        }
        Command::Exchanges => {
            let service = PortfolioService::from_config(&config)?;
            for id in service.supported_exchanges() {
                println!("{id}");
            }
        }
        Command::Config => {
            println!("# Config file: {}", cli.config.display());
            let rendered =
                toml::to_string_pretty(&config.redacted()).context("Failed to render config")?;
            print!("{rendered}");
        }
    }

    Ok(())
}
