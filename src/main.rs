mod aggregate;
mod config;
mod error;
mod filter;
mod geocode;
mod models;
mod normalize;
mod scrapers;
mod server;

use aggregate::{AggregateRequest, Aggregator};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use geocode::{Geocoder, NominatimGeocoder};
use scrapers::{DirectFetcher, FallbackOrchestrator, RenderedFetcher};
use server::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "property-scout")]
#[command(about = "Scrape and filter UK property listings", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Scrape one search URL and print its listings as JSON
    Scrape {
        #[arg(long)]
        target: String,
        /// Include the extraction trace in the output
        #[arg(long)]
        debug: bool,
    },
    /// Scrape several sites, geocode and filter, and print the result as JSON
    Aggregate {
        /// Search URL; repeat for more sites. Defaults to the configured sources.
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// List the supported sites
    Sites,
}

fn init_tracing(config: &Config) {
    // RUST_LOG wins over the configured level
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        info!("Logging level set from RUST_LOG environment variable");
        return;
    }

    let level = config.tracing_level.to_lowercase();
    let max_level = match level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid tracing level '{}', using 'info'", level);
            tracing::Level::INFO
        }
    };
    tracing_subscriber::fmt().with_max_level(max_level).init();
}

fn build_aggregator(config: &Config) -> Result<Aggregator> {
    let primary = Arc::new(RenderedFetcher::new(config.browser.clone()));
    let fallback = Arc::new(
        DirectFetcher::new(&config.direct).context("Failed to build direct fetcher")?,
    );
    let orchestrator = FallbackOrchestrator::new(primary, fallback);

    let geocoder: Option<Arc<dyn Geocoder>> = if config.geocoder.enabled {
        Some(Arc::new(NominatimGeocoder::new(&config.geocoder)?))
    } else {
        warn!("Geocoding disabled; aggregated listings cannot be located");
        None
    };

    Ok(Aggregator::new(orchestrator, geocoder, config.max_concurrent_sites))
}

/// Cancel the token on Ctrl-C so in-flight renders shut their browsers
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config);

    match args.command {
        Command::Serve => {
            info!("Starting property-scout {}", env!("CARGO_PKG_VERSION"));
            let state = AppState {
                aggregator: Arc::new(build_aggregator(&config)?),
                default_criteria: config.criteria.clone(),
                shutdown: CancellationToken::new(),
            };
            server::serve(&config.bind_address, state).await?;
        }
        Command::Scrape { target, debug } => {
            let aggregator = build_aggregator(&config)?;
            let cancel = cancel_on_ctrl_c();
            let outcome = aggregator
                .scrape(&target, &cancel)
                .await
                .with_context(|| format!("Scrape of {} failed", target))?;

            let fallback = outcome.used_fallback();
            let mut output = serde_json::json!({
                "success": true,
                "count": outcome.listings.len(),
                "properties": outcome.listings,
                "fallback": fallback,
            });
            if debug {
                output["debug"] = serde_json::json!(outcome.trace);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Aggregate { targets } => {
            let targets = if targets.is_empty() {
                config
                    .sources
                    .iter()
                    .map(|source| {
                        info!("Using configured source {}", source.name);
                        source.target.clone()
                    })
                    .collect()
            } else {
                targets
            };
            let request = AggregateRequest {
                targets,
                criteria: config.criteria.clone(),
            };

            let aggregator = build_aggregator(&config)?;
            let cancel = cancel_on_ctrl_c();
            let result = aggregator.run(&request, &cancel).await?;

            for error in &result.errors {
                warn!("{}", error);
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Sites => {
            for site in scrapers::sites::ALL {
                println!("{:<14} {}", site.name, site.base_url);
            }
        }
    }

    Ok(())
}
