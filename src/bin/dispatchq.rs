//! dispatchq CLI — throttled fan-out against the analytics backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use dispatchq::client::AnalyticsClient;
use dispatchq::config::{Config, PoolRegistry};
use dispatchq::dispatch::{Dispatcher, fan_out};
use dispatchq::telemetry::{TelemetryConfig, init_telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "dispatchq", about = "Bounded-concurrency fan-out for analytics requests")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze tickers through the dispatcher and print the batch as JSON
    Analyze {
        /// Ticker symbols
        #[arg(required = true)]
        tickers: Vec<String>,
        /// Concurrency ceiling (defaults to DISPATCH_MAX_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Send one batch request instead of one request per ticker
        #[arg(long)]
        batch: bool,
    },
    /// Print price history for one ticker
    History {
        ticker: String,
        /// 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 3y, 5y, 10y, max
        #[arg(long, default_value = "3y")]
        period: String,
    },
    /// Run synthetic work to show the ceiling in action
    Simulate {
        #[arg(long, default_value_t = 24)]
        items: usize,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        /// Per-item latency
        #[arg(long, default_value_t = 250)]
        latency_ms: u64,
    },
    /// List configured pools
    Pools {
        /// Pools TOML file (defaults to DISPATCH_POOLS_FILE)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "dispatchq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Analyze {
            tickers,
            concurrency,
            batch,
        } => cmd_analyze(&config, tickers, concurrency, batch).await,
        Command::History { ticker, period } => cmd_history(&config, ticker, period).await,
        Command::Simulate {
            items,
            concurrency,
            latency_ms,
        } => cmd_simulate(items, concurrency, latency_ms).await,
        Command::Pools { config: path } => cmd_pools(&config, path),
    }
}

async fn cmd_analyze(
    config: &Config,
    tickers: Vec<String>,
    concurrency: Option<usize>,
    batch: bool,
) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(concurrency.unwrap_or(config.max_concurrency))?;
    let client = AnalyticsClient::new(&config.backend_url, dispatcher);

    let start = Instant::now();
    let reports = if batch {
        client.analyze_batch(tickers.as_slice()).await?
    } else {
        client.analyze_all(tickers.as_slice()).await
    };
    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    info!(
        tickers = reports.len(),
        failed,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "batch analyzed"
    );

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn cmd_history(config: &Config, ticker: String, period: String) -> anyhow::Result<()> {
    let client = AnalyticsClient::new(&config.backend_url, Dispatcher::new(1)?);
    let history = client.history(&ticker, Some(&period)).await?;
    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}

async fn cmd_simulate(items: usize, concurrency: usize, latency_ms: u64) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(concurrency)?;
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let latency = Duration::from_millis(latency_ms);

    let start = Instant::now();
    let settled = fan_out(&dispatcher, 0..items, |_| {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            running.fetch_sub(1, Ordering::SeqCst);
        }
    })
    .await;
    let elapsed = start.elapsed();

    let aborted = settled.iter().filter(|s| s.result.is_err()).count();
    let sequential = latency * items as u32;
    println!("items:          {items}");
    println!("concurrency:    {concurrency}");
    println!("peak in flight: {}", peak.load(Ordering::SeqCst));
    println!("aborted:        {aborted}");
    println!("wall time:      {}ms", elapsed.as_millis());
    println!("sequential est: {}ms", sequential.as_millis());
    if !elapsed.is_zero() {
        println!(
            "speedup:        {:.1}x",
            sequential.as_secs_f64() / elapsed.as_secs_f64()
        );
    }
    Ok(())
}

fn cmd_pools(config: &Config, path: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(path) = path.or_else(|| config.pools_file.clone()) else {
        anyhow::bail!("no pools file given (pass --config or set DISPATCH_POOLS_FILE)");
    };
    let registry = PoolRegistry::load_from_file(&path)?;

    if registry.is_empty() {
        println!("No pools configured.");
        return Ok(());
    }

    println!("{:<20}  MAX_CONCURRENCY", "POOL");
    println!("{}", "-".repeat(40));
    for name in registry.names() {
        if let Some(dispatcher) = registry.get(name) {
            println!("{:<20}  {}", name, dispatcher.max_concurrency());
        }
    }
    println!("\n{} pool(s)", registry.len());
    Ok(())
}
