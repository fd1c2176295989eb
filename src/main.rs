use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_fetch::config::AppConfig;
use order_fetch::domain::order::OrderStatus;
use order_fetch::fetching::{MemoryStore, PgStore, SearchFilter, Store};
use order_fetch::metrics::{start_metrics_server, FetchMetrics};
use order_fetch::repository::{FetchStrategy, OrderRepository};

/// Run the order search through each fetch strategy and print the results.
#[derive(Debug, Parser)]
#[command(name = "order_fetch", version)]
struct Cli {
    /// Only orders in this status
    #[arg(long, value_enum)]
    status: Option<StatusArg>,

    /// Substring of the customer name
    #[arg(long)]
    name: Option<String>,

    #[arg(long, value_enum, default_value_t = StrategyArg::All)]
    strategy: StrategyArg,

    /// Config file (defaults to ./order_fetch.toml)
    #[arg(long, env = "ORDER_FETCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Placed,
    Canceled,
}

impl From<StatusArg> for OrderStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Placed => OrderStatus::Placed,
            StatusArg::Canceled => OrderStatus::Canceled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Direct,
    PostMap,
    FetchJoined,
    Projection,
    All,
}

impl StrategyArg {
    fn strategies(self) -> Vec<FetchStrategy> {
        match self {
            StrategyArg::Direct => vec![FetchStrategy::DirectExposure],
            StrategyArg::PostMap => vec![FetchStrategy::PostMap],
            StrategyArg::FetchJoined => vec![FetchStrategy::FetchJoined],
            StrategyArg::Projection => vec![FetchStrategy::DirectProjection],
            StrategyArg::All => FetchStrategy::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug order_fetch --strategy post-map
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_fetch=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    tracing::info!(
        max_rows = config.fetch.max_rows,
        strict_fetch = config.fetch.strict_fetch,
        "🚀 Starting order fetch demo"
    );

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(FetchMetrics::new()?);

    if let Some(port) = config.metrics_port {
        // Start metrics HTTP server in background thread
        let registry = Arc::new(metrics.registry().clone());
        std::thread::spawn(move || {
            let system = actix_web::rt::System::new();
            if let Err(e) = system.block_on(start_metrics_server(registry, port)) {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 2. Pick a store ===
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            let store = PgStore::connect(url, config.pool_size, Duration::from_secs(5))
                .await
                .context("connecting to Postgres")?;
            Arc::new(store)
        }
        None => {
            tracing::info!("No database_url configured, using the seeded in-memory store");
            Arc::new(MemoryStore::sample())
        }
    };

    let repository = OrderRepository::new(store, config.fetch.clone()).with_metrics(metrics.clone());

    // === 3. Run the strategies ===
    let mut filter = SearchFilter::new();
    filter.status = cli.status.map(OrderStatus::from);
    filter.name_pattern = cli.name;

    for strategy in cli.strategy.strategies() {
        let summaries = repository
            .fetch(strategy, &filter)
            .await
            .with_context(|| format!("running strategy {}", strategy))?
            .into_summaries()?;

        let output = serde_json::json!({
            "strategy": strategy,
            "orders": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    if let Some(port) = config.metrics_port {
        tracing::info!("📊 Metrics available on port {}; press Ctrl-C to exit", port);
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
