//! Swap Executor CLI
//!
//! Builds a transaction through the configured factory, then simulates it or
//! executes it with the configured strategy and reports whether it landed.

use anyhow::{Context, Result};
use clap::Parser;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swap_executor::config::Config;
use swap_executor::endpoints;
use swap_executor::observability::solscan_tx_url;
use swap_executor::wallet::WalletManager;
use swap_executor::{
    Executor, LedgerClient, RpcLedgerClient, StrategyKind, SwapOrchestrator, SwapReport,
    TransferFactory,
};

/// Environment variable holding a base58 secret key
const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Simulate only; nothing is submitted
    #[arg(long)]
    simulate: bool,

    /// Override the configured strategy (direct, priority_bundle)
    #[arg(long)]
    strategy: Option<String>,

    /// Transfer recipient
    #[arg(long)]
    to: String,

    /// Transfer amount in lamports
    #[arg(long)]
    lamports: u64,

    /// Priority fee in micro-lamports per compute unit
    #[arg(long, env = "COMPUTE_UNIT_PRICE")]
    compute_unit_price: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first so the log format can follow it
    let mut config = load_config(&args.config)?;
    init_logging(args.verbose, config.monitoring.json_logs)?;

    info!("Starting swap executor v{}", env!("CARGO_PKG_VERSION"));

    if let Some(strategy) = &args.strategy {
        config.execution.strategy = StrategyKind::from_str(strategy)?;
    }
    if args.simulate {
        config.execution.simulate_only = true;
    }
    config.validate().context("Invalid configuration")?;

    let wallet = load_wallet(&config)?;
    info!(wallet = %wallet.pubkey(), "Wallet loaded");

    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let ledger: Arc<dyn LedgerClient> = Arc::new(RpcLedgerClient::new(
        config.rpc.url.clone(),
        config.rpc_timeout(),
        config.commitment()?,
    ));
    let executor = Executor::from_settings(&config.executor_settings(), ledger.clone())?;
    info!(
        rpc = %config.rpc.url,
        strategy = %config.execution.strategy,
        max_retries = config.execution.max_retries,
        simulate_only = config.execution.simulate_only,
        "Executor ready"
    );

    let recipient = Pubkey::from_str(&args.to).context("Invalid --to address")?;
    let mut factory = TransferFactory::new(recipient, args.lamports);
    if let Some(price) = args.compute_unit_price {
        factory = factory.with_compute_unit_price(price);
    }

    let orchestrator = SwapOrchestrator::new(ledger, executor, config.execution.max_retries);
    let report = orchestrator
        .run(&factory, wallet.keypair(), config.execution.simulate_only)
        .await?;

    match &report {
        SwapReport::Simulated(sim) => {
            info!(
                succeeded = sim.succeeded(),
                units_consumed = ?sim.units_consumed,
                error = ?sim.error,
                "Simulated"
            );
        }
        SwapReport::Executed { outcome, attempts } => {
            info!(confirmed = outcome.is_confirmed(), attempts, "Execution finished");
            match outcome.signature() {
                Some(signature) if outcome.is_confirmed() => {
                    info!("{}", solscan_tx_url(&signature.to_string()));
                }
                _ => warn!(outcome = %outcome, "Transaction did not land"),
            }
        }
    }

    if report.is_success() {
        Ok(())
    } else {
        anyhow::bail!("swap did not succeed")
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "swap_executor=debug,info"
    } else {
        "swap_executor=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// `PRIVATE_KEY` wins over `[wallet].keypair_path`
fn load_wallet(config: &Config) -> Result<WalletManager> {
    if let Ok(secret) = std::env::var(PRIVATE_KEY_ENV) {
        if !secret.trim().is_empty() {
            return WalletManager::from_base58(&secret)
                .with_context(|| format!("Failed to load wallet from {PRIVATE_KEY_ENV}"));
        }
    }
    match &config.wallet.keypair_path {
        Some(path) => WalletManager::from_file(path).context("Failed to load wallet"),
        None => anyhow::bail!("{PRIVATE_KEY_ENV} is empty and no [wallet].keypair_path is set"),
    }
}
