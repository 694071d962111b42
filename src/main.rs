//! SNIPER — Autonomous new-token acquisition agent for the XRP Ledger
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects to the ledger, loads the wallet, and runs the periodic
//! scan→evaluate→acquire loop with graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sniper::config;
use sniper::engine::evaluator::Evaluator;
use sniper::engine::executor::Executor;
use sniper::engine::scanner::Scanner;
use sniper::engine::scheduler::{Pipeline, Scheduler, SchedulerConfig};
use sniper::ledger::jsonrpc::JsonRpcGateway;
use sniper::ledger::wallet::LocalWallet;
use sniper::ledger::{LedgerGateway, Signer};
use sniper::strategy::FirstTrustLineBalance;

const BANNER: &str = r#"
 ____  _   _ ___ ____  _____ ____
/ ___|| \ | |_ _|  _ \| ____|  _ \
\___ \|  \| || || |_) |  _| | |_) |
 ___) | |\  || ||  __/| |___|  _ <
|____/|_| \_|___|_|   |_____|_| \_\

  XRPL new-token acquisition agent
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        endpoint = %cfg.ledger.endpoint,
        scan_interval_secs = cfg.agent.scan_interval_secs,
        fee_xrp = %cfg.acquisition.fee_xrp,
        market_cap_threshold = %cfg.acquisition.market_cap_threshold,
        dry_run = cfg.agent.dry_run,
        "SNIPER starting up"
    );

    // -- Ledger session and wallet ---------------------------------------

    let gateway: Arc<dyn LedgerGateway> = Arc::new(JsonRpcGateway::new(
        cfg.ledger.endpoint.clone(),
        Duration::from_secs(cfg.ledger.request_timeout_secs),
        Duration::from_millis(cfg.ledger.submit_poll_interval_ms),
        cfg.ledger.max_fee_drops,
    )?);
    gateway
        .connect()
        .await
        .context("Failed to connect to ledger")?;

    let seed = config::AppConfig::resolve_secret(&cfg.ledger.seed_env)?;
    let wallet: Arc<dyn Signer> =
        Arc::new(LocalWallet::from_seed(&seed).context("Failed to load wallet")?);

    // -- Pipeline --------------------------------------------------------

    let pipeline = Arc::new(Pipeline::new(
        Scanner::new(Arc::clone(&gateway), cfg.ledger.scan_limit),
        Evaluator::new(
            Arc::clone(&gateway),
            Arc::new(FirstTrustLineBalance),
            cfg.acquisition.market_cap_threshold,
        ),
        Executor::new(
            Arc::clone(&gateway),
            wallet,
            cfg.acquisition.fee_xrp,
            cfg.agent.dry_run,
        ),
        cfg.agent.max_concurrent_evaluations,
    ));

    let scheduler = Scheduler::new(
        pipeline,
        SchedulerConfig {
            interval: cfg.scan_interval(),
            max_concurrent: cfg.agent.max_concurrent_evaluations,
            single_flight: cfg.agent.single_flight,
        },
    );

    // -- Main loop -------------------------------------------------------

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    let cycles = scheduler.run(shutdown).await;

    if let Err(e) = gateway.disconnect().await {
        warn!(error = %e, "Disconnect failed");
    }
    info!(cycles, "SNIPER shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sniper=info"));

    let json_logging = std::env::var("SNIPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
