//! FUNDING MONITOR: multi-venue perpetual funding rate scanner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the dashboard, wires the sources into the fan-out collector,
//! and runs the cycle loop until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use funding_monitor::config::AppConfig;
use funding_monitor::dashboard;
use funding_monitor::engine::collector::FanOutCollector;
use funding_monitor::engine::publisher::SnapshotPublisher;
use funding_monitor::engine::scheduler::CycleScheduler;
use funding_monitor::engine::scorer::OpportunityScorer;
use funding_monitor::notify::telegram::TelegramNotifier;
use funding_monitor::notify::{Notifier, NullNotifier};
use funding_monitor::sources;

const BANNER: &str = r#"
  ___ _   _ _  _ ___ ___ _  _  ___   __  __  ___  _  _
 | __| | | | \| |   \_ _| \| |/ __| |  \/  |/ _ \| \| |
 | _|| |_| | .` | |) | || .` | (_ | | |\/| | (_) | .` |
 |_|  \___/|_|\_|___/___|_|\_|\___| |_|  |_|\___/|_|\_|

  Positive funding rate scanner v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("FUNDING_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let mut cfg = AppConfig::load(&config_path)?;
    cfg.apply_env_overrides()?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        interval_secs = cfg.monitor.fetch_interval_secs,
        min_spread = cfg.monitor.min_spread,
        periods_per_year = cfg.monitor.periods_per_year(),
        timeout_secs = cfg.sources.timeout_secs,
        "Funding monitor starting up"
    );

    // -- Initialise components -------------------------------------------

    let publisher = Arc::new(SnapshotPublisher::new());

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(Arc::clone(&publisher), cfg.dashboard.port);
    }

    let notifier: Arc<dyn Notifier> = match cfg.notifier.credentials() {
        Some(creds) => {
            info!(
                alert_rate = cfg.notifier.alert_rate,
                cooldown_secs = cfg.notifier.cooldown_secs,
                "Telegram alerts enabled"
            );
            Arc::new(TelegramNotifier::new(creds, &cfg.notifier)?)
        }
        None => {
            warn!("Telegram not configured, alerts disabled");
            Arc::new(NullNotifier)
        }
    };

    let registry = sources::build_sources(&cfg.sources)?;
    let collector = FanOutCollector::new(registry, cfg.sources.timeout())
        .context("Invalid funding source registry")?;

    let mut scheduler = CycleScheduler::new(
        collector,
        OpportunityScorer::new(cfg.monitor.periods_per_year()),
        Arc::clone(&publisher),
        notifier,
        cfg.monitor.fetch_interval(),
    )
    .with_console_top_n(cfg.monitor.console_top_n);

    // -- Shutdown wiring ---------------------------------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received.");
            let _ = shutdown_tx.send(true);
        }
    });

    info!("Entering main loop. Press Ctrl+C to stop.");
    scheduler
        .run(shutdown_rx)
        .await
        .context("Cycle loop terminated")?;

    let last = publisher.latest().await;
    info!(
        cycles = scheduler.cycles_completed(),
        last_opportunities = last.metadata.opportunity_count,
        "Funding monitor shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("funding_monitor=info"));

    let json_logging = std::env::var("FUNDING_LOG_JSON").is_ok();

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
