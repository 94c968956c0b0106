//! MMSIM — signed-request market-making simulator
//!
//! Entry point. Loads configuration, initialises structured logging,
//! derives and self-tests the signing key, then runs the per-pair
//! cancel→ladder→self-cross loop until a signal or a fatal stop.
//!
//! Exit status: 0 on signal or expired credential, 1 on the consecutive
//! error threshold or a startup failure.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info, warn};

use mmsim::alerts::{AlertSink, BackgroundAlerts, LogAlerts, TelegramAlerts};
use mmsim::config::AppConfig;
use mmsim::engine::{CycleSettings, PairEngine, Scheduler, ShutdownReason};
use mmsim::exchange::client::ExchangeClient;
use mmsim::exchange::dry_run::DryRunExchange;
use mmsim::exchange::Exchange;
use mmsim::oracle::{MarkPriceOracle, PriceSource};
use mmsim::signer::RequestSigner;

const BANNER: &str = r#"
 __  __ __  __ ____ ___ __  __
|  \/  |  \/  / ___|_ _|  \/  |
| |\/| | |\/| \___ \| || |\/| |
| |  | | |  | |___) | || |  | |
|_|  |_|_|  |_|____/___|_|  |_|

  Market-Making Simulator v0.1.0
"#;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    match run().await {
        Ok(reason) => {
            info!(reason = %reason, exit_code = reason.exit_code(), "MMSIM stopped.");
            ExitCode::from(reason.exit_code())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Startup failed");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ShutdownReason> {
    let cfg = match std::env::var("MMSIM_CONFIG") {
        Ok(path) => AppConfig::load(&path)?,
        Err(_) => AppConfig::from_env().context("Failed to load configuration from environment")?,
    };

    println!("{BANNER}");
    info!(
        backend = %cfg.exchange.base_url,
        pairs = cfg.pairs.len(),
        levels = cfg.market_maker.levels,
        interval_ms = cfg.market_maker.interval_ms,
        max_errors = cfg.market_maker.max_errors,
        dry_run = cfg.market_maker.dry_run,
        "MMSIM starting up"
    );

    // -- Signing key: derived once, verified before any request ------------

    let signer = RequestSigner::from_hex(cfg.exchange.signing_seed.expose_secret())
        .context("Invalid signing seed")?;
    signer.self_test().context("Signing self-test failed")?;
    info!(signer = ?signer, "Signing key ready");
    let signer = Arc::new(signer);

    // -- Components ------------------------------------------------------

    let timeout = cfg.request_timeout();

    let alerts: Arc<dyn AlertSink> = match (
        cfg.alerts.telegram_bot_token.as_ref(),
        cfg.alerts.telegram_chat_id.as_ref(),
    ) {
        (Some(token), Some(chat_id)) => Arc::new(BackgroundAlerts::new(Arc::new(
            TelegramAlerts::new(
                SecretString::new(token.expose_secret().clone()),
                chat_id.clone(),
                timeout,
            )?,
        ))),
        (None, None) => Arc::new(LogAlerts),
        _ => {
            warn!("Telegram alerts need both bot token and chat id; logging alerts instead");
            Arc::new(LogAlerts)
        }
    };

    let exchange: Arc<dyn Exchange> = if cfg.market_maker.dry_run {
        warn!("DRY_RUN enabled: orders are signed and logged but not sent");
        Arc::new(DryRunExchange::new(signer.clone()))
    } else {
        Arc::new(ExchangeClient::new(
            &cfg.exchange.base_url,
            SecretString::new(cfg.exchange.api_key.expose_secret().clone()),
            signer.clone(),
            timeout,
        )?)
    };

    let prices: Arc<dyn PriceSource> = Arc::new(MarkPriceOracle::new(
        &cfg.exchange.reference_url,
        &cfg.exchange.base_url,
        timeout,
    )?);

    let settings = CycleSettings {
        levels: cfg.market_maker.levels,
        max_errors: cfg.market_maker.max_errors,
    };

    let engines: Vec<PairEngine> = cfg
        .pairs
        .iter()
        .map(|pair| {
            info!(pair = %pair, source = ?pair.price_source, "Pair configured");
            PairEngine::new(
                pair.clone(),
                settings,
                exchange.clone(),
                prices.clone(),
                alerts.clone(),
            )
        })
        .collect();

    let symbols: Vec<&str> = cfg.pairs.iter().map(|p| p.symbol.as_str()).collect();
    alerts
        .notify(&format!(
            "🟢 MMSIM started via {}: {} | {} levels | every {} ms",
            exchange.name(),
            symbols.join(", "),
            settings.levels,
            cfg.market_maker.interval_ms,
        ))
        .await;

    // -- Main loop -------------------------------------------------------

    let mut scheduler = Scheduler::new(engines, cfg.interval());
    info!("Entering main loop. Press Ctrl+C to stop.");

    let reason = scheduler.run(shutdown_signal()).await;

    if reason == ShutdownReason::Signal {
        alerts
            .notify(&format!(
                "🔴 MMSIM stopped by signal after {} cycle(s)",
                scheduler.cycle()
            ))
            .await;
    }
    alerts.flush().await;

    Ok(reason)
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received.");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mmsim=info"));

    let json_logging = std::env::var("MMSIM_LOG_JSON").is_ok();

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
