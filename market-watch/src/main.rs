//! Market Watch
//!
//! Runs the markets controller against the configured backend and logs every
//! snapshot change until Ctrl-C.

use market_core::MarketState;
use market_sync::{MarketsController, SyncConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,market_sync=debug")),
        )
        .init();

    let config = SyncConfig::from_env()?;
    info!(
        "Starting market watch against {} (lookback {}h, stream {})",
        config.api_base_url,
        config.lookback_hours,
        if config.stream_enabled { "on" } else { "off" }
    );
    if config.wallet.is_none() {
        warn!("MARKETS_WALLET is not set, no markets will be loaded");
    }

    let controller = MarketsController::connect(&config)?;
    let mut updates = controller.subscribe();

    controller.activate().await;
    log_view(&controller);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                updates.borrow_and_update();
                log_view(&controller);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    controller.deactivate();
    Ok(())
}

fn log_view(controller: &MarketsController) {
    let view = controller.view();
    let stats = controller.store().stats();
    let grouped = view.by_state();

    info!(
        "{} markets ({} active, {} observing, {} resolved), streaming: {}, loading: {}",
        view.markets.len(),
        grouped.active.len(),
        grouped.observing.len(),
        grouped.resolved.len(),
        view.is_streaming,
        view.loading
    );
    if stats.fallback_keys > 0 {
        warn!("{} markets stored without an id", stats.fallback_keys);
    }
    if let Some(error) = &view.error {
        warn!("Last sync error: {}", error);
    }

    let liquid = view
        .markets
        .iter()
        .filter(|m| m.state_or_open() == MarketState::Open)
        .filter_map(|m| m.total_liquidity().ok().map(|total| (m, total)))
        .max_by(|a, b| a.1.cmp(&b.1));
    if let Some((market, total)) = liquid {
        info!(
            "Most liquid open market: {} ({}) with {}",
            market.key,
            market.question.as_deref().unwrap_or("untitled"),
            total
        );
    }
}
