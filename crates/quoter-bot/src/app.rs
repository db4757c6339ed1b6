//! Application wiring.
//!
//! Builds the component graph (metadata cache, scheduler, executor, engine)
//! over the paper exchange and runs it until shutdown:
//! - metadata is loaded before the engine starts and refreshed on its TTL
//! - engine events are drained to the log
//! - engine status is logged periodically
//! - ctrl-c stops the timers, cancels resting orders and drains the lanes

use std::sync::Arc;
use std::time::Duration;

use quoter_executor::{OrderExecutor, WalletReadiness};
use quoter_mm::{BasicAnalyzer, EngineEvent, MarketMakingEngine};
use quoter_registry::{AssetMetadataCache, MetaClient};
use quoter_scheduler::RequestScheduler;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::paper::PaperExchange;

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Validate the configuration. Live mode is refused: this binary carries
    /// no signer.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        if !config.is_paper() {
            return Err(AppError::NotReady(
                "live mode requires an external signer; this build runs paper mode only"
                    .to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(e) => warn!(error = %e, "Failed to listen for ctrl-c, shutting down"),
            }
            signal.cancel();
        });
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run_until(self, shutdown: CancellationToken) -> AppResult<()> {
        let config = self.config;

        let client = MetaClient::new(config.registry.info_url.clone())?;
        let exchange = Arc::new(PaperExchange::new(
            client,
            config.maker.candle_interval.clone(),
            config.paper.starting_balance,
        ));

        let (wallet, _ready_rx) = WalletReadiness::new();
        let wallet = Arc::new(wallet);
        // Paper orders are never signed
        wallet.set_signer_ready(true);

        let scheduler = Arc::new(RequestScheduler::new(&config.scheduler));
        let cache = Arc::new(AssetMetadataCache::new(config.registry.metadata_ttl()));
        let executor = Arc::new(OrderExecutor::new(
            config.executor.clone(),
            exchange.clone(),
            wallet.clone(),
            cache.clone(),
            scheduler.clone(),
        ));

        info!(info_url = %config.registry.info_url, "Loading asset metadata");
        executor.refresh_metadata().await?;
        for symbol in &config.maker.symbols {
            let meta = cache
                .lookup(symbol)
                .ok_or_else(|| AppError::Config(format!("unknown symbol {symbol}")))?;
            info!(
                %symbol,
                asset_id = ?meta.asset_id,
                tick_size = %meta.tick_size,
                step_size = %meta.step_size,
                "Quoting symbol"
            );
        }
        wallet.set_metadata_loaded(true);

        let analyzer = Arc::new(BasicAnalyzer::new(
            config.maker.bollinger_period,
            config.maker.bollinger_std_dev,
        ));
        let (engine, events) =
            MarketMakingEngine::new(config.maker.clone(), executor.clone(), analyzer);
        let engine = Arc::new(engine);

        let events_task = tokio::spawn(log_events(events));
        let refresh_task = tokio::spawn(refresh_metadata(
            Arc::clone(&executor),
            config.registry.metadata_ttl(),
            shutdown.clone(),
        ));
        let status_task = (config.status_interval_secs > 0).then(|| {
            tokio::spawn(log_status(
                Arc::clone(&engine),
                Duration::from_secs(config.status_interval_secs),
                shutdown.clone(),
            ))
        });

        info!(mode = ?config.mode, symbols = ?config.maker.symbols, "Quoter running");
        if let Err(e) = tokio::spawn(Arc::clone(&engine).run(shutdown.clone())).await {
            warn!(error = %e, "Engine task ended abnormally");
        }

        shutdown.cancel();
        let _ = refresh_task.await;
        if let Some(task) = status_task {
            let _ = task.await;
        }

        scheduler.shutdown().await;
        let status = engine.status();
        info!(
            fills = exchange.fills(),
            stats = ?scheduler.stats(),
            status = %serde_json::to_string(&status).unwrap_or_default(),
            "Shutdown complete"
        );

        drop(engine);
        let _ = events_task.await;
        Ok(())
    }
}

/// Print a user's account value and resting orders from the info endpoint.
pub async fn show_account(config: &AppConfig, user: &str, coin: Option<&str>) -> AppResult<()> {
    let client = MetaClient::new(config.registry.info_url.clone())?;
    let value = client.fetch_account_value(user).await?;
    let orders = client.fetch_open_orders(user, coin).await?;

    info!(%user, account_value = %value, open_orders = orders.len(), "Account");
    for order in &orders {
        info!(
            oid = order.oid,
            symbol = %order.symbol,
            side = %order.side,
            price = %order.price,
            size = %order.size,
            "Open order"
        );
    }
    Ok(())
}

async fn log_events(mut events: mpsc::UnboundedReceiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        let json = serde_json::to_string(&event).unwrap_or_default();
        if event.is_error() {
            warn!(symbol = %event.symbol(), event = %json, "Engine error event");
        } else {
            debug!(symbol = %event.symbol(), event = %json, "Engine event");
        }
    }
}

async fn refresh_metadata(
    executor: Arc<OrderExecutor>,
    ttl: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(ttl);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick is immediate; metadata was just loaded
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match executor.refresh_metadata().await {
                    Ok(refreshed) => debug!(refreshed, "Metadata refresh"),
                    Err(e) => warn!(error = %e, "Metadata refresh failed, keeping cached entries"),
                }
            }
        }
    }
}

async fn log_status(engine: Arc<MarketMakingEngine>, every: Duration, shutdown: CancellationToken) {
    let mut ticker = interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let status = engine.status();
                for symbol in &status.symbols {
                    info!(
                        symbol = %symbol.symbol,
                        tracked_orders = symbol.tracked_orders.len(),
                        sentiment = ?symbol.sentiment,
                        spread = ?symbol.spread,
                        condition_age_ms = ?symbol.condition_age_ms,
                        rsi = ?symbol.rsi,
                        mean_volatility = ?symbol.mean_volatility,
                        "Engine status"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatingMode;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.maker.symbols = vec!["ETH".to_string()];
        config
    }

    #[test]
    fn test_live_mode_refused() {
        let mut config = config();
        config.mode = OperatingMode::Live;
        assert!(matches!(Application::new(config), Err(AppError::NotReady(_))));
    }

    #[test]
    fn test_paper_mode_accepted() {
        assert!(Application::new(config()).is_ok());
    }

    #[test]
    fn test_invalid_maker_config_refused() {
        let mut config = config();
        config.maker.order_levels = 0;
        assert!(matches!(Application::new(config), Err(AppError::Config(_))));
    }
}
