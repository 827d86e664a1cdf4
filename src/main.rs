//! Order-Book Synchronizer runner.
//!
//! A thin wiring layer: loads configuration, builds the feed and snapshot
//! collaborators, and drives one [`orderbook::Synchronizer`]. All protocol
//! logic lives in `orderbook::sync`.

use std::sync::Arc;

use orderbook_sync::binance::BinanceClient;
use orderbook_sync::config::SyncConfig;
use orderbook_sync::orderbook::{DepthFeed, HttpSnapshotSource, IngressDispatcher, Synchronizer};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = SyncConfig::from_env()?;
    tracing::info!(symbol = %config.symbol, "Starting order-book synchronizer");

    let binance_client = Arc::new(BinanceClient::with_base_url(config.rest_base_url.clone()));
    let source = HttpSnapshotSource::new(binance_client);
    let synchronizer = Arc::new(Synchronizer::new(config.symbol.clone(), config.clone(), source));

    synchronizer
        .set_update_callback({
            let synchronizer = Arc::clone(&synchronizer);
            move || {
                // Runs from under/just after the Book Store mutex: keep
                // this fast and non-reentrant. Only reads `last_update_id`,
                // which is lock-free.
                tracing::debug!(
                    last_update_id = synchronizer.last_update_id(),
                    "Book updated"
                );
            }
        })
        .await;

    synchronizer.start().await;

    let worker_handle = tokio::spawn({
        let synchronizer = Arc::clone(&synchronizer);
        let tick_interval = config.tick_interval;
        async move { orderbook_sync::orderbook::run_background_worker(synchronizer, tick_interval).await }
    });

    let feed = DepthFeed::new(config.symbol.clone(), config.ws_base_url.clone());
    let (feed_handle, mut frames, _connected) = feed.start();

    let dispatcher = IngressDispatcher::new(Arc::clone(&synchronizer));
    let ingress_handle = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            dispatcher.handle_frame(&frame).await;
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        _ = worker_handle => {
            tracing::warn!("Background worker exited unexpectedly");
        }
        _ = feed_handle => {
            tracing::warn!("Depth feed task exited unexpectedly");
        }
        _ = ingress_handle => {
            tracing::warn!("Ingress dispatch task exited unexpectedly");
        }
    }

    synchronizer.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
