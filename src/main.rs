//! Sentinel Console Sync Engine
//!
//! Runs the engine as a headless process: loads snapshots, follows the
//! alert stream, and logs store changes and stats until interrupted.

use sentinel_console::models::CallerContext;
use sentinel_console::{EngineConfig, SyncEngine};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_console=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sentinel Console Sync Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::default();
    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        "Configuration loaded"
    );

    let engine = Arc::new(SyncEngine::new(config)?);

    // Identity for this session; SENTINEL_USER_ID=admin gets the admin view
    let user_id =
        std::env::var("SENTINEL_USER_ID").unwrap_or_else(|_| "admin".to_string());
    let ctx = if user_id == "admin" {
        CallerContext::admin()
    } else {
        CallerContext::operator(user_id)
    };
    engine.set_context(ctx).await;

    engine.start().await;
    tracing::info!("Engine started");

    // Log every store change until shutdown
    let (subscriber_id, mut changes) = engine.subscribe_changes().await;
    let change_logger = {
        let engine = engine.clone();
        tokio::spawn(async move {
            while let Some(notice) = changes.recv().await {
                tracing::info!(change = ?notice, "Store changed");
            }
            engine.unsubscribe_changes(&subscriber_id).await;
        })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    engine.shutdown().await;
    change_logger.abort();
    tracing::info!("Engine stopped");
    Ok(())
}
