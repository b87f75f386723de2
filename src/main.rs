//! Hood Hive server binary.
//!
//! Loads configuration from the environment, opens the Sled store, and
//! serves the REST API until interrupted. The store is flushed on shutdown.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hood_hive::config::Config;
use hood_hive::rest::create_router;
use hood_hive::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    info!(addr = %config.bind_addr, data_dir = %config.data_dir, "starting hood hive");

    let storage = Storage::open(&config.data_dir)?;
    let app = create_router(storage.clone(), &config.jwt_secret);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.flush()?;
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for shutdown signal");
    }
}
