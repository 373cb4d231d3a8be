mod config;
mod handler;
mod routes;
mod scheduler;
mod service;

use config::ApiConfig;
use connectors::{
    cryptocompare::{CryptoCompareConfig, CryptoCompareConnector},
    ethereum::{EthereumBalanceClient, EthereumConfig},
};
use scheduler::RateRefresher;
use service::RateService;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional; real environment variables win
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    info!("Starting exchange rate API");

    // Load configuration from environment
    let api_config = ApiConfig::from_env();
    let store_config = store::StoreConfig::from_env()
        .map_err(|e| format!("Failed to load store configuration: {}", e))?;
    let price_config = CryptoCompareConfig::from_env()
        .map_err(|e| format!("Failed to load price API configuration: {}", e))?;
    let ethereum_config = EthereumConfig::from_env()
        .map_err(|e| format!("Failed to load Ethereum configuration: {}", e))?;

    let rate_store = store::connect(store_config)
        .await
        .map_err(|e| format!("Failed to create rate store: {}", e))?;
    let balances = Arc::new(EthereumBalanceClient::new(&ethereum_config)?);
    let source = Arc::new(CryptoCompareConnector::new(price_config));

    // First refresh runs right away, before the listener is up
    let refresher = RateRefresher::new(source, rate_store.clone()).spawn();

    let service = Arc::new(RateService::new(rate_store, balances));
    let app = routes::router(service, api_config.request_timeout());

    let addr = api_config.socket_addr()?;
    info!("Listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.abort();
    info!("Shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
