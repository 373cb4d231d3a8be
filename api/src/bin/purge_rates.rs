//! Administrative bulk delete of every stored exchange rate.

use store::RateStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = store::StoreConfig::from_env()?;
    let rate_store = store::connect(config).await?;

    let removed = rate_store.delete_all().await?;
    info!("Deleted {} exchange rate snapshots", removed);

    Ok(())
}
