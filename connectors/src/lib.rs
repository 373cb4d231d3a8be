pub mod cryptocompare;
pub mod ethereum;

use async_trait::async_trait;
use common::{models::RateTable, Result};

/// Trait defining the interface for exchange-rate price APIs
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the current rate for every tracked (crypto, fiat) pair
    async fn fetch_rates(&self) -> Result<RateTable>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Trait defining the interface for blockchain balance queries
#[async_trait]
pub trait BalanceLookup: Send + Sync {
    /// Balance of `address` at the latest block, in the chain's base unit
    async fn get_balance(&self, address: &str) -> Result<String>;
}
