use chrono::Utc;
use common::{
    models::{Cryptocurrency, FiatCurrency, RateSnapshot},
    Error, Result,
};
use connectors::BalanceLookup;
use std::sync::Arc;
use store::{RateFilter, RateStore, RateWindow};
use tracing::debug;

/// Read-side operations behind the HTTP routes
pub struct RateService {
    /// Snapshot store written by the refresher
    store: Arc<dyn RateStore>,
    /// Ethereum node client
    balances: Arc<dyn BalanceLookup>,
}

impl RateService {
    pub fn new(store: Arc<dyn RateStore>, balances: Arc<dyn BalanceLookup>) -> Self {
        Self { store, balances }
    }

    /// Resolve path segments to a tracked pair. Unknown symbols are
    /// reported as a missing rate since nothing is ever stored for them.
    pub fn parse_pair(crypto: &str, fiat: &str) -> Result<(Cryptocurrency, FiatCurrency)> {
        match (crypto.parse::<Cryptocurrency>(), fiat.parse::<FiatCurrency>()) {
            (Ok(crypto), Ok(fiat)) => Ok((crypto, fiat)),
            _ => Err(Error::NotFound(format!(
                "exchange rate not found for {}-{}",
                crypto.to_uppercase(),
                fiat.to_uppercase()
            ))),
        }
    }

    pub fn parse_crypto(crypto: &str) -> Result<Cryptocurrency> {
        crypto.parse::<Cryptocurrency>().map_err(|_| {
            Error::NotFound(format!(
                "unsupported cryptocurrency {}",
                crypto.to_uppercase()
            ))
        })
    }

    /// Snapshots inside `window`, newest first
    pub async fn rates(&self, filter: RateFilter, window: RateWindow) -> Result<Vec<RateSnapshot>> {
        let since = window.since(Utc::now());

        debug!("Querying rates {:?} since {} ({:?})", filter, since, window);

        let snapshots = self.store.query_latest(&filter, since).await?;
        Ok(snapshots)
    }

    /// Most recent snapshot for the pair regardless of age
    pub async fn latest_rate(
        &self,
        crypto: Cryptocurrency,
        fiat: FiatCurrency,
    ) -> Result<RateSnapshot> {
        let snapshot = self.store.query_one(crypto, fiat).await?;
        Ok(snapshot)
    }

    pub async fn balance(&self, address: &str) -> Result<String> {
        self.balances.get_balance(address).await
    }
}
