mod config;
mod error;
mod influx_store;
mod memory_store;
mod window;

pub use config::{InfluxConfig, StoreBackend, StoreConfig};
pub use error::StoreError;
pub use influx_store::InfluxRateStore;
pub use memory_store::MemoryRateStore;
pub use window::RateWindow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{Cryptocurrency, FiatCurrency, RateSnapshot, RateTable};
use std::sync::Arc;
use tracing::info;

/// Optional exact-match constraints on a rate query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateFilter {
    pub cryptocurrency: Option<Cryptocurrency>,
    pub fiat_currency: Option<FiatCurrency>,
}

impl RateFilter {
    /// Every pair
    pub fn all() -> Self {
        Self::default()
    }

    /// Every fiat for one cryptocurrency
    pub fn crypto(cryptocurrency: Cryptocurrency) -> Self {
        Self {
            cryptocurrency: Some(cryptocurrency),
            fiat_currency: None,
        }
    }

    pub fn pair(cryptocurrency: Cryptocurrency, fiat_currency: FiatCurrency) -> Self {
        Self {
            cryptocurrency: Some(cryptocurrency),
            fiat_currency: Some(fiat_currency),
        }
    }

    pub fn matches(&self, snapshot: &RateSnapshot) -> bool {
        self.cryptocurrency
            .map_or(true, |c| c == snapshot.cryptocurrency)
            && self
                .fiat_currency
                .map_or(true, |f| f == snapshot.fiat_currency)
    }
}

/// Append-only persistence for rate snapshots.
///
/// Snapshots are never updated. Reads are window queries over
/// immutable rows, so implementations need no coordination between a
/// concurrent `append` and any reader.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Expand `table` into one snapshot per pair stamped with
    /// `captured_at` and write them as a single batch.
    ///
    /// Returns the number of snapshots written.
    async fn append(&self, table: &RateTable, captured_at: DateTime<Utc>) -> Result<usize, StoreError>;

    /// All snapshots with `timestamp >= since` matching `filter`, newest first
    async fn query_latest(
        &self,
        filter: &RateFilter,
        since: DateTime<Utc>,
    ) -> Result<Vec<RateSnapshot>, StoreError>;

    /// Most recent snapshot for the pair, or `StoreError::NotFound`
    async fn query_one(
        &self,
        cryptocurrency: Cryptocurrency,
        fiat_currency: FiatCurrency,
    ) -> Result<RateSnapshot, StoreError>;

    /// Remove every snapshot, returning how many existed beforehand
    async fn delete_all(&self) -> Result<u64, StoreError>;
}

/// Build the configured store, verifying connectivity where applicable
pub async fn connect(config: StoreConfig) -> Result<Arc<dyn RateStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory rate store");
            Ok(Arc::new(MemoryRateStore::new()))
        }
        StoreBackend::InfluxDb => {
            let influx = config.influx.ok_or_else(|| {
                StoreError::ConfigError("InfluxDB backend selected without settings".to_string())
            })?;
            let store = InfluxRateStore::new(influx);
            store.check_health().await?;
            Ok(Arc::new(store))
        }
    }
}

pub(crate) fn not_found(cryptocurrency: Cryptocurrency, fiat_currency: FiatCurrency) -> StoreError {
    StoreError::NotFound(format!(
        "exchange rate not found for {}-{}",
        cryptocurrency, fiat_currency
    ))
}

/// Newest first; rows captured together keep pair declaration order
pub(crate) fn sort_newest_first(snapshots: &mut [RateSnapshot]) {
    snapshots.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then(a.cryptocurrency.cmp(&b.cryptocurrency))
            .then(a.fiat_currency.cmp(&b.fiat_currency))
    });
}
