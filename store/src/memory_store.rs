use crate::{not_found, sort_newest_first, RateFilter, RateStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{Cryptocurrency, FiatCurrency, RateSnapshot, RateTable};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Process-local store for development runs and tests. Contents are lost on exit.
#[derive(Default)]
pub struct MemoryRateStore {
    snapshots: RwLock<Vec<RateSnapshot>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn append(&self, table: &RateTable, captured_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let batch: Vec<RateSnapshot> = table
            .iter()
            .map(|(cryptocurrency, fiat_currency, rate)| RateSnapshot {
                id: Uuid::new_v4().to_string(),
                cryptocurrency,
                fiat_currency,
                rate,
                timestamp: captured_at,
            })
            .collect();
        let written = batch.len();

        self.snapshots.write().await.extend(batch);
        debug!("Stored {} snapshots captured at {}", written, captured_at);

        Ok(written)
    }

    async fn query_latest(
        &self,
        filter: &RateFilter,
        since: DateTime<Utc>,
    ) -> Result<Vec<RateSnapshot>, StoreError> {
        let mut results: Vec<RateSnapshot> = self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.timestamp >= since && filter.matches(s))
            .cloned()
            .collect();

        sort_newest_first(&mut results);
        Ok(results)
    }

    async fn query_one(
        &self,
        cryptocurrency: Cryptocurrency,
        fiat_currency: FiatCurrency,
    ) -> Result<RateSnapshot, StoreError> {
        let filter = RateFilter::pair(cryptocurrency, fiat_currency);

        self.snapshots
            .read()
            .await
            .iter()
            .filter(|s| filter.matches(s))
            .max_by_key(|s| s.timestamp)
            .cloned()
            .ok_or_else(|| not_found(cryptocurrency, fiat_currency))
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut snapshots = self.snapshots.write().await;
        let removed = snapshots.len() as u64;
        snapshots.clear();
        Ok(removed)
    }
}
