use chrono::Utc;
use common::Result;
use connectors::RateSource;
use std::sync::Arc;
use std::time::Duration;
use store::{RateFilter, RateStore, RateWindow};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Delay between refreshes
pub const REFRESH_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Periodically copies rates from the price API into the store
pub struct RateRefresher {
    source: Arc<dyn RateSource>,
    store: Arc<dyn RateStore>,
}

impl RateRefresher {
    pub fn new(source: Arc<dyn RateSource>, store: Arc<dyn RateStore>) -> Self {
        Self { source, store }
    }

    /// One fetch-then-append unit of work. Nothing is written unless the
    /// whole table was fetched and parsed.
    pub async fn run_cycle(&self) -> Result<usize> {
        let table = self.source.fetch_rates().await?;
        let written = self.store.append(&table, Utc::now()).await?;
        Ok(written)
    }

    /// Refresh immediately, then every `REFRESH_PERIOD`, forever.
    ///
    /// Cycles run one after another on this task and a failed cycle only
    /// costs that tick.
    pub async fn run(self) {
        info!(
            "Started rate refresher for {} with period {}s",
            self.source.name(),
            REFRESH_PERIOD.as_secs()
        );

        let mut ticker = interval(REFRESH_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        loop {
            ticker.tick().await;

            match self.run_cycle().await {
                Ok(written) => info!("Stored {} exchange rates", written),
                Err(e) => error!("Exchange rate refresh failed: {}", e),
            }

            if first {
                first = false;
                self.log_history().await;
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn log_history(&self) {
        let since = RateWindow::History.since(Utc::now());
        match self.store.query_latest(&RateFilter::all(), since).await {
            Ok(snapshots) => {
                info!("{} exchange rates stored in the last 24h", snapshots.len());
                for s in &snapshots {
                    debug!(
                        "{}/{} = {:.2} at {}",
                        s.cryptocurrency, s.fiat_currency, s.rate, s.timestamp
                    );
                }
            }
            Err(e) => warn!("Could not summarize stored exchange rates: {}", e),
        }
    }
}
