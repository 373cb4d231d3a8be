use chrono::{DateTime, Duration, Utc};

/// Fixed look-back windows served by the HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    /// Last 5 minutes, one refresh period
    Current,
    /// Last 24 hours
    History,
}

impl RateWindow {
    pub fn duration(&self) -> Duration {
        match self {
            RateWindow::Current => Duration::minutes(5),
            RateWindow::History => Duration::hours(24),
        }
    }

    /// Inclusive lower bound of the window ending at `now`
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}
