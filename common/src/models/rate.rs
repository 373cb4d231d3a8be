use crate::models::{Cryptocurrency, FiatCurrency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fetch worth of rates: a price for every (cryptocurrency, fiat) pair
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: [[f64; 3]; 3],
}

impl RateTable {
    /// Build a table by resolving every pair, stopping at the first error
    pub fn try_from_fn<E, F>(mut resolve: F) -> Result<Self, E>
    where
        F: FnMut(Cryptocurrency, FiatCurrency) -> Result<f64, E>,
    {
        let mut rates = [[0.0; 3]; 3];
        for crypto in Cryptocurrency::ALL {
            for fiat in FiatCurrency::ALL {
                rates[crypto.index()][fiat.index()] = resolve(crypto, fiat)?;
            }
        }
        Ok(Self { rates })
    }

    /// Price of one unit of `crypto` in `fiat`
    pub fn rate(&self, crypto: Cryptocurrency, fiat: FiatCurrency) -> f64 {
        self.rates[crypto.index()][fiat.index()]
    }

    /// Iterate over all pairs in (crypto, fiat) declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Cryptocurrency, FiatCurrency, f64)> + '_ {
        Cryptocurrency::ALL.into_iter().flat_map(move |crypto| {
            FiatCurrency::ALL
                .into_iter()
                .map(move |fiat| (crypto, fiat, self.rate(crypto, fiat)))
        })
    }

    /// Number of pairs a table always holds
    pub const fn len() -> usize {
        Cryptocurrency::ALL.len() * FiatCurrency::ALL.len()
    }
}

/// A stored rate observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Store-assigned identifier, opaque to callers
    pub id: String,
    pub cryptocurrency: Cryptocurrency,
    pub fiat_currency: FiatCurrency,
    /// Price of one unit of `cryptocurrency` in `fiat_currency`
    pub rate: f64,
    /// When the refresher captured this rate (server clock)
    pub timestamp: DateTime<Utc>,
}
