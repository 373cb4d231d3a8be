use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cryptocurrencies tracked by the refresher
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cryptocurrency {
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "LTC")]
    Ltc,
}

impl Cryptocurrency {
    pub const ALL: [Cryptocurrency; 3] = [Cryptocurrency::Btc, Cryptocurrency::Eth, Cryptocurrency::Ltc];

    /// Ticker symbol as used by the price API and the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Cryptocurrency::Btc => "BTC",
            Cryptocurrency::Eth => "ETH",
            Cryptocurrency::Ltc => "LTC",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Cryptocurrency::Btc => 0,
            Cryptocurrency::Eth => 1,
            Cryptocurrency::Ltc => 2,
        }
    }
}

impl std::fmt::Display for Cryptocurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cryptocurrency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BTC" => Ok(Cryptocurrency::Btc),
            "ETH" => Ok(Cryptocurrency::Eth),
            "LTC" => Ok(Cryptocurrency::Ltc),
            _ => Err(Error::ParseError(format!("Unsupported cryptocurrency: {}", s))),
        }
    }
}

/// Fiat currencies every cryptocurrency is quoted against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FiatCurrency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
}

impl FiatCurrency {
    pub const ALL: [FiatCurrency; 3] = [FiatCurrency::Usd, FiatCurrency::Eur, FiatCurrency::Gbp];

    pub fn as_str(&self) -> &'static str {
        match self {
            FiatCurrency::Usd => "USD",
            FiatCurrency::Eur => "EUR",
            FiatCurrency::Gbp => "GBP",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            FiatCurrency::Usd => 0,
            FiatCurrency::Eur => 1,
            FiatCurrency::Gbp => 2,
        }
    }
}

impl std::fmt::Display for FiatCurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FiatCurrency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(FiatCurrency::Usd),
            "EUR" => Ok(FiatCurrency::Eur),
            "GBP" => Ok(FiatCurrency::Gbp),
            _ => Err(Error::ParseError(format!("Unsupported fiat currency: {}", s))),
        }
    }
}
