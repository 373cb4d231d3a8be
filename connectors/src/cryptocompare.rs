use crate::RateSource;
use async_trait::async_trait;
use common::{
    models::{Cryptocurrency, FiatCurrency, RateTable},
    Error, Result,
};
use serde_json::Value;
use tracing::{debug, error};

const CRYPTOCOMPARE_API_URL: &str = "https://min-api.cryptocompare.com";

/// Configuration for the CryptoCompare price API
#[derive(Debug, Clone)]
pub struct CryptoCompareConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// API key sent as `Authorization: Apikey <key>`
    pub api_key: String,
}

impl CryptoCompareConfig {
    /// Create a new price API configuration from environment variables
    pub fn from_env() -> std::result::Result<Self, String> {
        let api_key = std::env::var("PRICE_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .map_err(|_| "PRICE_API_KEY environment variable not set")?;
        let base_url = std::env::var("PRICE_API_URL")
            .unwrap_or_else(|_| CRYPTOCOMPARE_API_URL.to_string());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

pub struct CryptoCompareConnector {
    client: reqwest::Client,
    config: CryptoCompareConfig,
}

impl CryptoCompareConnector {
    pub fn new(config: CryptoCompareConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn pricemulti_url(&self) -> String {
        let fsyms: Vec<&str> = Cryptocurrency::ALL.iter().map(|c| c.as_str()).collect();
        let tsyms: Vec<&str> = FiatCurrency::ALL.iter().map(|f| f.as_str()).collect();
        format!(
            "{}/data/pricemulti?fsyms={}&tsyms={}",
            self.config.base_url,
            fsyms.join(","),
            tsyms.join(",")
        )
    }
}

/// Parse a `pricemulti` body of the shape `{"BTC": {"USD": 50000, ...}, ...}`.
///
/// Every tracked pair must be present with a finite, non-negative number.
/// Extra symbols are ignored.
pub fn parse_rate_table(body: &str) -> Result<RateTable> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| Error::ParseError(format!("Failed to parse CryptoCompare response: {}", e)))?;

    // CryptoCompare reports errors with a 200 status and an envelope
    if payload.get("Response").and_then(Value::as_str) == Some("Error") {
        let message = payload
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(Error::ParseError(format!(
            "CryptoCompare returned an error payload: {}",
            message
        )));
    }

    RateTable::try_from_fn(|crypto, fiat| {
        let quotes = payload
            .get(crypto.as_str())
            .ok_or_else(|| Error::ParseError(format!("Missing rates for {}", crypto)))?;
        let value = quotes
            .get(fiat.as_str())
            .ok_or_else(|| Error::ParseError(format!("Missing {} rate for {}", fiat, crypto)))?;
        let rate = value.as_f64().ok_or_else(|| {
            Error::ParseError(format!("Non-numeric {}/{} rate: {}", crypto, fiat, value))
        })?;

        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::ParseError(format!(
                "Invalid {}/{} rate: {}",
                crypto, fiat, rate
            )));
        }

        Ok(rate)
    })
}

#[async_trait]
impl RateSource for CryptoCompareConnector {
    async fn fetch_rates(&self) -> Result<RateTable> {
        let url = self.pricemulti_url();

        debug!("Fetching exchange rates from CryptoCompare: {}", url);

        let response = self
            .client
            .get(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Apikey {}", self.config.api_key),
            )
            .send()
            .await
            .map_err(Error::HttpError)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("CryptoCompare API error: {} - {}", status, error_text);
            return Err(Error::FetchError(format!(
                "CryptoCompare API error: {} - {}",
                status, error_text
            )));
        }

        let body = response.text().await.map_err(Error::HttpError)?;
        parse_rate_table(&body)
    }

    fn name(&self) -> &str {
        "CryptoCompare"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"BTC":{"USD":50000,"EUR":46000,"GBP":40000},"ETH":{"USD":3000,"EUR":2800,"GBP":2400},"LTC":{"USD":100,"EUR":92,"GBP":80}}"#;

    #[test]
    fn parses_full_payload() {
        let table = parse_rate_table(SAMPLE).unwrap();
        assert_eq!(table.rate(Cryptocurrency::Btc, FiatCurrency::Usd), 50000.0);
        assert_eq!(table.rate(Cryptocurrency::Eth, FiatCurrency::Gbp), 2400.0);
        assert_eq!(table.rate(Cryptocurrency::Ltc, FiatCurrency::Eur), 92.0);
        assert_eq!(table.iter().count(), 9);
    }

    #[test]
    fn rejects_missing_crypto() {
        let body = r#"{"BTC":{"USD":1,"EUR":1,"GBP":1},"LTC":{"USD":1,"EUR":1,"GBP":1}}"#;
        match parse_rate_table(body) {
            Err(Error::ParseError(msg)) => assert!(msg.contains("ETH")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_fiat_and_non_numeric_values() {
        let missing = r#"{"BTC":{"USD":1,"EUR":1},"ETH":{"USD":1,"EUR":1,"GBP":1},"LTC":{"USD":1,"EUR":1,"GBP":1}}"#;
        assert!(matches!(parse_rate_table(missing), Err(Error::ParseError(_))));

        let text = r#"{"BTC":{"USD":"cheap","EUR":1,"GBP":1},"ETH":{"USD":1,"EUR":1,"GBP":1},"LTC":{"USD":1,"EUR":1,"GBP":1}}"#;
        assert!(matches!(parse_rate_table(text), Err(Error::ParseError(_))));

        let negative = r#"{"BTC":{"USD":-1,"EUR":1,"GBP":1},"ETH":{"USD":1,"EUR":1,"GBP":1},"LTC":{"USD":1,"EUR":1,"GBP":1}}"#;
        assert!(matches!(parse_rate_table(negative), Err(Error::ParseError(_))));
    }

    #[test]
    fn reports_error_envelope() {
        let body = r#"{"Response":"Error","Message":"You are over your rate limit","HasWarning":false,"Type":99}"#;
        match parse_rate_table(body) {
            Err(Error::ParseError(msg)) => assert!(msg.contains("rate limit")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn builds_pricemulti_url() {
        let connector = CryptoCompareConnector::new(CryptoCompareConfig {
            base_url: "http://localhost:9999".to_string(),
            api_key: "secret".to_string(),
        });
        assert_eq!(
            connector.pricemulti_url(),
            "http://localhost:9999/data/pricemulti?fsyms=BTC,ETH,LTC&tsyms=USD,EUR,GBP"
        );
    }
}
