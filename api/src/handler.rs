use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use common::{
    models::{Cryptocurrency, FiatCurrency, RateSnapshot},
    Error as CommonError,
};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use store::{RateFilter, RateWindow};
use tracing::{debug, error};

use crate::service::RateService;

pub type SharedService = Arc<RateService>;

// Create a wrapper for our common::Error type
pub struct ApiError(CommonError);

impl From<CommonError> for ApiError {
    fn from(err: CommonError) -> Self {
        ApiError(err)
    }
}

// Only NotFound carries its message; everything else is logged and hidden
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            CommonError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            CommonError::BalanceError(detail) => {
                error!("Balance lookup failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to retrieve balance".to_string(),
                )
            }
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Public view of a snapshot; the store id stays internal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateResponse {
    pub cryptocurrency: Cryptocurrency,
    pub fiat_currency: FiatCurrency,
    #[serde(serialize_with = "serialize_rate")]
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

// Largest integer an f64 holds exactly
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

// Whole rates go out as integers (50000, not 50000.0)
fn serialize_rate<S: Serializer>(rate: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if rate.is_finite() && rate.fract() == 0.0 && *rate >= 0.0 && *rate < MAX_EXACT_INT {
        serializer.serialize_u64(*rate as u64)
    } else {
        serializer.serialize_f64(*rate)
    }
}

impl From<RateSnapshot> for RateResponse {
    fn from(snapshot: RateSnapshot) -> Self {
        Self {
            cryptocurrency: snapshot.cryptocurrency,
            fiat_currency: snapshot.fiat_currency,
            rate: snapshot.rate,
            timestamp: snapshot.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    /// Balance in wei, as a decimal string
    pub balance: String,
}

type RatesResult = Result<Json<Vec<RateResponse>>, ApiError>;

async fn window_rates(service: &RateService, filter: RateFilter, window: RateWindow) -> RatesResult {
    let snapshots = service.rates(filter, window).await?;
    debug!("Returning {} snapshots", snapshots.len());
    Ok(Json(snapshots.into_iter().map(RateResponse::from).collect()))
}

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>API Instructions</title>
</head>
<body>
    <h1>API Instructions</h1>
    <p>Use the following endpoints to interact with the API:</p>
    <ul>
        <li><strong>GET /rates/{cryptocurrency}/{fiat}</strong>: exchange rates for the pair captured in the last 5 minutes.</li>
        <li><strong>GET /rates/{cryptocurrency}/{fiat}/latest</strong>: the most recent stored rate for the pair.</li>
        <li><strong>GET /rates/history/{cryptocurrency}/{fiat}</strong>: exchange rate history for the pair over the past 24 hours.</li>
        <li><strong>GET /rates/{cryptocurrency}</strong>: current rates between the cryptocurrency and every supported fiat currency.</li>
        <li><strong>GET /history/rates/{cryptocurrency}</strong>: 24 hour history between the cryptocurrency and every supported fiat currency.</li>
        <li><strong>GET /rates</strong>: current rates for all supported pairs.</li>
        <li><strong>GET /history/rates</strong>: 24 hour history for all supported pairs.</li>
        <li><strong>GET /balance/{address}</strong>: balance of the Ethereum address in wei.</li>
    </ul>
    <p>Supported cryptocurrencies: BTC, ETH, LTC. Supported fiat currencies: USD, EUR, GBP.</p>
</body>
</html>
"#;

pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

// Rates for one pair from the last 5 minutes
pub async fn get_pair_rates(
    State(service): State<SharedService>,
    Path((crypto, fiat)): Path<(String, String)>,
) -> RatesResult {
    let (crypto, fiat) = RateService::parse_pair(&crypto, &fiat)?;
    window_rates(&service, RateFilter::pair(crypto, fiat), RateWindow::Current).await
}

// Most recent rate for one pair, however old
pub async fn get_latest_pair_rate(
    State(service): State<SharedService>,
    Path((crypto, fiat)): Path<(String, String)>,
) -> Result<Json<RateResponse>, ApiError> {
    let (crypto, fiat) = RateService::parse_pair(&crypto, &fiat)?;
    let snapshot = service.latest_rate(crypto, fiat).await?;
    Ok(Json(snapshot.into()))
}

pub async fn get_pair_history(
    State(service): State<SharedService>,
    Path((crypto, fiat)): Path<(String, String)>,
) -> RatesResult {
    let (crypto, fiat) = RateService::parse_pair(&crypto, &fiat)?;
    window_rates(&service, RateFilter::pair(crypto, fiat), RateWindow::History).await
}

pub async fn get_crypto_rates(
    State(service): State<SharedService>,
    Path(crypto): Path<String>,
) -> RatesResult {
    let crypto = RateService::parse_crypto(&crypto)?;
    window_rates(&service, RateFilter::crypto(crypto), RateWindow::Current).await
}

pub async fn get_crypto_history(
    State(service): State<SharedService>,
    Path(crypto): Path<String>,
) -> RatesResult {
    let crypto = RateService::parse_crypto(&crypto)?;
    window_rates(&service, RateFilter::crypto(crypto), RateWindow::History).await
}

pub async fn get_rates(State(service): State<SharedService>) -> RatesResult {
    window_rates(&service, RateFilter::all(), RateWindow::Current).await
}

pub async fn get_rates_history(State(service): State<SharedService>) -> RatesResult {
    window_rates(&service, RateFilter::all(), RateWindow::History).await
}

pub async fn get_balance(
    State(service): State<SharedService>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = service.balance(&address).await?;
    Ok(Json(BalanceResponse { address, balance }))
}
