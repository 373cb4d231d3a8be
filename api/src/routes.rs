use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::handler::{self, SharedService};

/// Build the HTTP router over the shared service
pub fn router(service: SharedService, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handler::home))
        .route("/rates", get(handler::get_rates))
        .route("/rates/:crypto", get(handler::get_crypto_rates))
        .route("/rates/:crypto/:fiat", get(handler::get_pair_rates))
        .route("/rates/:crypto/:fiat/latest", get(handler::get_latest_pair_rate))
        .route("/rates/history/:crypto/:fiat", get(handler::get_pair_history))
        .route("/history/rates", get(handler::get_rates_history))
        .route("/history/rates/:crypto", get(handler::get_crypto_history))
        .route("/balance/:address", get(handler::get_balance))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}
