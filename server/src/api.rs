//! JSON-over-HTTP adapter for the currency service.
//!
//! `build_router` returns the bare router; `main.rs` attaches middleware
//! layers so tests can drive the router directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use currency_common::{MoneyAmount, ServiceError};
use serde::{Deserialize, Serialize};

use crate::service::CurrencyService;

/// Body of `POST /v1/convert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub from: MoneyAmount,
    pub to_code: String,
}

/// Body of `GET /v1/currencies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedCurrenciesResponse {
    pub currency_codes: Vec<String>,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Build the conversion API router.
pub fn build_router(service: CurrencyService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/currencies", get(supported_currencies))
        .route("/v1/convert", post(convert))
        .route("/v1/metrics", get(metrics))
        .with_state(service)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn supported_currencies(State(service): State<CurrencyService>) -> impl IntoResponse {
    Json(SupportedCurrenciesResponse {
        currency_codes: service.supported_currencies(),
    })
}

async fn convert(
    State(service): State<CurrencyService>,
    Json(request): Json<ConvertRequest>,
) -> Response {
    if !request.from.is_valid() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_AMOUNT",
            "nanos must be below 10^9 in magnitude and share the sign of units".to_string(),
        );
    }

    match service.convert(&request.from, &request.to_code) {
        Ok(amount) => (StatusCode::OK, Json(amount)).into_response(),
        Err(e) => {
            let status = match e {
                ServiceError::UnsupportedCurrency(_) | ServiceError::AmountOutOfRange(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            error_response(status, e.error_code(), e.to_string())
        }
    }
}

async fn metrics(State(service): State<CurrencyService>) -> impl IntoResponse {
    Json(service.metrics().snapshot())
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message,
        }),
    )
        .into_response()
}
