//! PrimeAgems balance endpoints.

use std::any::Any;

use arena_core::{LedgerError, PlayerId};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::server::AppState;

const INTERNAL_ERROR_DETAIL: &str = "Internal server error";

/// Errors returned by the HTTP endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidAmount(String),
    /// Detail is logged, never returned to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "InvalidAmount",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidAmount(_) => Self::InvalidAmount("Amount must be positive".into()),
            LedgerError::Overflow { .. } => Self::Internal(e.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            Self::InvalidAmount(msg) => msg.clone(),
            Self::Internal(msg) => {
                error!(error = %msg, "internal error in request handler");
                INTERNAL_ERROR_DETAIL.to_string()
            }
        };
        let body = ErrorBody {
            kind: self.error_kind().to_string(),
            detail,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchaseQuery {
    pub amount: i64,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/primeagems/{player_id}/purchase", post(purchase))
        .route("/primeagems/{player_id}/balance", get(balance))
}

/// POST /primeagems/{player_id}/purchase?amount=N
async fn purchase(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    query: Result<Query<PurchaseQuery>, QueryRejection>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let player_id = PlayerId::from_raw(player_id);
    let Query(PurchaseQuery { amount }) = query.map_err(|e| {
        warn!(player_id = %player_id, error = %e, "invalid purchase query");
        ApiError::InvalidAmount(e.body_text())
    })?;

    match state.ledger.purchase(&player_id, amount) {
        Ok(balance) => {
            info!(player_id = %player_id, amount, balance, "PrimeAgems purchased");
            Ok(Json(BalanceResponse { balance }))
        }
        Err(e) => {
            warn!(player_id = %player_id, amount, kind = e.error_kind(), "purchase rejected");
            Err(e.into())
        }
    }
}

/// GET /primeagems/{player_id}/balance
async fn balance(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Json<BalanceResponse> {
    let player_id = PlayerId::from_raw(player_id);
    let balance = state.ledger.get_or_init(&player_id);
    info!(player_id = %player_id, balance, "balance requested");
    Json(BalanceResponse { balance })
}

/// Response for a panicking handler, used with `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
