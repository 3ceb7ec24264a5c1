//! Health endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dashboard_core::store::Store;
use tracing::error;

use crate::AppState;
use crate::models::StatusResponse;

/// `GET /health`: reports whether the store answers.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    match state.accounts.store().ping().await {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        Err(e) => {
            error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse {
                    status: "unavailable".into(),
                }),
            )
                .into_response()
        }
    }
}
