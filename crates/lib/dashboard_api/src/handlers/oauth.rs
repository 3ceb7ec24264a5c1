//! OAuth connect handlers under `/oauth`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::error::AppResult;

/// `GET /oauth/github/connect`: redirect to GitHub with a fresh state value.
pub async fn github_connect_handler(State(state): State<AppState>) -> AppResult<Response> {
    let (_, url) = state.accounts.start_oauth_connect().await?;
    Ok((StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response())
}
