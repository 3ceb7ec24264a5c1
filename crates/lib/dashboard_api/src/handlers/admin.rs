//! Admin-only handlers.

use axum::Json;
use axum::extract::{Path, State};
use dashboard_core::models::User;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;

/// `GET /admin/users/{id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(state.accounts.get_user(id).await?))
}
