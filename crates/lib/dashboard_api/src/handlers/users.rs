//! Account request handlers under `/users`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use dashboard_core::accounts::ProfileUpdate;
use dashboard_core::models::User;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequestContext;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignUpRequest, SignUpResponse,
    StatusResponse, UpdateMeRequest, UpdatePasswordRequest, VerifyEmailRequest,
};
use crate::services::cookies::{IssuedSession, clear_session_cookies, is_secure};

/// `POST /users/signup`: create an account and log it in.
pub async fn signup_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SignUpRequest>,
) -> AppResult<Response> {
    let (user, session) = state.accounts.sign_up(body.into()).await?;
    Ok((
        StatusCode::CREATED,
        IssuedSession::new(&headers, &session),
        Json(SignUpResponse { user }),
    )
        .into_response())
}

/// `POST /users/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> AppResult<Response> {
    let (user, session) = state.accounts.login(&body.email, &body.password).await?;
    Ok((IssuedSession::new(&headers, &session), Json(user)).into_response())
}

/// `POST /users/logout`: destroy the current session and clear cookies.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
) -> Response {
    state.accounts.logout(ctx.session.as_ref()).await;
    (
        clear_session_cookies(is_secure(&headers)),
        Json(StatusResponse::ok()),
    )
        .into_response()
}

/// `POST /users/verify-email`: mail a verification code to the session user.
pub async fn verify_email_start_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<Json<StatusResponse>> {
    let session = ctx.session()?;
    state.accounts.start_email_verification(session.user_id).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /users/verify-email-complete`: redeem a verification code.
pub async fn verify_email_complete_handler(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> AppResult<Json<StatusResponse>> {
    if body.token.is_empty() {
        return Err(AppError::Validation("token is required".into()));
    }
    state.accounts.complete_email_verification(&body.token).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /users/forgot-password`: always answers ok.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<Json<StatusResponse>> {
    if !body.email.is_empty() {
        state.accounts.forgot_password(&body.email).await?;
    }
    Ok(Json(StatusResponse::ok()))
}

/// `POST /users/reset-password-complete`: redeem a reset token.
pub async fn reset_password_complete_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<StatusResponse>> {
    if body.token.is_empty() {
        return Err(AppError::Validation("token is required".into()));
    }
    state
        .accounts
        .reset_password(&body.token, &body.password)
        .await?;
    Ok(Json(StatusResponse::ok()))
}

/// `GET /users/me`
pub async fn get_me_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<Json<User>> {
    let user = state.accounts.me(ctx.session()?).await?;
    Ok(Json(user))
}

/// `PUT /users/me`: update names and email of the session user.
pub async fn update_me_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<UpdateMeRequest>,
) -> AppResult<Json<User>> {
    let session = ctx.session()?;
    let id = body
        .id
        .ok_or_else(|| AppError::Validation("id is required".into()))?;
    let user = state
        .accounts
        .update_profile(
            session,
            ProfileUpdate {
                id,
                email: body.email,
                first_name: body.first_name,
                last_name: body.last_name,
            },
        )
        .await?;
    Ok(Json(user))
}

/// `PUT /users/me/password`: change password and rotate sessions.
pub async fn update_password_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Json(body): Json<UpdatePasswordRequest>,
) -> AppResult<Response> {
    let session = ctx.session()?;
    let fresh = state
        .accounts
        .change_password(session, &body.current_password, &body.new_password)
        .await?;
    let response = match fresh {
        Some(session) => (IssuedSession::new(&headers, &session), Json(StatusResponse::ok())).into_response(),
        None => Json(StatusResponse::ok()).into_response(),
    };
    Ok(response)
}
