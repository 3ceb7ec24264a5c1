//! Request authentication middleware.
//!
//! Every route group runs behind [`authenticate`] with its own
//! [`Requirements`]. The middleware resolves the session from the
//! `DASHBOARDAUTHTOKEN` cookie or an `Authorization: Bearer` header, enforces
//! CSRF for cookie-borne sessions on state-changing methods, applies the
//! route requirements, and hands the handler a [`RequestContext`].

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use dashboard_core::ids::new_id;
use dashboard_core::models::Session;
use dashboard_core::store::Lookup;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::cookies::{
    CSRF_HEADER, REQUEST_ID_HEADER, SESSION_COOKIE, clear_session_cookies, is_secure,
};

/// What a route demands of the caller. Checked in field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub session: bool,
    pub verification: bool,
    pub admin: bool,
    /// Accept API-key sessions when a session is required.
    pub allow_api_key: bool,
}

impl Requirements {
    pub const ANONYMOUS: Self = Self {
        session: false,
        verification: false,
        admin: false,
        allow_api_key: false,
    };
    pub const SESSION: Self = Self {
        session: true,
        ..Self::ANONYMOUS
    };
    pub const VERIFIED: Self = Self {
        verification: true,
        ..Self::SESSION
    };
    pub const ADMIN: Self = Self {
        admin: true,
        ..Self::VERIFIED
    };
}

/// Middleware state: the app plus the requirements of one route group.
#[derive(Clone)]
pub struct AuthGate {
    state: AppState,
    requirements: Requirements,
}

impl AuthGate {
    pub fn new(state: AppState, requirements: Requirements) -> Self {
        Self {
            state,
            requirements,
        }
    }
}

/// Per-request context inserted into request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// `None` on anonymous requests.
    pub session: Option<Session>,
}

impl RequestContext {
    pub fn session(&self) -> AppResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("invalid session".into()))
    }
}

/// A request token and whether the session cookie was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestToken {
    value: String,
    from_cookie: bool,
}

/// Cookie first, then the bearer header. The header wins the value when both
/// are present, but the request still counts as cookie-borne for CSRF.
fn extract_token(headers: &HeaderMap) -> Option<RequestToken> {
    let mut token = None;
    let mut from_cookie = false;

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        token = Some(cookie.value().to_string());
        from_cookie = true;
    }

    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
        && value.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("bearer "))
    {
        token = Some(value[7..].trim().to_string());
    }

    token
        .filter(|value| !value.is_empty())
        .map(|value| RequestToken { value, from_cookie })
}

fn csrf_matches(headers: &HeaderMap, session: &Session) -> bool {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == session.csrf_token)
}

fn invalid_session() -> Response {
    AppError::Unauthorized("invalid session".into()).into_response()
}

fn unauthorized() -> Response {
    AppError::Unauthorized("unauthorized".into()).into_response()
}

/// Axum middleware: authenticates the request against the gate's
/// requirements and injects [`RequestContext`] into request extensions.
pub async fn authenticate(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = new_id().to_string();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let headers = request.headers().clone();
        let method = request.method().clone();

        let mut response = match gate.admit(&headers, &method).await {
            Ok(session) => {
                request.extensions_mut().insert(RequestContext {
                    request_id: request_id.clone(),
                    session,
                });
                next.run(request).await
            }
            Err(rejection) => rejection,
        };

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        debug!(status = response.status().as_u16(), "handled request");
        response
    }
    .instrument(span)
    .await
}

impl AuthGate {
    async fn admit(&self, headers: &HeaderMap, method: &Method) -> Result<Option<Session>, Response> {
        let session = match extract_token(headers) {
            None => None,
            Some(token) => {
                let session = self
                    .state
                    .accounts
                    .users()
                    .get_session(&Lookup::ByToken(token.value))
                    .await
                    .map_err(|e| {
                        warn!(error = %e.detail(), "session lookup failed");
                        invalid_session()
                    })?;

                if let Some(session) = &session
                    && token.from_cookie
                    && method != Method::GET
                    && !csrf_matches(headers, session)
                {
                    warn!(user_id = %session.user_id, "possible CSRF attempt");
                    return Err(invalid_session());
                }
                session
            }
        };

        let requirements = self.requirements;

        if requirements.session
            && !session
                .as_ref()
                .is_some_and(|s| !s.api_key || requirements.allow_api_key)
        {
            let cleared = clear_session_cookies(is_secure(headers));
            return Err((cleared, AppError::Unauthorized("invalid session".into())).into_response());
        }

        if requirements.verification && !self.is_verified(session.as_ref()).await {
            return Err(unauthorized());
        }

        if requirements.admin && !self.is_admin(session.as_ref()).await {
            return Err(unauthorized());
        }

        Ok(session)
    }

    async fn is_verified(&self, session: Option<&Session>) -> bool {
        let Some(session) = session else {
            return false;
        };
        match self.state.accounts.users().get(session.user_id).await {
            Ok(Some(user)) if user.email_verified => true,
            Ok(Some(_)) => {
                warn!(user_id = %session.user_id, "user is not verified");
                false
            }
            Ok(None) => {
                warn!(user_id = %session.user_id, "session names a missing user");
                false
            }
            Err(e) => {
                error!(user_id = %session.user_id, error = %e.detail(), "failed to load user");
                false
            }
        }
    }

    async fn is_admin(&self, session: Option<&Session>) -> bool {
        let Some(session) = session else {
            return false;
        };
        match self
            .state
            .accounts
            .users()
            .has_admin_permission(session.user_id)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                warn!(user_id = %session.user_id, "user is not admin");
                false
            }
            Err(e) => {
                error!(user_id = %session.user_id, error = %e.detail(), "failed to check admin role");
                false
            }
        }
    }
}
