//! Session cookies and the headers that travel with them.
//!
//! Three cookies carry a browser session: the bearer token (httpOnly), the
//! CSRF value the client echoes back in `X-CSRF-Token`, and the user id for
//! client-side convenience. The user id cookie is never trusted for auth.

use std::convert::Infallible;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashboard_core::models::Session;
use dashboard_core::models::session::SESSION_TTL;
use time::Duration;

/// Cookie name for the session bearer token.
pub const SESSION_COOKIE: &str = "DASHBOARDAUTHTOKEN";
/// Cookie name for the CSRF token.
pub const CSRF_COOKIE: &str = "DASHBOARDCSRF";
/// Cookie name for the user id.
pub const USER_COOKIE: &str = "DASHBOARDUSERID";

/// Response header carrying a newly issued session token.
pub const TOKEN_HEADER: HeaderName = HeaderName::from_static("token");
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const REQUESTED_WITH_HEADER: HeaderName = HeaderName::from_static("x-requested-with");
const FORWARDED_PROTO_HEADER: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Whether the request reached the proxy over HTTPS.
pub fn is_secure(headers: &HeaderMap) -> bool {
    headers
        .get(FORWARDED_PROTO_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("https"))
}

/// Browser clients identify themselves with `X-Requested-With: XMLHttpRequest`
/// and get cookies; everything else manages the token header itself.
pub fn wants_cookies(headers: &HeaderMap) -> bool {
    headers
        .get(REQUESTED_WITH_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "XMLHttpRequest")
}

fn build(name: &'static str, value: String, http_only: bool, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(http_only)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// The three session cookies for `session`.
pub fn session_cookies(session: &Session, secure: bool) -> [Cookie<'static>; 3] {
    let max_age = Duration::seconds(SESSION_TTL.num_seconds());
    [
        build(SESSION_COOKIE, session.token.clone(), true, secure, max_age),
        build(CSRF_COOKIE, session.csrf_token.clone(), false, secure, max_age),
        build(USER_COOKIE, session.user_id.to_string(), false, secure, max_age),
    ]
}

/// Expired copies of the session cookies.
pub fn clear_session_cookies(secure: bool) -> CookieJar {
    [
        build(SESSION_COOKIE, String::new(), true, secure, Duration::ZERO),
        build(CSRF_COOKIE, String::new(), false, secure, Duration::ZERO),
        build(USER_COOKIE, String::new(), false, secure, Duration::ZERO),
    ]
    .into_iter()
    .fold(CookieJar::new(), |jar, cookie| jar.add(cookie))
}

/// Response parts for a freshly issued session: always the `Token` header,
/// plus cookies for browser clients.
pub struct IssuedSession {
    token: String,
    jar: CookieJar,
}

impl IssuedSession {
    pub fn new(request_headers: &HeaderMap, session: &Session) -> Self {
        let jar = if wants_cookies(request_headers) {
            session_cookies(session, is_secure(request_headers))
                .into_iter()
                .fold(CookieJar::new(), |jar, cookie| jar.add(cookie))
        } else {
            CookieJar::new()
        };
        Self {
            token: session.token.clone(),
            jar,
        }
    }
}

impl IntoResponseParts for IssuedSession {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Ok(value) = HeaderValue::from_str(&self.token) {
            res.headers_mut().insert(TOKEN_HEADER, value);
        }
        self.jar.into_response_parts(res)
    }
}
