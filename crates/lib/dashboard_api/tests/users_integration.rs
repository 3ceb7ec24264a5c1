//! Integration tests: build the router over the in-memory store and a
//! recording mailer, drive it with `oneshot`, assert status, headers and
//! store state.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use dashboard_api::config::ApiConfig;
use dashboard_api::{AppState, router};
use dashboard_core::accounts::UserService;
use dashboard_core::mail::RecordingMailer;
use dashboard_core::models::{RoleName, TokenType, UserState};
use dashboard_core::store::{self, Lookup, MemoryStore, SessionStore};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    state: AppState,
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestResponse {
    fn token(&self) -> String {
        self.headers
            .get("token")
            .and_then(|v| v.to_str().ok())
            .expect("token header")
            .to_string()
    }

    fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store::initialize(store.as_ref()).await.expect("seed roles");
    let mailer = Arc::new(RecordingMailer::new());
    let config = ApiConfig {
        site_url: "https://dash.example.com".into(),
        github_client_id: Some("client-id".into()),
        ..ApiConfig::default()
    };
    let state = AppState::new(store.clone(), mailer.clone(), config);
    TestApp {
        app: router(state.clone()),
        state,
        store,
        mailer,
    }
}

fn request(method: Method, uri: &str, body: Option<Value>, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self.app.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> TestResponse {
        self.send(request(
            Method::POST,
            "/api/v1/users/signup",
            Some(json!({ "email": email, "password": password })),
            &[],
        ))
        .await
    }

    /// Sign up and return (user id, bearer token).
    async fn signed_up(&self, email: &str) -> (Uuid, String) {
        let resp = self.sign_up(email, "Password12").await;
        assert_eq!(resp.status, StatusCode::CREATED);
        let id = resp.body["user"]["id"].as_str().unwrap().parse().unwrap();
        (id, resp.token())
    }

    async fn verified(&self, email: &str) -> (Uuid, String) {
        let (id, token) = self.signed_up(email).await;
        self.state.accounts.users().verify_email(id).await.unwrap();
        (id, token)
    }

    async fn get_me(&self, token: &str) -> TestResponse {
        let auth = format!("Bearer {token}");
        self.send(request(
            Method::GET,
            "/api/v1/users/me",
            None,
            &[("authorization", &auth)],
        ))
        .await
    }

    async fn csrf_for(&self, token: &str) -> String {
        self.store
            .get_session(&Lookup::ByToken(token.to_string()))
            .await
            .unwrap()
            .unwrap()
            .csrf_token
    }
}

#[tokio::test]
async fn signup_returns_created_user_and_token_header() {
    let t = test_app().await;
    let resp = t.sign_up("a@x.com", "Password12").await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["user"]["email"], "a@x.com");
    assert!(resp.body["user"].get("password").is_none());
    assert_eq!(resp.body["user"]["email_verified"], false);
    assert_eq!(resp.token().len(), 64);
    assert!(resp.set_cookies().is_empty());
    assert!(resp.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn signup_from_browser_sets_session_cookies() {
    let t = test_app().await;
    let resp = t
        .send(request(
            Method::POST,
            "/api/v1/users/signup",
            Some(json!({ "email": "a@x.com", "password": "Password12" })),
            &[
                ("x-requested-with", "XMLHttpRequest"),
                ("x-forwarded-proto", "https"),
            ],
        ))
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let cookies = resp.set_cookies();
    assert_eq!(cookies.len(), 3);
    let token_cookie = cookies
        .iter()
        .find(|c| c.starts_with("DASHBOARDAUTHTOKEN="))
        .unwrap();
    assert!(token_cookie.contains("HttpOnly"));
    assert!(token_cookie.contains("Secure"));
    assert!(cookies.iter().any(|c| c.starts_with("DASHBOARDCSRF=")));
    assert!(cookies.iter().any(|c| c.starts_with("DASHBOARDUSERID=")));
}

#[tokio::test]
async fn signup_rejects_bad_input_and_duplicates() {
    let t = test_app().await;

    let weak = t.sign_up("a@x.com", "weak").await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.body["message"], "invalid password");

    let bad_email = t.sign_up("not-an-email", "Password12").await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_email.body["message"], "invalid email");

    t.signed_up("a@x.com").await;
    let dup = t.sign_up("A@X.com", "Password12").await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn locked_login_is_distinct_from_wrong_password() {
    let t = test_app().await;
    let (locked_id, _) = t.signed_up("locked@x.com").await;
    t.signed_up("active@x.com").await;
    t.state
        .accounts
        .users()
        .set_state(locked_id, UserState::Locked)
        .await
        .unwrap();

    let locked = t
        .send(request(
            Method::POST,
            "/api/v1/users/login",
            Some(json!({ "email": "locked@x.com", "password": "Password12" })),
            &[],
        ))
        .await;
    assert_eq!(locked.status, StatusCode::LOCKED);

    let wrong = t
        .send(request(
            Method::POST,
            "/api/v1/users/login",
            Some(json!({ "email": "active@x.com", "password": "Password99" })),
            &[],
        ))
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = t
        .send(request(
            Method::POST,
            "/api/v1/users/login",
            Some(json!({ "email": "Active@X.com", "password": "Password12" })),
            &[],
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["email"], "active@x.com");
    assert_eq!(ok.token().len(), 64);
}

#[tokio::test]
async fn forgot_password_for_unknown_email_issues_no_token() {
    let t = test_app().await;
    let resp = t
        .send(request(
            Method::POST,
            "/api/v1/users/forgot-password",
            Some(json!({ "email": "ghost@x.com" })),
            &[],
        ))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["status"], "ok");
    assert_eq!(t.store.token_count_for_email("ghost@x.com"), 0);
    assert!(t.mailer.sent().is_empty());
}

#[tokio::test]
async fn change_password_with_wrong_current_is_forbidden_and_keeps_session() {
    let t = test_app().await;
    let (_, token) = t.verified("a@x.com").await;
    let auth = format!("Bearer {token}");

    let resp = t
        .send(request(
            Method::PUT,
            "/api/v1/users/me/password",
            Some(json!({ "current_password": "Wrong12345", "new_password": "Newpass123" })),
            &[("authorization", &auth)],
        ))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    assert_eq!(t.get_me(&token).await.status, StatusCode::OK);
}

#[tokio::test]
async fn change_password_rotates_every_session() {
    let t = test_app().await;
    let (id, token) = t.verified("a@x.com").await;
    let other = t.state.accounts.users().login(id).await.unwrap();
    let auth = format!("Bearer {token}");

    let resp = t
        .send(request(
            Method::PUT,
            "/api/v1/users/me/password",
            Some(json!({ "current_password": "Password12", "new_password": "Newpass123" })),
            &[("authorization", &auth)],
        ))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let fresh = resp.token();
    assert_ne!(fresh, token);

    assert_eq!(t.get_me(&token).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.get_me(&other.token).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.get_me(&fresh).await.status, StatusCode::OK);
    assert_eq!(t.store.session_count_for_user(id), 1);
}

#[tokio::test]
async fn cookie_session_requires_csrf_on_mutations() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;
    let cookie = format!("DASHBOARDAUTHTOKEN={token}");
    let csrf = t.csrf_for(&token).await;

    let missing = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email",
            None,
            &[("cookie", &cookie)],
        ))
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let wrong = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email",
            None,
            &[("cookie", &cookie), ("x-csrf-token", "nope")],
        ))
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert!(t.mailer.sent().is_empty());

    let ok = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email",
            None,
            &[("cookie", &cookie), ("x-csrf-token", &csrf)],
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(t.mailer.sent_to("a@x.com").len(), 1);
}

#[tokio::test]
async fn cookie_session_reads_skip_csrf() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;
    let cookie = format!("DASHBOARDAUTHTOKEN={token}");

    let resp = t
        .send(request(Method::GET, "/api/v1/users/me", None, &[("cookie", &cookie)]))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["email"], "a@x.com");
}

#[tokio::test]
async fn bearer_session_is_never_csrf_checked() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;
    let auth = format!("Bearer {token}");

    let resp = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email",
            None,
            &[("authorization", &auth), ("x-csrf-token", "irrelevant")],
        ))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn bearer_alongside_session_cookie_still_needs_csrf() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;
    let cookie = format!("DASHBOARDAUTHTOKEN={token}");
    let auth = format!("Bearer {token}");
    let csrf = t.csrf_for(&token).await;

    let missing = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email",
            None,
            &[("cookie", &cookie), ("authorization", &auth)],
        ))
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert!(t.mailer.sent().is_empty());

    let ok = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email",
            None,
            &[("cookie", &cookie), ("authorization", &auth), ("x-csrf-token", &csrf)],
        ))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test]
async fn missing_session_clears_cookies() {
    let t = test_app().await;
    let resp = t
        .send(request(
            Method::GET,
            "/api/v1/users/me",
            None,
            &[("cookie", "DASHBOARDAUTHTOKEN=stale")],
        ))
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    let cookies = resp.set_cookies();
    assert_eq!(cookies.len(), 3);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn store_failure_fails_closed() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;
    t.store.set_failing(true);

    assert_eq!(t.get_me(&token).await.status, StatusCode::UNAUTHORIZED);

    let auth = format!("Bearer {token}");
    let anonymous_route = t
        .send(request(
            Method::POST,
            "/api/v1/users/forgot-password",
            Some(json!({ "email": "a@x.com" })),
            &[("authorization", &auth)],
        ))
        .await;
    assert_eq!(anonymous_route.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_requires_verified_email() {
    let t = test_app().await;
    let (id, token) = t.signed_up("a@x.com").await;
    let auth = format!("Bearer {token}");
    let body = json!({ "id": id, "email": "a@x.com", "first_name": "Ada", "last_name": "L" });

    let unverified = t
        .send(request(
            Method::PUT,
            "/api/v1/users/me",
            Some(body.clone()),
            &[("authorization", &auth)],
        ))
        .await;
    assert_eq!(unverified.status, StatusCode::UNAUTHORIZED);

    t.state.accounts.users().verify_email(id).await.unwrap();
    let verified = t
        .send(request(
            Method::PUT,
            "/api/v1/users/me",
            Some(body),
            &[("authorization", &auth)],
        ))
        .await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["first_name"], "Ada");
}

#[tokio::test]
async fn admin_route_checks_role_per_request() {
    let t = test_app().await;
    let (id, token) = t.verified("admin@x.com").await;
    let (target, _) = t.signed_up("target@x.com").await;
    let auth = format!("Bearer {token}");
    let uri = format!("/api/v1/admin/users/{target}");

    let denied = t
        .send(request(Method::GET, &uri, None, &[("authorization", &auth)]))
        .await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);

    t.state
        .accounts
        .users()
        .grant_role(id, RoleName::Admin)
        .await
        .unwrap();
    let allowed = t
        .send(request(Method::GET, &uri, None, &[("authorization", &auth)]))
        .await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.body["email"], "target@x.com");
    assert!(allowed.body.get("password").is_none());
}

#[tokio::test]
async fn verify_email_complete_is_single_use() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;
    t.send(request(
        Method::POST,
        "/api/v1/users/verify-email",
        None,
        &[("authorization", &format!("Bearer {token}"))],
    ))
    .await;
    let code = t
        .store
        .latest_token_for_email("a@x.com", TokenType::VerifyEmail)
        .unwrap()
        .token;

    let first = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email-complete",
            Some(json!({ "token": code })),
            &[],
        ))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(t.get_me(&token).await.body["email_verified"], true);

    let replay = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email-complete",
            Some(json!({ "token": code })),
            &[],
        ))
        .await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
    assert_eq!(replay.body["message"], "invalid token");
}

#[tokio::test]
async fn reset_password_flow_invalidates_sessions() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;

    let forgot = t
        .send(request(
            Method::POST,
            "/api/v1/users/forgot-password",
            Some(json!({ "email": "a@x.com" })),
            &[],
        ))
        .await;
    assert_eq!(forgot.status, StatusCode::OK);
    let reset = t
        .store
        .latest_token_for_email("a@x.com", TokenType::ResetPassword)
        .unwrap()
        .token;

    let wrong_endpoint = t
        .send(request(
            Method::POST,
            "/api/v1/users/verify-email-complete",
            Some(json!({ "token": reset })),
            &[],
        ))
        .await;
    assert_eq!(wrong_endpoint.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_endpoint.body["message"], "invalid token");

    let done = t
        .send(request(
            Method::POST,
            "/api/v1/users/reset-password-complete",
            Some(json!({ "token": reset, "password": "Brandnew99" })),
            &[],
        ))
        .await;
    assert_eq!(done.status, StatusCode::OK);
    assert_eq!(t.get_me(&token).await.status, StatusCode::UNAUTHORIZED);

    let login = t
        .send(request(
            Method::POST,
            "/api/v1/users/login",
            Some(json!({ "email": "a@x.com", "password": "Brandnew99" })),
            &[],
        ))
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_destroys_session() {
    let t = test_app().await;
    let (_, token) = t.signed_up("a@x.com").await;
    let auth = format!("Bearer {token}");

    let resp = t
        .send(request(
            Method::POST,
            "/api/v1/users/logout",
            None,
            &[("authorization", &auth)],
        ))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(t.get_me(&token).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn github_connect_redirects_with_state() {
    let t = test_app().await;
    let resp = t
        .send(request(Method::GET, "/api/v1/oauth/github/connect", None, &[]))
        .await;

    assert_eq!(resp.status, StatusCode::FOUND);
    let location = resp.headers.get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
    assert!(location.contains("client_id=client-id"));
    assert!(location.contains("access_type=offline"));
    assert!(location.contains("state="));
}

#[tokio::test]
async fn health_reports_store_state() {
    let t = test_app().await;
    let ok = t.send(request(Method::GET, "/api/v1/health", None, &[])).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["status"], "ok");

    t.store.set_failing(true);
    let down = t.send(request(Method::GET, "/api/v1/health", None, &[])).await;
    assert_eq!(down.status, StatusCode::SERVICE_UNAVAILABLE);
}
