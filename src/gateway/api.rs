//! REST API handlers for the web dashboard and the one-shot CLI client.
//!
//! Auth gating happens inside each protected handler, before any body
//! parsing, so an unauthenticated caller learns nothing about what a valid
//! request would have looked like.

use super::error::ApiError;
use super::preview;
use super::AppState;
use crate::security::registry::{clear_cookie_header, set_cookie_header};
use crate::security::LoginOutcome;
use crate::sessions::SessionKey;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

// ── Header extraction ───────────────────────────────────────────

/// Extract the bearer token from the Authorization header, if any.
pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
}

pub(super) fn cookie_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::COOKIE).and_then(|v| v.to_str().ok())
}

/// Gate a protected route: session cookie, or bearer token under token mode.
pub(super) fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state
        .registry
        .authorize(cookie_header(headers), extract_bearer_token(headers))
    {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

// ── Request bodies ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
}

// ── Handlers ────────────────────────────────────────────────────

/// GET /api/health — liveness probe
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// GET /api/config — redacted config view (mode yes, secrets never)
pub async fn handle_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.redacted_view())
}

/// GET /api/session — whether the caller's cookie holds a live session
pub async fn handle_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let authenticated = state.registry.is_authenticated(cookie_header(&headers));
    Json(json!({ "authenticated": authenticated }))
}

/// POST /api/login — exchange a token or password for a session cookie
///
/// The scrypt verify under password mode is CPU-bound, so the login
/// decision runs on the blocking pool. Failures are a uniform 401.
pub async fn handle_login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body: LoginBody = serde_json::from_slice(&body).unwrap_or_default();

    let registry = state.registry.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        registry.login(body.token.as_deref(), body.password.as_deref())
    })
    .await
    .map_err(|e| ApiError::Agent(anyhow::anyhow!("login task failed: {e}")))?;

    match outcome {
        LoginOutcome::Open => Ok(Json(json!({ "ok": true })).into_response()),
        LoginOutcome::Granted { cookie, .. } => Ok((
            [(header::SET_COOKIE, set_cookie_header(&cookie))],
            Json(json!({ "ok": true })),
        )
            .into_response()),
        LoginOutcome::Denied => Err(ApiError::Unauthorized),
    }
}

/// POST /api/logout — drop the caller's session and clear the cookie
pub async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(id) = state
        .registry
        .session_from_cookie_header(cookie_header(&headers))
    {
        state.registry.destroy(&id);
    }
    (
        [(header::SET_COOKIE, clear_cookie_header())],
        Json(json!({ "ok": true })),
    )
}

/// POST /api/chat — run one agent turn and return the assistant message
pub async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_auth(&state, &headers)?;

    let body: ChatBody = serde_json::from_slice(&body).unwrap_or_default();
    let Some(message) = body.message.filter(|m| !m.is_empty()) else {
        return Err(ApiError::bad_request("message required"));
    };

    let key = SessionKey::resolve(body.agent.as_deref(), body.session.as_deref());
    // A disconnect must not cancel a turn in flight, so the turn runs as its
    // own task instead of inside the connection's future.
    let manager = state.manager.clone();
    let reply = tokio::task::spawn(async move { manager.handle(&key, &message).await })
        .await
        .map_err(|e| ApiError::Agent(anyhow::anyhow!("chat task failed: {e}")))??;
    Ok(Json(json!({ "ok": true, "message": reply })))
}

/// GET /api/dev-preview — local dev-server URL for the preview pane
pub async fn handle_dev_preview(State(state): State<AppState>) -> impl IntoResponse {
    let url = preview::detect_dev_url(&state.config.dev.preview).await;
    Json(json!({ "url": url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::router;
    use crate::gateway::test_support::state_with_mode;
    use crate::security::{hash_password, AuthMode, SESSION_COOKIE};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_open_and_exact() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let response = router(state).oneshot(get("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn config_view_is_open_but_redacted() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let response = router(state).oneshot(get("/api/config")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["gateway"]["auth"]["mode"], "token");
        assert_eq!(body["gateway"]["port"], 18789);
        assert!(!body.to_string().contains("test-token"));
    }

    #[tokio::test]
    async fn session_reports_unauthenticated_without_cookie() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let response = router(state).oneshot(get("/api/session")).await.unwrap();

        assert_eq!(body_json(response).await, json!({ "authenticated": false }));
    }

    #[tokio::test]
    async fn session_is_always_authenticated_under_open_mode() {
        let (state, _tmp) = state_with_mode(AuthMode::None);
        let response = router(state).oneshot(get("/api/session")).await.unwrap();

        assert_eq!(body_json(response).await, json!({ "authenticated": true }));
    }

    #[tokio::test]
    async fn login_with_wrong_token_is_generic_401() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let registry = state.registry.clone();
        let response = router(state)
            .oneshot(post_json("/api/login", r#"{"token":"wrong"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "ok": false, "error": "unauthorized" })
        );
        assert_eq!(registry.live_sessions(), 0);
    }

    #[tokio::test]
    async fn login_open_mode_succeeds_without_cookie() {
        let (state, _tmp) = state_with_mode(AuthMode::None);
        let response = router(state)
            .oneshot(post_json("/api/login", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn login_then_cookie_authorizes_chat() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let app = router(state);

        let login = app
            .clone()
            .oneshot(post_json("/api/login", r#"{"token":"test-token"}"#))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);

        let set_cookie = login
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with(&format!("{SESSION_COOKIE}=")));
        assert!(set_cookie.contains("HttpOnly"));
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let chat = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("Content-Type", "application/json")
                    .header("Cookie", cookie)
                    .body(Body::from(r#"{"message":"hi there"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(chat.status(), StatusCode::OK);
        let body = body_json(chat).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["message"]["role"], "assistant");
        assert_eq!(body["message"]["content"], "Echo: hi there");
    }

    #[tokio::test]
    async fn password_login_mints_session() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::Config::default();
        config.gateway.auth.mode = AuthMode::Password;
        config.gateway.auth.password_hash = Some(hash_password("open sesame").unwrap());
        config.agents.defaults.workspace = tmp.path().display().to_string();
        let state =
            crate::gateway::build_state(config, std::sync::Arc::new(crate::util::SystemClock))
                .unwrap();
        let app = router(state);

        let wrong = app
            .clone()
            .oneshot(post_json("/api/login", r#"{"password":"guess"}"#))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let right = app
            .oneshot(post_json("/api/login", r#"{"password":"open sesame"}"#))
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::OK);
        assert!(right.headers().get(header::SET_COOKIE).is_some());
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_kills_session() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let registry = state.registry.clone();
        let app = router(state);

        let login = app
            .clone()
            .oneshot(post_json("/api/login", r#"{"token":"test-token"}"#))
            .await
            .unwrap();
        let cookie = login
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        assert_eq!(registry.live_sessions(), 1);

        let logout = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/logout")
                    .header("Cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(logout.status(), StatusCode::OK);
        assert_eq!(registry.live_sessions(), 0);
        let cleared = logout
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn chat_without_auth_is_401_even_with_empty_body() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let response = router(state)
            .oneshot(post_json("/api/chat", ""))
            .await
            .unwrap();

        // Auth is decided before the body is looked at.
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "ok": false, "error": "unauthorized" })
        );
    }

    #[tokio::test]
    async fn chat_with_bearer_token_skips_login() {
        let (state, _tmp) = state_with_mode(AuthMode::Token);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("Authorization", "Bearer test-token")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"message":"ping"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"]["content"], "Echo: ping");
    }

    #[tokio::test]
    async fn chat_requires_a_message() {
        let (state, _tmp) = state_with_mode(AuthMode::None);
        let app = router(state);

        for body in ["{}", r#"{"message":""}"#, "not json"] {
            let response = app
                .clone()
                .oneshot(post_json("/api/chat", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                body_json(response).await,
                json!({ "ok": false, "error": "message required" })
            );
        }
    }

    #[tokio::test]
    async fn chat_routes_to_named_session() {
        let (state, _tmp) = state_with_mode(AuthMode::None);
        let manager = state.manager.clone();
        let app = router(state);

        let response = app
            .oneshot(post_json(
                "/api/chat",
                r#"{"message":"hello","agent":"main","session":"side"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let key = SessionKey::new("main", "side");
        let entry = manager.store().peek(&key).unwrap();
        assert_eq!(entry.lock().await.history.len(), 2);
    }

    #[tokio::test]
    async fn dev_preview_is_open_and_reports_fixed_url() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::Config::default();
        config.gateway.auth.mode = AuthMode::Token;
        config.gateway.auth.token = "test-token".into();
        config.dev.preview.mode = crate::config::PreviewMode::Fixed;
        config.dev.preview.url = Some("http://127.0.0.1:5173".into());
        config.agents.defaults.workspace = tmp.path().display().to_string();
        let state =
            crate::gateway::build_state(config, std::sync::Arc::new(crate::util::SystemClock))
                .unwrap();

        // No cookie, no bearer token: the probe is reachable anyway.
        let response = router(state)
            .oneshot(get("/api/dev-preview"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "url": "http://127.0.0.1:5173" })
        );
    }
}
