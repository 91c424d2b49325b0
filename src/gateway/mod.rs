//! HTTP and WebSocket protocol server.
//!
//! One axum router carries the dashboard API (`/api/*`), the chat socket
//! (`/ws`), and the built web UI when `apps/web/dist` exists. All state the
//! handlers need travels in [`AppState`]; nothing request-scoped lives in
//! globals, so the router is testable without binding a port.

pub mod api;
pub mod error;
pub mod preview;
pub mod ws;

pub use error::ApiError;

use crate::agent::{self, AgentSessionManager};
use crate::config::Config;
use crate::security::SessionRegistry;
use crate::util::{Clock, SystemClock};
use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{any, get, post};
use axum::Router;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_status::SetStatus;

/// Request body cap for every route.
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Built web UI, served when present.
const WEB_DIST_DIR: &str = "apps/web/dist";

/// Shared handler state: config snapshot plus the two live stores.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub manager: Arc<AgentSessionManager>,
}

/// Wire the registry and manager from config.
pub fn build_state(config: Config, clock: Arc<dyn Clock>) -> Result<AppState> {
    let auth = &config.gateway.auth;
    let registry = SessionRegistry::new(
        auth.mode,
        (!auth.token.is_empty()).then(|| auth.token.clone()),
        auth.password_hash.clone(),
        config.sessions.max_auth_sessions,
        agent::idle_timeout(config.sessions.idle_timeout_secs),
        clock.clone(),
    );
    let manager = agent::create_manager(&config, clock)?;
    Ok(AppState {
        config: Arc::new(config),
        registry: Arc::new(registry),
        manager: Arc::new(manager),
    })
}

/// The full gateway router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/health", get(api::handle_health))
        .route("/api/config", get(api::handle_config))
        .route("/api/session", get(api::handle_session))
        .route("/api/login", post(api::handle_login))
        .route("/api/logout", post(api::handle_logout))
        .route("/api/chat", post(api::handle_chat))
        .route("/api/dev-preview", get(api::handle_dev_preview))
        .route("/ws", get(ws::handle_ws))
        // Unknown API paths must not fall through to the SPA fallback.
        .route("/api/{*rest}", any(api_not_found));

    let router = match web_assets(Path::new(WEB_DIST_DIR)) {
        Some(spa) => api.fallback_service(spa),
        None => api.route("/", get(banner)),
    };

    router
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}

/// SPA service for the built web UI, with client-side routing fallback.
fn web_assets(dist: &Path) -> Option<ServeDir<SetStatus<ServeFile>>> {
    if !dist.exists() {
        tracing::info!(
            dir = %dist.display(),
            "web UI build not found, serving text banner"
        );
        return None;
    }
    let index = dist.join("index.html");
    Some(ServeDir::new(dist).not_found_service(ServeFile::new(index)))
}

async fn banner() -> &'static str {
    "OpenGrasp gateway running. Build the web UI to view."
}

async fn api_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "error": "not found" })),
    )
}

/// Bind and serve until ctrl-c or SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = build_state(config, Arc::new(SystemClock))?;

    let addr = format!(
        "{}:{}",
        state.config.gateway.bind, state.config.gateway.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(
        addr = %addr,
        auth_mode = state.config.gateway.auth.mode.as_str(),
        engine = state.manager.engine_name(),
        "gateway listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
