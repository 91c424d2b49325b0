//! WebSocket chat endpoint.
//!
//! Flow:
//! 1. Client connects to `/ws` with a session cookie or bearer token;
//!    unauthorized upgrades are refused with a plain 401 before the
//!    handshake completes.
//! 2. Client sends `{"type":"chat","message":...}` frames (text or
//!    binary, both decoded as UTF-8 JSON), optionally naming an agent
//!    and session.
//! 3. Gateway answers each frame in order: `{"type":"chat","response":
//!    {"message":...}}` on success, `{"type":"error","error":...}` for
//!    malformed input or a failed turn.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use super::api::{cookie_header, extract_bearer_token};
use super::error::ApiError;
use super::AppState;
use crate::sessions::SessionKey;

/// GET /ws — upgrade to WebSocket. Auth is checked before the upgrade,
/// so a bad handshake from an anonymous client still reads as a 401.
pub async fn handle_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !state
        .registry
        .authorize(cookie_header(&headers), extract_bearer_token(&headers))
    {
        return ApiError::Unauthorized.into_response();
    }
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| chat_socket(socket, state)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn chat_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    while let Some(Ok(message)) = stream.next().await {
        let reply = match message {
            Message::Text(text) => answer_frame(&state, text.as_str()).await,
            Message::Binary(data) => answer_binary_frame(&state, &data).await,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {
                // axum handles WS-level ping/pong automatically.
                continue;
            }
        };
        if sink.send(Message::Text(reply.into())).await.is_err() {
            break;
        }
    }

    tracing::debug!("chat socket closed");
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    agent: Option<String>,
}

/// Binary frames carry the same JSON payloads as text frames, just
/// encoded as bytes. Decode leniently and hand off to the frame parser,
/// which reports any garbage as an error frame.
async fn answer_binary_frame(state: &AppState, data: &[u8]) -> String {
    answer_frame(state, &String::from_utf8_lossy(data)).await
}

/// Answer one inbound text frame, folding failures into an error frame.
async fn answer_frame(state: &AppState, text: &str) -> String {
    match handle_frame(state, text).await {
        Ok(reply) => reply,
        Err(error) => json!({ "type": "error", "error": error }).to_string(),
    }
}

async fn handle_frame(state: &AppState, text: &str) -> Result<String, String> {
    let frame: InboundFrame =
        serde_json::from_str(text).map_err(|e| format!("invalid frame: {e}"))?;

    match frame.kind.as_deref() {
        Some("chat") => {
            let Some(message) = frame.message.filter(|m| !m.is_empty()) else {
                return Err("message required".to_string());
            };
            let key = SessionKey::resolve(frame.agent.as_deref(), frame.session.as_deref());
            let manager = state.manager.clone();
            let reply = tokio::task::spawn(async move { manager.handle(&key, &message).await })
                .await
                .map_err(|e| format!("chat task failed: {e}"))?
                .map_err(|err| {
                    tracing::error!(error = format!("{err:#}"), "agent turn failed");
                    format!("agent error: {err}")
                })?;
            Ok(json!({ "type": "chat", "response": { "message": reply } }).to_string())
        }
        Some(other) => Err(format!("unsupported frame type: {other}")),
        None => Err("frame type required".to_string()),
    }
}
