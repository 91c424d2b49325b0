//! Reply engines — the collaborator that produces assistant replies.
//!
//! The session manager makes exactly one [`ReplyEngine::reply`] call per
//! turn, after the user message has been recorded. Engines see the full
//! accumulated history (system injection included) and return plain reply
//! text; the manager wraps it into an assistant message and applies the
//! configured deadline.

use crate::sessions::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ReplyEngine: Send + Sync {
    /// Produce the assistant reply for one turn.
    async fn reply(&self, user_text: &str, history: &[ChatMessage]) -> Result<String>;

    /// The name of this engine implementation.
    fn name(&self) -> &str;
}

/// Built-in engine that echoes the user's message back.
///
/// Stands in until a model backend is wired up; the rest of the turn
/// pipeline (history, token accounting, memory triggers) behaves exactly as
/// it will with a real engine.
pub struct EchoEngine;

#[async_trait]
impl ReplyEngine for EchoEngine {
    async fn reply(&self, user_text: &str, _history: &[ChatMessage]) -> Result<String> {
        Ok(format!("Echo: {user_text}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}
