//! Conversation session types and token accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Composite key identifying a unique agent session.
///
/// Rendered as `<agent_id>:<session>`; both halves default to `main` when a
/// caller leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub agent_id: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(agent_id: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            session: session.into(),
        }
    }

    /// Build a key from optional caller-supplied parts, falling back to
    /// `main` for anything missing or blank.
    pub fn resolve(agent_id: Option<&str>, session: Option<&str>) -> Self {
        let pick = |part: Option<&str>| match part.map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => "main".to_string(),
        };
        Self {
            agent_id: pick(agent_id),
            session: pick(session),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.agent_id, self.session)
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message in a session's in-memory history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: at.timestamp_millis(),
        }
    }
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Mutable per-key conversation state.
///
/// History is append-only for the lifetime of the entry. `token_estimate`
/// accumulates over user and assistant messages only (the bootstrap system
/// injection is excluded) and is never reduced. `memory_flushed` latches
/// once the flush trigger has fired.
#[derive(Debug, Default)]
pub struct AgentSession {
    pub history: Vec<ChatMessage>,
    pub token_estimate: u64,
    pub memory_flushed: bool,
}

impl AgentSession {
    /// True before any message (system injection included) has been recorded.
    pub fn is_first_turn(&self) -> bool {
        self.history.is_empty()
    }

    /// Append a message without touching the token accumulator.
    pub fn append(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// Append a message and fold its token estimate into the running total.
    pub fn append_counted(&mut self, message: ChatMessage) {
        self.token_estimate += estimate_tokens(&message.content);
        self.history.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        // Four three-byte characters is still one token.
        assert_eq!(estimate_tokens("日本語字"), 1);
    }

    #[test]
    fn key_resolve_defaults_blank_parts_to_main() {
        let key = SessionKey::resolve(None, None);
        assert_eq!(key.to_string(), "main:main");
        let key = SessionKey::resolve(Some("  "), Some("dev"));
        assert_eq!(key.to_string(), "main:dev");
        let key = SessionKey::resolve(Some("ops"), None);
        assert_eq!(key.to_string(), "ops:main");
    }

    #[test]
    fn append_counted_accumulates_token_estimate() {
        let mut session = AgentSession::default();
        session.append_counted(ChatMessage::new(Role::User, "abcdefgh", Utc::now()));
        assert_eq!(session.token_estimate, 2);
        session.append_counted(ChatMessage::new(Role::Assistant, "abcd", Utc::now()));
        assert_eq!(session.token_estimate, 3);
        assert_eq!(session.history.len(), 2);
        assert!(!session.is_first_turn());
    }

    #[test]
    fn plain_append_leaves_accumulator_alone() {
        let mut session = AgentSession::default();
        session.append(ChatMessage::new(Role::System, "bootstrap context", Utc::now()));
        assert_eq!(session.token_estimate, 0);
        assert_eq!(session.history.len(), 1);
    }

    #[test]
    fn message_serializes_with_camel_case_and_lowercase_role() {
        let msg = ChatMessage::new(Role::Assistant, "hi", Utc::now());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }
}
