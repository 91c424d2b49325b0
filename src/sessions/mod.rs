//! Session management — per-key agent conversation state and token accounting.

pub mod in_memory;
pub mod traits;

pub use in_memory::{AgentSessionStore, SessionEntry};
pub use traits::{estimate_tokens, AgentSession, ChatMessage, Role, SessionKey};
