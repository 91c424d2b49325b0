//! Agent session manager — runs one conversational turn end to end.
//!
//! Turn pipeline, in order: ensure the workspace exists, inject the
//! bootstrap/memory system message on a session's first turn, record the
//! user message, check the one-shot memory-flush line, run the content
//! triggers, then call the reply engine and record its answer. The per-key
//! entry lock is held for the whole turn, so turns on one key serialize
//! while distinct keys run in parallel.

use super::bootstrap;
use super::engine::ReplyEngine;
use super::triggers::{self, MemoryTrigger};
use crate::memory::{self, MemoryStore};
use crate::sessions::{AgentSessionStore, ChatMessage, Role, SessionKey};
use crate::util::Clock;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Fixed diagnostic line appended to the daily note when a session nears
/// compaction.
pub const FLUSH_NOTE: &str = "AUTO_FLUSH: session nearing compaction.";

/// Knobs the manager needs from configuration.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub workspace: PathBuf,
    pub context_window: u64,
    pub reserve_tokens_floor: u64,
    pub flush_enabled: bool,
    pub soft_threshold_tokens: u64,
    /// Deadline for one reply-engine call; `None` waits indefinitely.
    pub reply_timeout: Option<Duration>,
}

pub struct AgentSessionManager {
    settings: ManagerSettings,
    store: AgentSessionStore,
    memory: Arc<dyn MemoryStore>,
    engine: Arc<dyn ReplyEngine>,
    triggers: Vec<MemoryTrigger>,
    clock: Arc<dyn Clock>,
}

impl AgentSessionManager {
    pub fn new(
        settings: ManagerSettings,
        store: AgentSessionStore,
        memory: Arc<dyn MemoryStore>,
        engine: Arc<dyn ReplyEngine>,
        triggers: Vec<MemoryTrigger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            store,
            memory,
            engine,
            triggers,
            clock,
        }
    }

    pub fn store(&self) -> &AgentSessionStore {
        &self.store
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run one turn for `key` and return the assistant reply.
    ///
    /// On failure the turn's already-applied effects (user message, flush
    /// note, trigger appends) stay in place; nothing is rolled back or
    /// retried.
    pub async fn handle(&self, key: &SessionKey, user_text: &str) -> Result<ChatMessage> {
        let entry = self.store.entry(key);
        let mut session = entry.lock().await;

        self.memory.ensure_workspace().await?;

        if session.is_first_turn() {
            let mut sections = bootstrap::load_bootstrap(&self.settings.workspace).await?;
            sections.extend(self.memory.startup_excerpts().await?);
            let system_content = sections.join("\n\n");
            if !system_content.trim().is_empty() {
                session.append(ChatMessage::new(Role::System, system_content, self.clock.now()));
            }
        }

        session.append_counted(ChatMessage::new(Role::User, user_text, self.clock.now()));

        if self.settings.flush_enabled
            && !session.memory_flushed
            && memory::should_flush_memory(
                session.token_estimate,
                self.settings.context_window,
                self.settings.reserve_tokens_floor,
                self.settings.soft_threshold_tokens,
            )
        {
            self.memory.append_daily(FLUSH_NOTE).await?;
            session.memory_flushed = true;
            tracing::info!(
                session = %key,
                tokens = session.token_estimate,
                "memory flush triggered"
            );
        }

        let fired = triggers::apply_triggers(&self.triggers, self.memory.as_ref(), user_text)
            .await?;
        if !fired.is_empty() {
            tracing::debug!(session = %key, rules = ?fired, "memory triggers fired");
        }

        let reply_text = self
            .complete_reply(user_text, &session.history)
            .await
            .context("reply engine failed")?;
        let reply = ChatMessage::new(Role::Assistant, reply_text, self.clock.now());
        session.append_counted(reply.clone());

        Ok(reply)
    }

    async fn complete_reply(&self, user_text: &str, history: &[ChatMessage]) -> Result<String> {
        match self.settings.reply_timeout {
            Some(limit) => tokio::time::timeout(limit, self.engine.reply(user_text, history))
                .await
                .map_err(|_| anyhow!("no reply within {}s", limit.as_secs()))?,
            None => self.engine.reply(user_text, history).await,
        }
    }
}
