pub mod bootstrap;
pub mod engine;
pub mod manager;
pub mod triggers;

pub use bootstrap::{load_bootstrap, seed_workspace, BOOTSTRAP_FILES};
pub use engine::{EchoEngine, ReplyEngine};
pub use manager::{AgentSessionManager, ManagerSettings, FLUSH_NOTE};
pub use triggers::{apply_triggers, default_triggers, MemoryTrigger, NoteTarget};

use crate::config::Config;
use crate::memory::create_memory_store;
use crate::sessions::AgentSessionStore;
use crate::util::Clock;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Factory: the built-in reply engine.
///
/// Real model routing hangs off this seam; the shipped engine echoes.
pub fn create_engine() -> Arc<dyn ReplyEngine> {
    Arc::new(EchoEngine)
}

/// Factory: wire a session manager from config.
pub fn create_manager(config: &Config, clock: Arc<dyn Clock>) -> Result<AgentSessionManager> {
    let defaults = &config.agents.defaults;
    let flush = &defaults.compaction.memory_flush;
    let settings = ManagerSettings {
        workspace: config.workspace_dir(),
        context_window: defaults.context_window,
        reserve_tokens_floor: defaults.compaction.reserve_tokens_floor,
        flush_enabled: flush.enabled,
        soft_threshold_tokens: flush.soft_threshold_tokens,
        reply_timeout: defaults.reply_timeout_secs.map(Duration::from_secs),
    };
    let store = AgentSessionStore::new(
        config.sessions.max_agent_sessions,
        idle_timeout(config.sessions.idle_timeout_secs),
        clock.clone(),
    );
    let memory = create_memory_store(&config.workspace_dir(), clock.clone());
    Ok(AgentSessionManager::new(
        settings,
        store,
        memory,
        create_engine(),
        default_triggers()?,
        clock,
    ))
}

/// Session idle cutoff from config seconds; `0` disables sweeping.
pub fn idle_timeout(secs: u64) -> Option<chrono::Duration> {
    (secs > 0).then(|| chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
}
