//! Memory store trait for workspace note persistence.

use anyhow::Result;
use async_trait::async_trait;

/// Append-only note storage attached to an agent workspace.
///
/// Two destinations: a dated daily note and a single long-term note. Reads
/// never fail on absent files; writes create whatever is missing.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Create the workspace layout (including the notes directory) if missing.
    async fn ensure_workspace(&self) -> Result<()>;

    /// Append a line to today's daily note.
    async fn append_daily(&self, content: &str) -> Result<()>;

    /// Append a line to the long-term note.
    async fn append_long_term(&self, content: &str) -> Result<()>;

    /// Memory carried into a session's first turn: today's note, yesterday's
    /// note, then the long-term note, in that order. Missing or empty files
    /// are silently omitted.
    async fn startup_excerpts(&self) -> Result<Vec<String>>;

    /// The name of this memory store implementation.
    fn name(&self) -> &str;
}
