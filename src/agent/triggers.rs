//! Content-triggered memory rules applied to each inbound user message.
//!
//! Rules run in list order after the flush check and before the reply call.
//! They are independent: one message can fire several. The default list
//! covers the `remember:` capture and the `long term` escalation; callers
//! may pass their own ordered list to extend or replace it.

use crate::memory::MemoryStore;
use anyhow::{Context, Result};
use regex::Regex;

/// Where a triggered note lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteTarget {
    Daily,
    LongTerm,
}

/// What gets persisted when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteText {
    /// The first capture group, trimmed.
    CapturedRemainder,
    /// The entire message, trimmed.
    WholeMessage,
}

/// One content rule: when `pattern` matches the user text, persist a note.
pub struct MemoryTrigger {
    name: String,
    pattern: Regex,
    target: NoteTarget,
    text: NoteText,
}

impl MemoryTrigger {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        target: NoteTarget,
        text: NoteText,
    ) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).with_context(|| format!("trigger pattern `{name}`"))?;
        Ok(Self {
            name,
            pattern,
            target,
            text,
        })
    }

    /// `remember:` / `remember this:` — captured remainder to the daily note.
    pub fn remember() -> Result<Self> {
        Self::new(
            "remember",
            r"(?i)remember(?: this)?:\s*(.+)",
            NoteTarget::Daily,
            NoteText::CapturedRemainder,
        )
    }

    /// `long term` / `long-term` anywhere — whole message to the long-term note.
    pub fn long_term() -> Result<Self> {
        Self::new(
            "long-term",
            r"(?i)long[- ]term",
            NoteTarget::LongTerm,
            NoteText::WholeMessage,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> NoteTarget {
        self.target
    }

    /// The note this rule would persist for `text`, if it matches.
    pub fn note_for(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let note = match self.text {
            NoteText::CapturedRemainder => caps.get(1)?.as_str().trim(),
            NoteText::WholeMessage => text.trim(),
        };
        (!note.is_empty()).then(|| note.to_string())
    }
}

/// The default ordered rule list.
pub fn default_triggers() -> Result<Vec<MemoryTrigger>> {
    Ok(vec![MemoryTrigger::remember()?, MemoryTrigger::long_term()?])
}

/// Run every rule in order against one user message; returns the names of
/// the rules that fired. A failed append aborts the remaining rules.
pub async fn apply_triggers(
    triggers: &[MemoryTrigger],
    memory: &dyn MemoryStore,
    text: &str,
) -> Result<Vec<String>> {
    let mut fired = Vec::new();
    for trigger in triggers {
        if let Some(note) = trigger.note_for(text) {
            match trigger.target {
                NoteTarget::Daily => memory.append_daily(&note).await?,
                NoteTarget::LongTerm => memory.append_long_term(&note).await?,
            }
            fired.push(trigger.name.clone());
        }
    }
    Ok(fired)
}
