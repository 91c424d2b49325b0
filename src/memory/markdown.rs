//! Markdown-file memory store.
//!
//! Layout under the workspace root:
//!   `memory/YYYY-MM-DD.md` — daily notes (UTC date from the injected clock)
//!   `MEMORY.md`            — long-term note
//!
//! Appends are newline-terminated; a payload already ending in `\n` is
//! written as-is.

use super::traits::MemoryStore;
use crate::util::Clock;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const MEMORY_DIR: &str = "memory";
const LONG_TERM_FILE: &str = "MEMORY.md";

pub struct MarkdownMemory {
    workspace: PathBuf,
    clock: Arc<dyn Clock>,
}

impl MarkdownMemory {
    pub fn new(workspace: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            workspace: workspace.into(),
            clock,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.workspace.join(MEMORY_DIR)
    }

    pub fn daily_note_path(&self, date: NaiveDate) -> PathBuf {
        self.notes_dir().join(format!("{}.md", date.format("%Y-%m-%d")))
    }

    pub fn long_term_path(&self) -> PathBuf {
        self.workspace.join(LONG_TERM_FILE)
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    async fn append(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let line = if content.ends_with('\n') {
            content.to_string()
        } else {
            format!("{content}\n")
        };
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("appending to {}", path.display()))?;
        Ok(())
    }

    /// Read a note file; `None` when it does not exist.
    async fn read_note(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

#[async_trait]
impl MemoryStore for MarkdownMemory {
    async fn ensure_workspace(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.notes_dir())
            .await
            .with_context(|| format!("creating workspace {}", self.workspace.display()))?;
        Ok(())
    }

    async fn append_daily(&self, content: &str) -> Result<()> {
        self.append(&self.daily_note_path(self.today()), content).await
    }

    async fn append_long_term(&self, content: &str) -> Result<()> {
        self.append(&self.long_term_path(), content).await
    }

    async fn startup_excerpts(&self) -> Result<Vec<String>> {
        let today = self.today();
        let yesterday = today - Duration::days(1);
        let mut excerpts = Vec::new();
        for path in [
            self.daily_note_path(today),
            self.daily_note_path(yesterday),
            self.long_term_path(),
        ] {
            if let Some(content) = self.read_note(&path).await? {
                if !content.trim().is_empty() {
                    excerpts.push(content);
                }
            }
        }
        Ok(excerpts)
    }

    fn name(&self) -> &str {
        "markdown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::cache::ManualClock;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn store_at(tmp: &TempDir, y: i32, m: u32, d: u32) -> MarkdownMemory {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap());
        MarkdownMemory::new(tmp.path(), Arc::new(clock))
    }

    #[tokio::test]
    async fn ensure_creates_notes_dir() {
        let tmp = TempDir::new().unwrap();
        let mem = store_at(&tmp, 2025, 6, 1);
        mem.ensure_workspace().await.unwrap();
        assert!(tmp.path().join("memory").is_dir());
    }

    #[tokio::test]
    async fn daily_note_lands_in_dated_file() {
        let tmp = TempDir::new().unwrap();
        let mem = store_at(&tmp, 2025, 6, 1);
        mem.append_daily("first note").await.unwrap();

        let path = tmp.path().join("memory/2025-06-01.md");
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(body, "first note\n");
    }

    #[tokio::test]
    async fn appends_accumulate_lines() {
        let tmp = TempDir::new().unwrap();
        let mem = store_at(&tmp, 2025, 6, 1);
        mem.append_daily("one").await.unwrap();
        mem.append_daily("two\n").await.unwrap();

        let body = tokio::fs::read_to_string(tmp.path().join("memory/2025-06-01.md"))
            .await
            .unwrap();
        assert_eq!(body, "one\ntwo\n");
    }

    #[tokio::test]
    async fn long_term_note_lives_at_workspace_root() {
        let tmp = TempDir::new().unwrap();
        let mem = store_at(&tmp, 2025, 6, 1);
        mem.append_long_term("keep this").await.unwrap();

        let body = tokio::fs::read_to_string(tmp.path().join("MEMORY.md"))
            .await
            .unwrap();
        assert_eq!(body, "keep this\n");
    }

    #[tokio::test]
    async fn startup_excerpts_order_and_omissions() {
        let tmp = TempDir::new().unwrap();
        let mem = store_at(&tmp, 2025, 6, 2);
        tokio::fs::create_dir_all(tmp.path().join("memory"))
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("memory/2025-06-02.md"), "today")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("memory/2025-06-01.md"), "yesterday")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("MEMORY.md"), "long term")
            .await
            .unwrap();

        let excerpts = mem.startup_excerpts().await.unwrap();
        assert_eq!(excerpts, vec!["today", "yesterday", "long term"]);
    }

    #[tokio::test]
    async fn missing_and_empty_notes_are_omitted() {
        let tmp = TempDir::new().unwrap();
        let mem = store_at(&tmp, 2025, 6, 2);
        tokio::fs::create_dir_all(tmp.path().join("memory"))
            .await
            .unwrap();
        // No daily notes at all; empty long-term file.
        tokio::fs::write(tmp.path().join("MEMORY.md"), "").await.unwrap();

        let excerpts = mem.startup_excerpts().await.unwrap();
        assert!(excerpts.is_empty());
    }

    #[tokio::test]
    async fn month_boundary_yesterday_resolves() {
        let tmp = TempDir::new().unwrap();
        let mem = store_at(&tmp, 2025, 7, 1);
        tokio::fs::create_dir_all(tmp.path().join("memory"))
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("memory/2025-06-30.md"), "end of june")
            .await
            .unwrap();

        let excerpts = mem.startup_excerpts().await.unwrap();
        assert_eq!(excerpts, vec!["end of june"]);
    }
}
