//! Bootstrap documents injected into a session's first turn.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;

/// Workspace-root documents read on a session's first turn, in injection
/// order.
pub const BOOTSTRAP_FILES: &[&str] = &[
    "AGENTS.md",
    "SOUL.md",
    "TOOLS.md",
    "BOOTSTRAP.md",
    "IDENTITY.md",
    "USER.md",
];

/// Read the bootstrap documents for a workspace in canonical order.
///
/// Missing files and files with only whitespace are skipped.
pub async fn load_bootstrap(workspace: &Path) -> Result<Vec<String>> {
    let mut docs = Vec::new();
    for file in BOOTSTRAP_FILES {
        let path = workspace.join(file);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                if !content.trim().is_empty() {
                    docs.push(content);
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
    Ok(docs)
}

/// Default contents used when seeding a fresh workspace.
pub fn seed_contents() -> Vec<(&'static str, &'static str)> {
    vec![
        ("AGENTS.md", "# AGENTS\n\nOpenGrasp agent instructions."),
        ("SOUL.md", "# SOUL\n\nVoice and boundaries."),
        ("TOOLS.md", "# TOOLS\n\nPreferred tool usage."),
        ("BOOTSTRAP.md", "# BOOTSTRAP\n\nFirst-run ritual."),
        ("IDENTITY.md", "# IDENTITY\n\nName and vibe."),
        ("USER.md", "# USER\n\nUser profile."),
    ]
}

/// Write the seed documents into a workspace, leaving existing files alone
/// unless `force` is set. Returns the names of the files written.
pub async fn seed_workspace(workspace: &Path, force: bool) -> Result<Vec<&'static str>> {
    tokio::fs::create_dir_all(workspace)
        .await
        .with_context(|| format!("creating workspace {}", workspace.display()))?;
    let mut written = Vec::new();
    for (name, content) in seed_contents() {
        let path = workspace.join(name);
        if !force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            continue;
        }
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        written.push(name);
    }
    Ok(written)
}
