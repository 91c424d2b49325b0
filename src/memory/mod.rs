//! Workspace memory — daily and long-term markdown notes.

pub mod markdown;
pub mod traits;

pub use markdown::MarkdownMemory;
pub use traits::MemoryStore;

use crate::util::Clock;
use std::path::Path;
use std::sync::Arc;

/// Factory: create the memory store for a workspace.
pub fn create_memory_store(workspace: &Path, clock: Arc<dyn Clock>) -> Arc<dyn MemoryStore> {
    Arc::new(MarkdownMemory::new(workspace, clock))
}

/// Whether a session's running token estimate has crossed the flush line:
/// the context window minus the reserved floor minus the soft threshold.
pub fn should_flush_memory(
    token_estimate: u64,
    context_window: u64,
    reserve_floor: u64,
    soft_threshold: u64,
) -> bool {
    let available = context_window.saturating_sub(reserve_floor + soft_threshold);
    token_estimate >= available
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::SystemClock;
    use tempfile::TempDir;

    #[test]
    fn factory_builds_markdown_store() {
        let tmp = TempDir::new().unwrap();
        let mem = create_memory_store(tmp.path(), Arc::new(SystemClock));
        assert_eq!(mem.name(), "markdown");
    }

    #[test]
    fn flush_line_with_default_thresholds() {
        // 128000 - 20000 - 4000 = 104000
        assert!(!should_flush_memory(103_999, 128_000, 20_000, 4_000));
        assert!(should_flush_memory(104_000, 128_000, 20_000, 4_000));
        assert!(should_flush_memory(150_000, 128_000, 20_000, 4_000));
    }

    #[test]
    fn flush_line_saturates_on_tiny_windows() {
        // Floor + threshold beyond the window: every estimate flushes.
        assert!(should_flush_memory(0, 1_000, 900, 200));
    }
}
