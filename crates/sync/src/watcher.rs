//! Filesystem subscription over the detected source roots.
//!
//! Events are classified against a static per-tool relevance predicate
//! before they reach the debouncer; everything else is dropped at the edge.
//! Roots are watched recursively, and the notify backend extends the watch
//! to subdirectories the tools create lazily, so per-project directories
//! that appear mid-session keep being observed.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sessionwire_paths::{
    SourcePath, TOOL_CLAUDE_CODE, TOOL_COPILOT, TOOL_CURSOR, TOOL_WINDSURF,
};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A relevant write-or-create, attributed to the tool owning the root it
/// landed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: std::path::PathBuf,
    pub tool: String,
}

/// Start watching every source root, sending classified events to `tx`.
///
/// The returned handle owns the subscriptions; dropping it cancels them.
pub fn start_watcher(
    sources: &[SourcePath],
    tx: mpsc::UnboundedSender<WatchEvent>,
) -> Result<RecommendedWatcher> {
    let sources_for_events = sources.to_vec();

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                for path in event.paths {
                    let Some(tool) = tool_for_path(&sources_for_events, &path) else {
                        continue;
                    };
                    if !is_relevant_file(&path, &tool) {
                        continue;
                    }
                    debug!("File change: {} ({tool})", path.display());
                    let _ = tx.send(WatchEvent { path, tool });
                }
            }
            // Errors from the notification channel are non-fatal; log and
            // keep watching.
            Err(e) => {
                error!("Watcher error: {e}");
            }
        }
    })
    .context("creating filesystem watcher")?;

    for source in sources {
        if let Err(e) = watcher.watch(&source.dir, RecursiveMode::Recursive) {
            warn!(
                "Could not watch {} ({}): {e}",
                source.tool,
                source.dir.display()
            );
        }
    }

    Ok(watcher)
}

/// Attribute a path to the tool whose root contains it.
fn tool_for_path(sources: &[SourcePath], path: &Path) -> Option<String> {
    sources
        .iter()
        .find(|source| path.starts_with(&source.dir))
        .map(|source| source.tool.clone())
}

/// Static per-tool relevance predicate: does this file hold session data?
fn is_relevant_file(path: &Path, tool: &str) -> bool {
    match tool {
        TOOL_CLAUDE_CODE => path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl")),
        TOOL_CURSOR | TOOL_WINDSURF => path
            .file_name()
            .is_some_and(|name| name.eq_ignore_ascii_case("state.vscdb")),
        TOOL_COPILOT => path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json")),
        _ => false,
    }
}
