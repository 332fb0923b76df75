//! Session directory detection and runtime path helpers.
//!
//! Two jobs live here: figuring out where each supported AI tool keeps its
//! session transcripts on the current machine, and resolving the directories
//! sessionwire itself writes to (config, ledger, retry queue).

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::PathBuf;

/// Tool identifiers as they appear on the wire (`source` field) and in the
/// retry queue. These are the only values the watcher will classify.
pub const TOOL_CLAUDE_CODE: &str = "claudecode";
pub const TOOL_CURSOR: &str = "cursor";
pub const TOOL_WINDSURF: &str = "windsurf";
pub const TOOL_COPILOT: &str = "copilot";

/// A tool's session directory, as produced once per watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    pub tool: String,
    pub dir: PathBuf,
}

impl SourcePath {
    fn new(tool: &str, dir: PathBuf) -> Self {
        Self {
            tool: tool.to_string(),
            dir,
        }
    }
}

/// All session directories that exist on disk right now.
///
/// Purely a function of OS conventions plus a `stat` per candidate; an empty
/// result means no supported tool is installed, not an error.
pub fn detect_sources() -> Vec<SourcePath> {
    all_source_paths()
        .into_iter()
        .filter(|sp| sp.dir.is_dir())
        .collect()
}

/// The full candidate table, whether or not the directories exist.
///
/// Claude Code keeps transcripts under `~/.claude/projects` on every OS. The
/// VS-Code-family tools (Cursor, Windsurf, Copilot-in-Code) all use
/// `<platform config dir>/<Product>/User/workspaceStorage`, which `BaseDirs`
/// resolves to `~/Library/Application Support` on macOS, `$XDG_CONFIG_HOME`
/// on Linux, and `%APPDATA%` on Windows.
pub fn all_source_paths() -> Vec<SourcePath> {
    let Some(base) = BaseDirs::new() else {
        return Vec::new();
    };

    let mut sources = vec![SourcePath::new(
        TOOL_CLAUDE_CODE,
        base.home_dir().join(".claude").join("projects"),
    )];

    for (tool, product) in [
        (TOOL_CURSOR, "Cursor"),
        (TOOL_WINDSURF, "Windsurf"),
        (TOOL_COPILOT, "Code"),
    ] {
        sources.push(SourcePath::new(
            tool,
            workspace_storage_dir(&base, product),
        ));
    }

    sources
}

fn workspace_storage_dir(base: &BaseDirs, product: &str) -> PathBuf {
    base.config_dir()
        .join(product)
        .join("User")
        .join("workspaceStorage")
}

/// Directory for sessionwire's own config file (`~/.config/sessionwire`).
pub fn config_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("could not determine home directory")?;
    Ok(base.home_dir().join(".config").join("sessionwire"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Directory for sessionwire's data files (`~/.local/share/sessionwire`).
pub fn data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("could not determine home directory")?;
    Ok(base
        .home_dir()
        .join(".local")
        .join("share")
        .join("sessionwire"))
}

/// Path of the dedup ledger file.
pub fn ledger_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("uploaded.json"))
}

/// Path of the persistent retry queue database.
pub fn retry_db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("retry.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_table_covers_all_tools() {
        let sources = all_source_paths();
        let tools: Vec<&str> = sources.iter().map(|s| s.tool.as_str()).collect();
        assert_eq!(
            tools,
            vec![TOOL_CLAUDE_CODE, TOOL_CURSOR, TOOL_WINDSURF, TOOL_COPILOT]
        );
    }

    #[test]
    fn claude_code_dir_is_under_home() {
        let sources = all_source_paths();
        let claude = &sources[0];
        assert!(claude.dir.ends_with(".claude/projects"));
    }

    #[test]
    fn vscode_family_dirs_end_with_workspace_storage() {
        for sp in all_source_paths().iter().skip(1) {
            assert!(
                sp.dir.ends_with("User/workspaceStorage"),
                "{} should live in workspaceStorage: {}",
                sp.tool,
                sp.dir.display()
            );
        }
    }

    #[test]
    fn detect_only_returns_existing_dirs() {
        for sp in detect_sources() {
            assert!(sp.dir.is_dir());
        }
    }
}
