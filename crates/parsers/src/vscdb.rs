//! Parser for the VS-Code-family chat store (`state.vscdb`).
//!
//! Cursor and Windsurf both persist their chat panel as a single JSON value
//! inside an embedded SQLite key-value table; only the `source` label
//! differs between them.

use crate::ToolParser;
use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use sessionwire_core::types::{ROLE_AGENT, ROLE_USER, STEP_PROMPT, STEP_TEXT};
use sessionwire_core::{SessionCreateRequest, SessionStep};
use sessionwire_paths::{TOOL_CURSOR, TOOL_WINDSURF};
use std::path::Path;

/// Key under which the chat panel payload lives in `cursorDiskKV`.
const CHAT_PANEL_KEY: &str = "workbench.panel.aichat.v2";

pub struct CursorParser;

impl ToolParser for CursorParser {
    fn name(&self) -> &'static str {
        TOOL_CURSOR
    }

    fn parse_file(&self, path: &Path) -> Result<SessionCreateRequest> {
        parse_vscdb(path, TOOL_CURSOR)
    }
}

pub struct WindsurfParser;

impl ToolParser for WindsurfParser {
    fn name(&self) -> &'static str {
        TOOL_WINDSURF
    }

    fn parse_file(&self, path: &Path) -> Result<SessionCreateRequest> {
        parse_vscdb(path, TOOL_WINDSURF)
    }
}

#[derive(Debug, Deserialize)]
struct RawChatData {
    #[serde(default)]
    tabs: Vec<RawTab>,
}

#[derive(Debug, Deserialize)]
struct RawTab {
    #[serde(rename = "chatTitle", default)]
    chat_title: String,
    #[serde(default)]
    bubbles: Vec<RawBubble>,
}

#[derive(Debug, Deserialize)]
struct RawBubble {
    /// "user" or "ai".
    #[serde(rename = "type", default)]
    bubble_type: String,
    #[serde(default)]
    text: String,
    #[serde(rename = "rawText", default)]
    raw_text: String,
}

fn parse_vscdb(path: &Path, source: &str) -> Result<SessionCreateRequest> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("opening {}", path.display()))?;

    let value: String = conn
        .query_row(
            "SELECT value FROM cursorDiskKV WHERE key = ?1",
            [CHAT_PANEL_KEY],
            |row| row.get(0),
        )
        .with_context(|| format!("reading chat data from {}", path.display()))?;

    let chat: RawChatData = serde_json::from_str(&value)
        .with_context(|| format!("parsing chat data from {}", path.display()))?;

    // The workspace storage directory name is the stable identifier this
    // format provides; the file itself is always called state.vscdb.
    let workspace = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut req = SessionCreateRequest {
        title: workspace.clone(),
        source: source.to_string(),
        source_session_id: workspace,
        ..Default::default()
    };

    let mut order = 1u32;
    let mut titled = false;
    for tab in &chat.tabs {
        if !titled && !tab.chat_title.is_empty() {
            req.title = tab.chat_title.clone();
            titled = true;
        }
        for bubble in &tab.bubbles {
            let text = if bubble.text.is_empty() {
                &bubble.raw_text
            } else {
                &bubble.text
            };
            if text.is_empty() {
                continue;
            }

            let (role, step_type) = if bubble.bubble_type == "user" {
                (ROLE_USER, STEP_PROMPT)
            } else {
                (ROLE_AGENT, STEP_TEXT)
            };

            req.steps.push(SessionStep {
                role: role.to_string(),
                step_type: step_type.to_string(),
                content: text.clone(),
                order,
            });
            order += 1;
        }
    }

    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_vscdb(dir: &Path, payload: &str) -> std::path::PathBuf {
        let path = dir.join("state.vscdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE cursorDiskKV (key TEXT PRIMARY KEY, value TEXT)")
            .unwrap();
        conn.execute(
            "INSERT INTO cursorDiskKV (key, value) VALUES (?1, ?2)",
            [CHAT_PANEL_KEY, payload],
        )
        .unwrap();
        path
    }

    #[test]
    fn bubbles_become_ordered_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vscdb(
            dir.path(),
            r#"{"tabs":[{"chatTitle":"Refactor auth","bubbles":[
                {"type":"user","text":"rename the module"},
                {"type":"ai","text":"Done, renamed to auth_core."},
                {"type":"ai","text":"","rawText":"Anything else?"}
            ]}]}"#,
        );

        let req = CursorParser.parse_file(&path).unwrap();
        assert_eq!(req.source, "cursor");
        assert_eq!(req.title, "Refactor auth");
        assert_eq!(req.steps.len(), 3);
        assert_eq!(req.steps[0].role, "user");
        assert_eq!(req.steps[0].step_type, "prompt");
        assert_eq!(req.steps[1].role, "agent");
        assert_eq!(req.steps[2].content, "Anything else?");
        let orders: Vec<u32> = req.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn empty_bubbles_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vscdb(
            dir.path(),
            r#"{"tabs":[{"bubbles":[
                {"type":"user","text":""},
                {"type":"ai","text":"hello"}
            ]}]}"#,
        );

        let req = CursorParser.parse_file(&path).unwrap();
        assert_eq!(req.steps.len(), 1);
        assert_eq!(req.steps[0].order, 1);
    }

    #[test]
    fn title_and_session_id_fall_back_to_workspace_dir() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("3fa85f6457174562");
        std::fs::create_dir_all(&workspace).unwrap();
        let path = write_vscdb(&workspace, r#"{"tabs":[{"bubbles":[]}]}"#);

        let req = WindsurfParser.parse_file(&path).unwrap();
        assert_eq!(req.source, "windsurf");
        assert_eq!(req.title, "3fa85f6457174562");
        assert_eq!(req.source_session_id, "3fa85f6457174562");
        assert!(req.steps.is_empty());
    }

    #[test]
    fn missing_chat_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.vscdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE cursorDiskKV (key TEXT PRIMARY KEY, value TEXT)")
            .unwrap();
        drop(conn);

        assert!(CursorParser.parse_file(&path).is_err());
    }
}
