mod claude_code;
mod copilot;
mod vscdb;

use anyhow::Result;
use sessionwire_core::SessionCreateRequest;
use sessionwire_paths::{TOOL_CLAUDE_CODE, TOOL_COPILOT, TOOL_CURSOR, TOOL_WINDSURF};
use std::path::Path;

pub use claude_code::ClaudeCodeParser;
pub use copilot::CopilotParser;
pub use vscdb::{CursorParser, WindsurfParser};

/// Trait for normalizing one tool's on-disk session format into the
/// canonical step sequence.
pub trait ToolParser: Send + Sync {
    /// Tool identifier (e.g. "claudecode", "cursor").
    fn name(&self) -> &'static str;

    /// Read a session file and produce a structured create request.
    fn parse_file(&self, path: &Path) -> Result<SessionCreateRequest>;
}

/// Look up the parser for a tool identifier.
///
/// Returns `None` for unknown tools; the orchestrator then falls back to an
/// opaque raw-file upload. Adding a tool means adding a parser here, not
/// branching on tool strings elsewhere.
pub fn parser_for_tool(tool: &str) -> Option<&'static dyn ToolParser> {
    static CLAUDE_CODE: ClaudeCodeParser = ClaudeCodeParser;
    static CURSOR: CursorParser = CursorParser;
    static WINDSURF: WindsurfParser = WindsurfParser;
    static COPILOT: CopilotParser = CopilotParser;

    match tool {
        TOOL_CLAUDE_CODE => Some(&CLAUDE_CODE),
        TOOL_CURSOR => Some(&CURSOR),
        TOOL_WINDSURF => Some(&WINDSURF),
        TOOL_COPILOT => Some(&COPILOT),
        _ => None,
    }
}

/// Filename stem, used as the fallback session identifier.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
