//! Parser for Claude Code's line-delimited JSONL transcripts.
//!
//! Each line is an independent JSON object with a `type` and a
//! `message.content` that is either a plain string or an array of typed
//! blocks. Lines that fail to parse, or whose content resolves empty, are
//! skipped without consuming an order value.

use crate::{ToolParser, file_stem};
use anyhow::{Context, Result};
use serde::Deserialize;
use sessionwire_core::types::{
    ROLE_AGENT, ROLE_SYSTEM, ROLE_USER, STEP_PROMPT, STEP_TEXT, STEP_TOOL_CALL,
};
use sessionwire_core::{SessionCreateRequest, SessionStep};
use sessionwire_paths::TOOL_CLAUDE_CODE;
use std::io::{BufRead, BufReader};
use std::path::Path;

const TOOL_INPUT_MAX_CHARS: usize = 500;

pub struct ClaudeCodeParser;

impl ToolParser for ClaudeCodeParser {
    fn name(&self) -> &'static str {
        TOOL_CLAUDE_CODE
    }

    fn parse_file(&self, path: &Path) -> Result<SessionCreateRequest> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?;

        let mut req = SessionCreateRequest {
            title: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source: TOOL_CLAUDE_CODE.to_string(),
            ..Default::default()
        };

        let mut order = 1u32;
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            if line.is_empty() {
                continue;
            }
            let Ok(entry) = serde_json::from_str::<RawEntry>(&line) else {
                continue;
            };

            // The first line carrying a session id wins.
            if req.source_session_id.is_empty() {
                if let Some(id) = entry.session_id.as_deref().filter(|id| !id.is_empty()) {
                    req.source_session_id = id.to_string();
                }
            }

            let Some(step) = entry_to_step(&entry, order) else {
                continue;
            };
            req.steps.push(step);
            order += 1;
        }

        if req.source_session_id.is_empty() {
            req.source_session_id = file_stem(path);
        }

        Ok(req)
    }
}

// ── Raw JSONL deserialization types ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "type", default)]
    entry_type: String,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<RawContent>,
}

/// Message content is either a plain string or an array of typed blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<RawBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        content: ToolResultContent,
    },
    // Unknown block types are skipped gracefully.
    #[serde(other)]
    Other,
}

/// tool_result payloads appear as a bare string, an array of text blocks,
/// or nothing at all depending on the tool that produced them.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum ToolResultContent {
    #[default]
    Absent,
    Text(String),
    Blocks(Vec<ToolResultBlock>),
}

#[derive(Debug, Deserialize)]
struct ToolResultBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

// ── Normalization ────────────────────────────────────────────────────────────

struct Extracted {
    text: String,
    step_type: Option<&'static str>,
    has_tool_result: bool,
}

fn entry_to_step(entry: &RawEntry, order: u32) -> Option<SessionStep> {
    let is_user = matches!(entry.entry_type.as_str(), "user" | "human");
    let is_agent = matches!(entry.entry_type.as_str(), "assistant" | "agent");
    let is_system = entry.entry_type == "system";
    if !is_user && !is_agent && !is_system {
        return None;
    }

    let content = entry.message.as_ref()?.content.as_ref()?;
    let extracted = extract_content(content);
    if extracted.text.is_empty() {
        return None;
    }

    // A tool_result block means this entry is a tool relay, not a real human
    // turn, even when its wrapping type is "user".
    let (role, step_type) = if extracted.has_tool_result {
        (ROLE_SYSTEM, extracted.step_type.unwrap_or(STEP_TEXT))
    } else if is_user {
        (ROLE_USER, extracted.step_type.unwrap_or(STEP_PROMPT))
    } else if is_system {
        (ROLE_SYSTEM, extracted.step_type.unwrap_or(STEP_TEXT))
    } else {
        (ROLE_AGENT, extracted.step_type.unwrap_or(STEP_TEXT))
    };

    Some(SessionStep {
        role: role.to_string(),
        step_type: step_type.to_string(),
        content: extracted.text,
        order,
    })
}

fn extract_content(content: &RawContent) -> Extracted {
    match content {
        RawContent::Text(text) => Extracted {
            text: text.clone(),
            step_type: None,
            has_tool_result: false,
        },
        RawContent::Blocks(blocks) => extract_blocks(blocks),
    }
}

fn extract_blocks(blocks: &[RawBlock]) -> Extracted {
    let mut parts = Vec::new();
    let mut step_type = None;
    let mut has_tool_result = false;

    for block in blocks {
        match block {
            RawBlock::Text { text } => {
                if !text.is_empty() {
                    parts.push(text.clone());
                }
            }
            RawBlock::ToolUse { name, input } => {
                step_type = Some(STEP_TOOL_CALL);
                parts.push(render_tool_use(name, input));
            }
            RawBlock::ToolResult { text, content } => {
                has_tool_result = true;
                let result = text
                    .clone()
                    .filter(|t| !t.is_empty())
                    .or_else(|| tool_result_text(content));
                if let Some(result) = result {
                    parts.push(result);
                }
            }
            RawBlock::Other => {}
        }
    }

    Extracted {
        text: parts.join("\n"),
        step_type,
        has_tool_result,
    }
}

fn render_tool_use(name: &str, input: &serde_json::Value) -> String {
    let mut desc = format!("[Tool: {name}]");
    if !input.is_null() {
        desc.push(' ');
        desc.push_str(&truncate_chars(&input.to_string(), TOOL_INPUT_MAX_CHARS));
    }
    desc
}

fn tool_result_text(content: &ToolResultContent) -> Option<String> {
    let text = match content {
        ToolResultContent::Absent => return None,
        ToolResultContent::Text(text) => text.clone(),
        ToolResultContent::Blocks(blocks) => blocks
            .iter()
            .filter(|b| b.kind == "text" && !b.text.is_empty())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    };
    (!text.is_empty()).then_some(text)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
