//! Parser for Copilot Chat's turn-based JSON session files.
//!
//! A session is a single JSON document with request/response turn pairs;
//! each turn contributes up to two steps.

use crate::{ToolParser, file_stem};
use anyhow::{Context, Result};
use serde::Deserialize;
use sessionwire_core::types::{ROLE_AGENT, ROLE_USER, STEP_PROMPT, STEP_TEXT};
use sessionwire_core::{SessionCreateRequest, SessionStep};
use sessionwire_paths::TOOL_COPILOT;
use std::path::Path;

pub struct CopilotParser;

impl ToolParser for CopilotParser {
    fn name(&self) -> &'static str {
        TOOL_COPILOT
    }

    fn parse_file(&self, path: &Path) -> Result<SessionCreateRequest> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let session: RawSession = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", path.display()))?;

        let mut req = SessionCreateRequest {
            title: if session.chat_title.is_empty() {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                session.chat_title.clone()
            },
            source: TOOL_COPILOT.to_string(),
            source_session_id: file_stem(path),
            ..Default::default()
        };

        let mut order = 1u32;
        for turn in &session.turns {
            if !turn.request.message.is_empty() {
                req.steps.push(SessionStep {
                    role: ROLE_USER.to_string(),
                    step_type: STEP_PROMPT.to_string(),
                    content: turn.request.message.clone(),
                    order,
                });
                order += 1;
            }
            if !turn.response.message.is_empty() {
                req.steps.push(SessionStep {
                    role: ROLE_AGENT.to_string(),
                    step_type: STEP_TEXT.to_string(),
                    content: turn.response.message.clone(),
                    order,
                });
                order += 1;
            }
        }

        Ok(req)
    }
}

#[derive(Debug, Deserialize)]
struct RawSession {
    #[serde(rename = "chatTitle", default)]
    chat_title: String,
    #[serde(default)]
    turns: Vec<RawTurn>,
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    #[serde(default)]
    request: RawTurnMessage,
    #[serde(default)]
    response: RawTurnMessage,
}

#[derive(Debug, Default, Deserialize)]
struct RawTurnMessage {
    #[serde(default)]
    message: String,
}
