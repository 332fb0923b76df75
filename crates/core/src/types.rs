//! Wire types shared between the parsers, the sync engine, and the API client.
//!
//! Field names and nesting are the contract with the collector; changing them
//! breaks compatibility with deployed servers.

use serde::{Deserialize, Serialize};

/// Step roles as they appear on the wire.
pub const ROLE_USER: &str = "user";
pub const ROLE_AGENT: &str = "agent";
pub const ROLE_SYSTEM: &str = "system";

/// Step types as they appear on the wire.
pub const STEP_PROMPT: &str = "prompt";
pub const STEP_TEXT: &str = "text";
pub const STEP_TOOL_CALL: &str = "tool_call";

/// One normalized unit of conversation.
///
/// Within a session, `order` is a strictly increasing sequence starting at 1
/// with no gaps, assigned in file-traversal order. That sequence is the only
/// ordering guarantee sessionwire makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStep {
    pub role: String,
    pub step_type: String,
    pub content: String,
    pub order: u32,
}

/// Payload for `POST /api/v1/sessions/`.
///
/// `source_session_id` is the idempotency key the collector uses to merge or
/// reject duplicate submissions; deriving it must be deterministic for a
/// given input file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCreateRequest {
    pub title: String,
    pub source: String,
    pub source_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<i64>,
    pub steps: Vec<SessionStep>,
}

/// Returned from the session endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_session_id: String,
    #[serde(default)]
    pub uploaded_at: String,
}

/// Returned from `POST /api/v1/oauth/token/` for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: i64,
}

/// Returned from `GET /api/v1/me/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Error body the collector sends with 4xx/5xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
}
