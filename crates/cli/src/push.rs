use anyhow::{Context, Result, bail};
use sessionwire_api_client::ApiClient;
use sessionwire_core::Config;
use sessionwire_paths::{TOOL_CLAUDE_CODE, TOOL_COPILOT, TOOL_CURSOR, TOOL_WINDSURF};
use std::path::Path;

use crate::auth;

pub async fn run_push(file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("File not found: {}", file.display());
    }

    let mut config = Config::load()?;
    if !config.is_logged_in() {
        bail!("not logged in — run 'sessionwire login' first");
    }
    if let Err(e) = auth::refresh_if_needed(&mut config).await {
        println!("Warning: token refresh failed: {e:#}");
    }

    let source = detect_source(file);
    println!(
        "Uploading {} (source: {source})...",
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    let client = ApiClient::from_config(&config)?;
    let resp = client
        .upload_file(file, source)
        .await
        .context("upload failed")?;

    println!("Session created: {}", resp.id);
    println!("Title: {}", resp.title);
    println!("View at: {}/session/{}/", config.server.url, resp.id);
    Ok(())
}

/// Best-effort source hint from the extension or filename.
fn detect_source(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if ext == "jsonl" {
        TOOL_CLAUDE_CODE
    } else if name.contains("cursor") || name == "state.vscdb" {
        TOOL_CURSOR
    } else if name.contains("windsurf") {
        TOOL_WINDSURF
    } else if name.contains("copilot") {
        TOOL_COPILOT
    } else {
        "upload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_detection_prefers_extension_then_filename() {
        assert_eq!(detect_source(Path::new("/a/sess.jsonl")), "claudecode");
        assert_eq!(detect_source(Path::new("/a/state.vscdb")), "cursor");
        assert_eq!(detect_source(Path::new("/a/cursor-export.json")), "cursor");
        assert_eq!(detect_source(Path::new("/a/windsurf-chat.db")), "windsurf");
        assert_eq!(detect_source(Path::new("/a/copilot-chat.json")), "copilot");
        assert_eq!(detect_source(Path::new("/a/transcript.md")), "upload");
    }
}
