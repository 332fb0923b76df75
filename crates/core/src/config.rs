//! Client configuration persisted at `~/.config/sessionwire/config.toml`.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::TokenResponse;

const DEFAULT_SERVER_URL: &str = "https://sessionwire.io";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub username: String,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

impl Config {
    /// Load from the canonical path; a missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&sessionwire_paths::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        if config.server.url.is_empty() {
            config.server.url = default_server_url();
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&sessionwire_paths::config_path()?)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", path.display()))?;
        }
        let content = toml::to_string_pretty(self).context("serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config at {}", path.display()))
    }

    pub fn is_logged_in(&self) -> bool {
        !self.auth.access_token.is_empty()
    }

    /// Store a fresh token pair, stamping the expiry from `expires_in`.
    pub fn apply_tokens(&mut self, tokens: &TokenResponse) {
        self.auth.access_token = tokens.access_token.clone();
        self.auth.refresh_token = tokens.refresh_token.clone();
        self.auth.expires_at = Some(Utc::now() + Duration::seconds(tokens.expires_in));
    }

    pub fn clear_auth(&mut self) {
        self.auth = AuthConfig::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert!(!config.is_logged_in());
    }

    #[test]
    fn roundtrip_preserves_auth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.apply_tokens(&TokenResponse {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_type: "Bearer".into(),
            expires_in: 3600,
        });
        config.auth.username = "alice".into();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.is_logged_in());
        assert_eq!(loaded.auth.access_token, "at");
        assert_eq!(loaded.auth.username, "alice");
        assert!(loaded.auth.expires_at.is_some());
    }

    #[test]
    fn clear_auth_logs_out() {
        let mut config = Config::default();
        config.auth.access_token = "at".into();
        config.auth.username = "alice".into();
        config.clear_auth();
        assert!(!config.is_logged_in());
        assert!(config.auth.username.is_empty());
    }
}
