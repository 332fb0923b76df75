use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use sessionwire_core::{
    Config, ErrorResponse, SessionCreateRequest, SessionResponse, TokenResponse, UserResponse,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Typed HTTP client for the sessionwire collector API.
///
/// Token endpoints are unauthenticated; everything else sends the stored
/// bearer token.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Build a client from the persisted config, adopting its token if set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = Self::new(&config.server.url, DEFAULT_TIMEOUT)?;
        if !config.auth.access_token.is_empty() {
            client.set_auth(config.auth.access_token.clone());
        }
        Ok(client)
    }

    pub fn set_auth(&mut self, token: String) {
        self.token = Some(token);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn token_or_bail(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("auth token not set"))
    }

    // ── OAuth ─────────────────────────────────────────────────────────────

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_token(&self, code: &str) -> Result<TokenResponse> {
        self.post_json(
            "/oauth/token/",
            &TokenGrant {
                grant_type: "authorization_code",
                code: Some(code),
                refresh_token: None,
            },
        )
        .await
    }

    /// Refresh an expiring token pair.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.post_json(
            "/oauth/token/",
            &TokenGrant {
                grant_type: "refresh_token",
                code: None,
                refresh_token: Some(refresh_token),
            },
        )
        .await
    }

    /// Revoke the current token server-side.
    pub async fn revoke_token(&self) -> Result<()> {
        let token = self.token_or_bail()?;
        let resp = self
            .client
            .post(self.url("/oauth/revoke/"))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("request failed")?;
        check_status(resp).await.map(|_| ())
    }

    /// Fetch the authenticated user.
    pub async fn me(&self) -> Result<UserResponse> {
        let token = self.token_or_bail()?;
        let resp = self
            .client
            .get(self.url("/me/"))
            .bearer_auth(token)
            .send()
            .await
            .context("request failed")?;
        parse_response(resp).await
    }

    // ── Sessions ──────────────────────────────────────────────────────────

    /// Create a session from a normalized step sequence.
    pub async fn create_session(&self, req: &SessionCreateRequest) -> Result<SessionResponse> {
        let token = self.token_or_bail()?;
        let resp = self
            .client
            .post(self.url("/sessions/"))
            .bearer_auth(token)
            .json(req)
            .send()
            .await
            .context("request failed")?;
        parse_response(resp).await
    }

    /// Upload a raw session file the collector will ingest opaquely.
    pub async fn upload_file(&self, path: &Path, source: &str) -> Result<SessionResponse> {
        let token = self.token_or_bail()?;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".to_string());

        let mut form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        if !source.is_empty() {
            form = form.text("source", source.to_string());
        }

        let resp = self
            .client
            .post(self.url("/sessions/upload/"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .context("upload failed")?;
        parse_response(resp).await
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .context("request failed")?;
        parse_response(resp).await
    }
}

#[derive(Serialize)]
struct TokenGrant<'a> {
    grant_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
        if !err.error.is_empty() {
            bail!("API error ({status}): {}", err.error);
        }
    }
    bail!("API error ({status}): {body}");
}

async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let resp = check_status(resp).await?;
    resp.json().await.context("decoding response")
}
