//! Browser-based OAuth flow and token refresh.
//!
//! `login` starts a short-lived HTTP server on a fixed localhost port,
//! opens the collector's authorize page in the user's browser, and waits for
//! the redirect to deliver the authorization code.

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use chrono::{Duration, Utc};
use serde::Deserialize;
use sessionwire_api_client::ApiClient;
use sessionwire_core::Config;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;

const CALLBACK_PORT: u16 = 19284;
const CALLBACK_PATH: &str = "/callback";
const LOGIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Refresh the token pair when it expires within 24 hours, persisting the
/// new tokens. A missing or unparseable expiry is left alone.
pub async fn refresh_if_needed(config: &mut Config) -> Result<()> {
    let Some(expires_at) = config.auth.expires_at else {
        return Ok(());
    };
    if expires_at - Utc::now() > Duration::hours(24) {
        return Ok(());
    }

    debug!("Access token expiring soon, refreshing");
    let client = ApiClient::from_config(config)?;
    let tokens = client.refresh_token(&config.auth.refresh_token).await?;
    config.apply_tokens(&tokens);
    config.save()
}

#[derive(Clone)]
struct CallbackState {
    outcome: Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>,
    expected_state: String,
}

#[derive(Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Run the full browser flow and return the authorization code.
pub async fn start_oauth_flow(server_url: &str) -> Result<String> {
    // Random state ties the callback to this login attempt.
    let state = uuid::Uuid::new_v4().simple().to_string();
    let (tx, rx) = oneshot::channel();

    let app = Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .with_state(CallbackState {
            outcome: Arc::new(Mutex::new(Some(tx))),
            expected_state: state.clone(),
        });

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", CALLBACK_PORT))
        .await
        .context("starting callback server")?;
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let redirect_uri = format!("http://localhost:{CALLBACK_PORT}{CALLBACK_PATH}");
    let authorize_url = format!(
        "{}/api/v1/oauth/authorize/?redirect_uri={}&state={}",
        server_url.trim_end_matches('/'),
        urlencoding::encode(&redirect_uri),
        state,
    );

    if open_browser(&authorize_url).is_err() {
        println!("Could not open browser automatically.\nPlease visit: {authorize_url}");
    }

    let outcome = tokio::time::timeout(LOGIN_TIMEOUT, rx).await;
    server.abort();

    match outcome {
        Ok(Ok(Ok(code))) => Ok(code),
        Ok(Ok(Err(reason))) => bail!("login failed: {reason}"),
        Ok(Err(_)) => bail!("callback server closed unexpectedly"),
        Err(_) => bail!("login timed out after 5 minutes"),
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let Some(tx) = state
        .outcome
        .lock()
        .expect("oauth outcome mutex poisoned")
        .take()
    else {
        return page("This login attempt has already completed.");
    };

    if let Some(error) = params.error {
        let _ = tx.send(Err(error.clone()));
        return page(&format!("Login failed: {error}. You can close this tab."));
    }

    if params.state.as_deref() != Some(state.expected_state.as_str()) {
        let _ = tx.send(Err("state mismatch".to_string()));
        return page("State mismatch. Please try again.");
    }

    match params.code {
        Some(code) => {
            let _ = tx.send(Ok(code));
            page("Login successful! You can close this tab and return to the terminal.")
        }
        None => {
            let _ = tx.send(Err("missing authorization code".to_string()));
            page("No authorization code received. Please try again.")
        }
    }
}

fn page(message: &str) -> Html<String> {
    Html(format!("<html><body><h2>{message}</h2></body></html>"))
}

fn open_browser(url: &str) -> Result<()> {
    let mut cmd = match std::env::consts::OS {
        "macos" => {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        }
        "linux" => {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
        "windows" => {
            let mut cmd = Command::new("rundll32");
            cmd.args(["url.dll,FileProtocolHandler", url]);
            cmd
        }
        os => bail!("unsupported platform {os}"),
    };
    cmd.spawn().context("launching browser")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refresh_skips_tokens_with_distant_expiry() {
        let mut config = Config::default();
        config.auth.access_token = "at".into();
        config.auth.expires_at = Some(Utc::now() + Duration::days(30));

        // No network call happens; the token is untouched.
        refresh_if_needed(&mut config).await.unwrap();
        assert_eq!(config.auth.access_token, "at");
    }

    #[tokio::test]
    async fn refresh_skips_when_no_expiry_recorded() {
        let mut config = Config::default();
        config.auth.access_token = "at".into();
        refresh_if_needed(&mut config).await.unwrap();
        assert_eq!(config.auth.access_token, "at");
    }
}
