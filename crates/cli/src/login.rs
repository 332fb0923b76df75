use anyhow::{Context, Result};
use sessionwire_api_client::ApiClient;
use sessionwire_core::Config;

use crate::auth;

pub async fn run_login() -> Result<()> {
    let mut config = Config::load()?;

    if config.is_logged_in() {
        println!(
            "Already logged in as {}. Use 'sessionwire logout' first.",
            config.auth.username
        );
        return Ok(());
    }

    println!("Opening browser for login...");
    let code = auth::start_oauth_flow(&config.server.url).await?;

    println!("Exchanging code for token...");
    let client = ApiClient::from_config(&config)?;
    let tokens = client
        .exchange_token(&code)
        .await
        .context("token exchange failed")?;
    config.apply_tokens(&tokens);

    // Best effort: a failed lookup still leaves us logged in.
    let authed = ApiClient::from_config(&config)?;
    if let Ok(user) = authed.me().await {
        config.auth.username = user.username;
    }

    config.save()?;
    println!("Logged in as {}", config.auth.username);
    Ok(())
}
