use anyhow::{Context, Result};
use sessionwire_api_client::ApiClient;
use sessionwire_core::Config;

pub async fn run_logout() -> Result<()> {
    let mut config = Config::load()?;

    if !config.is_logged_in() {
        println!("Not currently logged in.");
        return Ok(());
    }

    // Revoke server-side first, but don't let a dead server trap the user
    // in a logged-in state.
    let client = ApiClient::from_config(&config)?;
    if let Err(e) = client.revoke_token().await {
        println!("Warning: could not revoke token server-side: {e:#}");
    }

    config.clear_auth();
    config.save().context("saving config")?;

    println!("Logged out successfully.");
    Ok(())
}
