use anyhow::Result;
use sessionwire_core::Config;
use sessionwire_paths::detect_sources;
use sessionwire_sync::{Ledger, RetryQueue};

pub fn run_status() -> Result<()> {
    let config = Config::load()?;

    println!("=== Authentication ===");
    if config.is_logged_in() {
        println!("  Logged in as: {}", config.auth.username);
        println!("  Server: {}", config.server.url);
        if let Some(expires_at) = config.auth.expires_at {
            println!("  Token expires: {}", expires_at.format("%Y-%m-%d %H:%M"));
        }
    } else {
        println!("  Not logged in. Run 'sessionwire login' to authenticate.");
    }

    println!("\n=== Detected Sources ===");
    let sources = detect_sources();
    if sources.is_empty() {
        println!("  No AI tool session directories found.");
    }
    for source in &sources {
        println!("  {}: {}", source.tool, source.dir.display());
    }

    println!("\n=== Upload History ===");
    match sessionwire_paths::ledger_path().and_then(|path| Ledger::load(&path)) {
        Ok(ledger) => println!("  Sessions uploaded: {}", ledger.len()),
        Err(e) => println!("  Could not load upload ledger: {e:#}"),
    }

    println!("\n=== Retry Queue ===");
    match RetryQueue::open().and_then(|queue| queue.count()) {
        Ok(count) => println!("  Pending retries: {count}"),
        Err(e) => println!("  Could not open retry queue: {e:#}"),
    }

    Ok(())
}
