//! The `watch` command: wire the watcher, debouncer, engine, and retry
//! drain together and run until interrupted.

use anyhow::{Context, Result, bail};
use sessionwire_api_client::ApiClient;
use sessionwire_core::{Config, SessionCreateRequest};
use sessionwire_paths::detect_sources;
use sessionwire_sync::{
    Ledger, QUIESCENCE_WINDOW, QuiescenceTracker, RetryQueue, SyncEngine, Uploader, run_retry_loop,
    start_watcher,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::auth;

/// Adapter handing engine deliveries to the HTTP client.
struct ApiUploader {
    client: ApiClient,
}

impl Uploader for ApiUploader {
    async fn upload(&self, req: &SessionCreateRequest) -> Result<String> {
        let resp = self.client.create_session(req).await?;
        Ok(resp.id)
    }

    async fn upload_raw(&self, path: &Path, tool: &str) -> Result<String> {
        let resp = self.client.upload_file(path, tool).await?;
        Ok(resp.id)
    }
}

pub async fn run_watch() -> Result<()> {
    let mut config = Config::load()?;
    if !config.is_logged_in() {
        bail!("not logged in — run 'sessionwire login' first");
    }
    if let Err(e) = auth::refresh_if_needed(&mut config).await {
        println!("Warning: token refresh failed: {e:#}");
    }

    let ledger = Ledger::load(&sessionwire_paths::ledger_path()?)
        .context("loading upload ledger")?;

    // The queue must open or the durability guarantee is gone; this is the
    // one fatal startup error.
    let queue = Arc::new(RetryQueue::open().context("opening retry queue")?);

    let sources = detect_sources();
    if sources.is_empty() {
        bail!("no AI tool session directories found");
    }

    println!("Watching for session changes:");
    for source in &sources {
        println!("  {}: {}", source.tool, source.dir.display());
    }

    let uploader = ApiUploader {
        client: ApiClient::from_config(&config)?,
    };
    let engine = Arc::new(SyncEngine::new(ledger, Arc::clone(&queue), uploader));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let _watcher = start_watcher(&sources, event_tx).context("creating watcher")?;

    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
    let debouncer = QuiescenceTracker::new(QUIESCENCE_WINDOW, ready_tx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Raw change events reset the per-file countdown.
    let feeder = debouncer.clone();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            feeder.touch(&event.path, &event.tool);
        }
    });

    // Quiescent files go through the orchestration path.
    let ready_engine = Arc::clone(&engine);
    tokio::spawn(async move {
        while let Some(ready) = ready_rx.recv().await {
            ready_engine.handle_file_ready(&ready.path, &ready.tool).await;
        }
    });

    // Failed uploads are redriven in the background.
    tokio::spawn(run_retry_loop(Arc::clone(&engine), shutdown_rx));

    println!("\nWatching... Press Ctrl+C to stop.");
    wait_for_shutdown().await;

    println!("\nStopping watcher...");
    let _ = shutdown_tx.send(true);
    // Pending timers are cancelled without firing; files still mid-write are
    // picked up on the next launch when they change again.
    debouncer.stop();

    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to register Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
