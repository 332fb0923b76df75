//! The orchestration path tying quiescence signals to the collector.
//!
//! One engine instance is shared by the debounce completion loop and the
//! retry drain loop. Normalization is best-effort: a parser failure falls
//! back to an opaque raw-file upload. Delivery is not best-effort: an upload
//! failure lands the file in the persistent retry queue.

use anyhow::Result;
use chrono::Utc;
use sessionwire_core::SessionCreateRequest;
use sessionwire_parsers::parser_for_tool;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ledger::{Ledger, hash_bytes};
use crate::queue::{MAX_ATTEMPTS, RetryOutcome, RetryQueue};

/// How often the drain loop checks for due retry items.
pub const RETRY_TICK: Duration = Duration::from_secs(60);

/// The collector interface the engine delivers through.
///
/// Both calls perform authenticated network I/O and return the collector's
/// session id. Idempotency is the collector's concern, keyed by
/// `source_session_id`.
pub trait Uploader: Send + Sync {
    /// Deliver a normalized session.
    fn upload(
        &self,
        req: &SessionCreateRequest,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Deliver a raw file the collector will ingest opaquely.
    fn upload_raw(&self, path: &Path, tool: &str) -> impl Future<Output = Result<String>> + Send;
}

pub struct SyncEngine<U> {
    ledger: Mutex<Ledger>,
    queue: Arc<RetryQueue>,
    uploader: U,
}

impl<U: Uploader> SyncEngine<U> {
    pub fn new(ledger: Ledger, queue: Arc<RetryQueue>, uploader: U) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            queue,
            uploader,
        }
    }

    /// React to a quiescent file: hash, dedup, deliver, and on failure hand
    /// the pair to the retry queue.
    pub async fn handle_file_ready(&self, path: &Path, tool: &str) {
        // Unreadable files are skipped for this cycle; no upload was
        // attempted, so no retry is scheduled either.
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not read {}: {e}", path.display());
                return;
            }
        };

        let hash = hash_bytes(&data);
        if self.ledger.lock().expect("ledger mutex poisoned").has_hash(&hash) {
            debug!("Skipping already-uploaded content: {}", path.display());
            return;
        }

        info!("Session ready: {} ({tool})", path.display());
        match self.upload_path(path, tool).await {
            Ok(session_id) => {
                info!("Uploaded {} as session {session_id}", path.display());
                self.mark_uploaded(&hash);
            }
            Err(e) => {
                warn!("Upload failed for {}, queuing for retry: {e:#}", path.display());
                if let Err(e) = self.queue.add(path, tool) {
                    error!("Could not queue {} for retry: {e:#}", path.display());
                }
            }
        }
    }

    /// Deliver one file through the parser registry, falling back to a raw
    /// upload when no parser matches or normalization yields nothing.
    pub async fn upload_path(&self, path: &Path, tool: &str) -> Result<String> {
        if let Some(parser) = parser_for_tool(tool) {
            match parser.parse_file(path) {
                Ok(req) if !req.steps.is_empty() => {
                    return self.uploader.upload(&req).await;
                }
                Ok(_) => {
                    warn!(
                        "Parsed no steps from {}, falling back to raw upload",
                        path.display()
                    );
                }
                Err(e) => {
                    warn!(
                        "Structured parse failed for {}, falling back to raw upload: {e:#}",
                        path.display()
                    );
                }
            }
        }
        self.uploader.upload_raw(path, tool).await
    }

    /// Run one drain pass: redeliver every due retry item through the same
    /// upload path live traffic uses.
    pub async fn drain_due(&self) {
        let due = match self.queue.due_items(Utc::now()) {
            Ok(items) => items,
            Err(e) => {
                error!("Could not read retry queue: {e:#}");
                return;
            }
        };

        for item in due {
            let path = Path::new(&item.file_path);
            match self.upload_path(path, &item.tool).await {
                Ok(session_id) => {
                    info!(
                        "Retry succeeded for {} (attempt {}): session {session_id}",
                        item.file_path,
                        item.attempts + 1
                    );
                    if let Err(e) = self.queue.remove(&item.file_path) {
                        error!("Could not remove retried item {}: {e:#}", item.file_path);
                    }
                    if let Ok(data) = std::fs::read(path) {
                        self.mark_uploaded(&hash_bytes(&data));
                    }
                }
                Err(e) => match self.queue.record_failure(&item, Utc::now()) {
                    Ok(RetryOutcome::GaveUp) => {
                        warn!(
                            "Giving up on {} after {MAX_ATTEMPTS} attempts: {e:#}",
                            item.file_path
                        );
                    }
                    Ok(RetryOutcome::Rescheduled) => {
                        debug!(
                            "Retry {} failed for {}, rescheduled: {e:#}",
                            item.attempts + 1,
                            item.file_path
                        );
                    }
                    Err(store_err) => {
                        error!(
                            "Could not update retry state for {}: {store_err:#}",
                            item.file_path
                        );
                    }
                },
            }
        }
    }

    fn mark_uploaded(&self, hash: &str) {
        let mut ledger = self.ledger.lock().expect("ledger mutex poisoned");
        ledger.add_hash(hash.to_string());
        if let Err(e) = ledger.save() {
            warn!("Could not save upload ledger: {e:#}");
        }
    }

    /// Number of recorded uploads, for status reporting.
    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().expect("ledger mutex poisoned").len()
    }
}

/// Periodically drain the retry queue until shutdown is signalled.
pub async fn run_retry_loop<U: Uploader>(
    engine: Arc<SyncEngine<U>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(RETRY_TICK);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                engine.drain_due().await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("Retry loop shutting down");
                    break;
                }
            }
        }
    }
}
