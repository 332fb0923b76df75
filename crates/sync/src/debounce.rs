//! Per-file quiescence detection.
//!
//! AI tool writers append events continuously while a session is live; no
//! format gives an explicit close signal. A file is treated as done once it
//! has received no writes for the quiescence window. Every touch supersedes
//! the previous timer, so bursts during active generation coalesce into a
//! single completion fired one window after the last write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Default idle window after which a file counts as quiescent.
pub const QUIESCENCE_WINDOW: Duration = Duration::from_secs(60);

/// Completion signal: `path` stopped changing while attributed to `tool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReady {
    pub path: PathBuf,
    pub tool: String,
}

struct Pending {
    /// Bumped on every touch; a sleeping timer only fires if its generation
    /// is still current when it wakes.
    generation: u64,
    tool: String,
}

/// Tracks one pending timer per file path.
///
/// Completions are delivered through the channel handed to [`new`], never
/// invoked while the internal lock is held, so receivers are free to call
/// back into the tracker. Timers for different files may complete
/// concurrently.
#[derive(Clone)]
pub struct QuiescenceTracker {
    pending: Arc<Mutex<HashMap<PathBuf, Pending>>>,
    window: Duration,
    tx: mpsc::UnboundedSender<SessionReady>,
}

impl QuiescenceTracker {
    pub fn new(window: Duration, tx: mpsc::UnboundedSender<SessionReady>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            window,
            tx,
        }
    }

    /// Reset the countdown for a file, recording its owning tool.
    pub fn touch(&self, path: &Path, tool: &str) {
        let generation = {
            let mut pending = self.pending.lock().expect("debounce mutex poisoned");
            let entry = pending.entry(path.to_path_buf()).or_insert(Pending {
                generation: 0,
                tool: tool.to_string(),
            });
            entry.generation += 1;
            entry.tool = tool.to_string();
            entry.generation
        };

        let pending = Arc::clone(&self.pending);
        let tx = self.tx.clone();
        let window = self.window;
        let path = path.to_path_buf();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;

            let ready = {
                let mut map = pending.lock().expect("debounce mutex poisoned");
                match map.get(&path) {
                    Some(entry) if entry.generation == generation => {
                        let tool = entry.tool.clone();
                        map.remove(&path);
                        Some(SessionReady { path, tool })
                    }
                    // Superseded by a later touch or cancelled by stop().
                    _ => None,
                }
            };

            if let Some(ready) = ready {
                let _ = tx.send(ready);
            }
        });
    }

    /// Cancel every pending timer without firing. Used at shutdown so a
    /// torn-down watcher cannot produce spurious uploads.
    pub fn stop(&self) {
        self.pending
            .lock()
            .expect("debounce mutex poisoned")
            .clear();
    }

    /// Number of files currently under debounce.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("debounce mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    fn tracker() -> (QuiescenceTracker, mpsc::UnboundedReceiver<SessionReady>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (QuiescenceTracker::new(Duration::from_secs(60), tx), rx)
    }

    /// Touch and let the spawned timer task register its sleep before the
    /// test clock advances.
    async fn touch(tracker: &QuiescenceTracker, path: &Path, tool: &str) {
        tracker.touch(path, tool);
        tokio::task::yield_now().await;
    }

    async fn assert_no_signal(rx: &mut mpsc::UnboundedReceiver<SessionReady>) {
        assert!(
            timeout(Duration::from_millis(1), rx.recv()).await.is_err(),
            "no completion expected yet"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_the_window() {
        let (tracker, mut rx) = tracker();
        touch(&tracker, Path::new("/tmp/a.jsonl"), "claudecode").await;

        advance(Duration::from_secs(59)).await;
        assert_no_signal(&mut rx).await;

        advance(Duration::from_secs(2)).await;
        let ready = rx.recv().await.unwrap();
        assert_eq!(ready.path, Path::new("/tmp/a.jsonl"));
        assert_eq!(ready.tool, "claudecode");
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn touches_coalesce_and_fire_relative_to_the_last() {
        let (tracker, mut rx) = tracker();
        let path = Path::new("/tmp/burst.jsonl");

        // Touch at t=0, t=10, t=20; the window restarts each time.
        touch(&tracker, path, "claudecode").await;
        advance(Duration::from_secs(10)).await;
        touch(&tracker, path, "claudecode").await;
        advance(Duration::from_secs(10)).await;
        touch(&tracker, path, "claudecode").await;

        // t=60 would be one window past the FIRST touch; nothing yet.
        advance(Duration::from_secs(40)).await;
        assert_no_signal(&mut rx).await;

        // t=80: one window past the last touch.
        advance(Duration::from_secs(21)).await;
        let ready = rx.recv().await.unwrap();
        assert_eq!(ready.path, path);

        // Exactly one completion for the whole burst.
        advance(Duration::from_secs(120)).await;
        assert_no_signal(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn different_files_complete_independently() {
        let (tracker, mut rx) = tracker();
        touch(&tracker, Path::new("/tmp/a.jsonl"), "claudecode").await;
        advance(Duration::from_secs(30)).await;
        touch(&tracker, Path::new("/tmp/state.vscdb"), "cursor").await;

        advance(Duration::from_secs(31)).await;
        assert_eq!(rx.recv().await.unwrap().tool, "claudecode");
        advance(Duration::from_secs(30)).await;
        assert_eq!(rx.recv().await.unwrap().tool, "cursor");
    }

    #[tokio::test(start_paused = true)]
    async fn last_touch_wins_for_tool_attribution() {
        let (tracker, mut rx) = tracker();
        let path = Path::new("/tmp/state.vscdb");
        touch(&tracker, path, "cursor").await;
        advance(Duration::from_secs(5)).await;
        touch(&tracker, path, "windsurf").await;

        advance(Duration::from_secs(61)).await;
        assert_eq!(rx.recv().await.unwrap().tool, "windsurf");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_without_firing() {
        let (tracker, mut rx) = tracker();
        touch(&tracker, Path::new("/tmp/a.jsonl"), "claudecode").await;
        touch(&tracker, Path::new("/tmp/b.jsonl"), "claudecode").await;
        assert_eq!(tracker.pending_count(), 2);

        tracker.stop();
        assert_eq!(tracker.pending_count(), 0);

        advance(Duration::from_secs(120)).await;
        assert_no_signal(&mut rx).await;
    }
}
