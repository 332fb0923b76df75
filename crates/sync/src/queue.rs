//! Crash-safe retry queue for failed uploads.
//!
//! Backed by a single SQLite table keyed by absolute file path, so a file
//! that fails twice overwrites its own pending entry instead of duplicating.
//! The database is opened exclusively; a second process hitting the bounded
//! lock timeout is reported as "already running" rather than silently
//! sharing the queue.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Attempt ceiling; reaching it deletes the item for good.
pub const MAX_ATTEMPTS: u32 = 10;

/// Fixed backoff table indexed by attempt count; counts past the end repeat
/// the final interval.
const BACKOFF_SCHEDULE_SECS: [i64; 5] = [
    5 * 60,       // 5 minutes
    15 * 60,      // 15 minutes
    60 * 60,      // 1 hour
    6 * 60 * 60,  // 6 hours
    24 * 60 * 60, // 24 hours
];

const SCHEMA: &str = "BEGIN EXCLUSIVE;
CREATE TABLE IF NOT EXISTS retry_items (
    file_path     TEXT PRIMARY KEY,
    tool          TEXT NOT NULL,
    attempts      INTEGER NOT NULL,
    next_retry_at TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
COMMIT;";

/// One pending redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryItem {
    pub file_path: String,
    pub tool: String,
    pub attempts: u32,
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// What `record_failure` did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Rescheduled with the next backoff interval.
    Rescheduled,
    /// Attempt ceiling reached; the item was deleted and will never retry.
    GaveUp,
}

pub fn backoff_for_attempts(attempts: u32) -> Duration {
    let idx = (attempts as usize).min(BACKOFF_SCHEDULE_SECS.len() - 1);
    Duration::seconds(BACKOFF_SCHEDULE_SECS[idx])
}

/// The persistent queue. Thread-safe: wraps the connection in a `Mutex` so
/// it can be shared via `Arc<RetryQueue>` between the watch path and the
/// drain loop.
pub struct RetryQueue {
    conn: Mutex<Connection>,
}

impl RetryQueue {
    /// Open (or create) the queue at the default path.
    pub fn open() -> Result<Self> {
        Self::open_path(&sessionwire_paths::retry_db_path()?)
    }

    /// Open (or create) the queue at a specific path, exclusively.
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", path.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open retry db {}", path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(1))?;
        // Exclusive lock: one process owns the queue. The pragma returns the
        // new mode as a row, so it must be read, not executed. The write
        // transaction right after takes the lock eagerly; in exclusive mode
        // it is then held until the connection closes.
        conn.query_row("PRAGMA locking_mode = EXCLUSIVE", [], |_| Ok(()))?;
        conn.execute_batch(SCHEMA).with_context(|| {
            format!(
                "retry queue at {} is locked by another process (is another 'sessionwire watch' running?)",
                path.display()
            )
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("retry queue mutex poisoned")
    }

    /// Queue a fresh item for `path`. Re-adding an already-queued path
    /// overwrites the pending entry, resetting its attempt count.
    pub fn add(&self, path: &Path, tool: &str) -> Result<()> {
        let now = Utc::now();
        let next = now + backoff_for_attempts(0);
        self.conn().execute(
            "INSERT INTO retry_items (file_path, tool, attempts, next_retry_at, created_at) \
             VALUES (?1, ?2, 0, ?3, ?4) \
             ON CONFLICT(file_path) DO UPDATE SET \
              tool=excluded.tool, attempts=excluded.attempts, \
              next_retry_at=excluded.next_retry_at, created_at=excluded.created_at",
            params![
                path.to_string_lossy(),
                tool,
                next.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Items whose `next_retry_at` has passed.
    pub fn due_items(&self, now: DateTime<Utc>) -> Result<Vec<RetryItem>> {
        Ok(self
            .all_items()?
            .into_iter()
            .filter(|item| item.next_retry_at <= now)
            .collect())
    }

    /// Look up a single item by path.
    pub fn get(&self, file_path: &str) -> Result<Option<RetryItem>> {
        Ok(self
            .all_items()?
            .into_iter()
            .find(|item| item.file_path == file_path))
    }

    fn all_items(&self) -> Result<Vec<RetryItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT file_path, tool, attempts, next_retry_at, created_at FROM retry_items",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (file_path, tool, attempts, next_retry_at, created_at) = row?;
            let (Some(next_retry_at), Some(created_at)) =
                (parse_timestamp(&next_retry_at), parse_timestamp(&created_at))
            else {
                warn!("Dropping retry item with unreadable timestamps: {file_path}");
                continue;
            };
            items.push(RetryItem {
                file_path,
                tool,
                attempts,
                next_retry_at,
                created_at,
            });
        }
        Ok(items)
    }

    /// Record a failed redelivery: bump the attempt count and either
    /// reschedule from the backoff table or give up for good.
    pub fn record_failure(&self, item: &RetryItem, now: DateTime<Utc>) -> Result<RetryOutcome> {
        let attempts = item.attempts + 1;
        if attempts >= MAX_ATTEMPTS {
            self.remove(&item.file_path)?;
            return Ok(RetryOutcome::GaveUp);
        }

        let next = now + backoff_for_attempts(attempts);
        self.conn().execute(
            "UPDATE retry_items SET attempts = ?1, next_retry_at = ?2 WHERE file_path = ?3",
            params![attempts, next.to_rfc3339(), item.file_path],
        )?;
        Ok(RetryOutcome::Rescheduled)
    }

    pub fn remove(&self, file_path: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM retry_items WHERE file_path = ?1", params![file_path])?;
        Ok(())
    }

    /// Test hook: make an item due at a chosen instant.
    #[cfg(test)]
    pub(crate) fn set_next_retry_at(&self, file_path: &str, when: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE retry_items SET next_retry_at = ?1 WHERE file_path = ?2",
            params![when.to_rfc3339(), file_path],
        )?;
        Ok(())
    }

    /// Number of pending items, for status reporting.
    pub fn count(&self) -> Result<u64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM retry_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_queue(dir: &tempfile::TempDir) -> RetryQueue {
        RetryQueue::open_path(&dir.path().join("retry.db")).unwrap()
    }

    #[test]
    fn fresh_item_waits_the_first_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(&dir);
        queue.add(Path::new("/tmp/a.jsonl"), "claudecode").unwrap();

        let item = queue.get("/tmp/a.jsonl").unwrap().unwrap();
        assert_eq!(item.attempts, 0);
        assert_eq!(item.tool, "claudecode");
        assert_eq!(item.next_retry_at - item.created_at, Duration::minutes(5));
    }

    #[test]
    fn readding_overwrites_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(&dir);
        let path = Path::new("/tmp/a.jsonl");

        queue.add(path, "claudecode").unwrap();
        let item = queue.get("/tmp/a.jsonl").unwrap().unwrap();
        queue.record_failure(&item, Utc::now()).unwrap();
        assert_eq!(queue.get("/tmp/a.jsonl").unwrap().unwrap().attempts, 1);

        // A new live failure for the same file starts the item over.
        queue.add(path, "claudecode").unwrap();
        assert_eq!(queue.count().unwrap(), 1);
        assert_eq!(queue.get("/tmp/a.jsonl").unwrap().unwrap().attempts, 0);
    }

    #[test]
    fn due_items_respect_next_retry_at() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(&dir);
        queue.add(Path::new("/tmp/a.jsonl"), "claudecode").unwrap();

        let now = Utc::now();
        assert!(queue.due_items(now).unwrap().is_empty());
        let later = now + Duration::minutes(6);
        assert_eq!(queue.due_items(later).unwrap().len(), 1);
    }

    #[test]
    fn backoff_schedule_clamps_to_final_interval() {
        let expected_minutes = [5, 15, 60, 360, 1440, 1440, 1440];
        for (attempts, minutes) in expected_minutes.into_iter().enumerate() {
            assert_eq!(
                backoff_for_attempts(attempts as u32),
                Duration::minutes(minutes),
                "attempt {attempts}"
            );
        }
    }

    #[test]
    fn repeated_failures_walk_the_schedule_then_give_up() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(&dir);
        let path = Path::new("/tmp/flaky.jsonl");
        queue.add(path, "claudecode").unwrap();

        let now = Utc::now();
        let expected_minutes = [15, 60, 360, 1440, 1440, 1440, 1440, 1440, 1440];
        for (i, minutes) in expected_minutes.into_iter().enumerate() {
            let item = queue.get("/tmp/flaky.jsonl").unwrap().unwrap();
            let outcome = queue.record_failure(&item, now).unwrap();
            assert_eq!(outcome, RetryOutcome::Rescheduled, "failure {}", i + 1);

            let updated = queue.get("/tmp/flaky.jsonl").unwrap().unwrap();
            assert_eq!(updated.attempts, (i + 1) as u32);
            assert_eq!(
                updated.next_retry_at - now,
                Duration::minutes(minutes),
                "failure {}",
                i + 1
            );
        }

        // Tenth failure deletes the item unconditionally.
        let item = queue.get("/tmp/flaky.jsonl").unwrap().unwrap();
        assert_eq!(item.attempts, 9);
        let outcome = queue.record_failure(&item, now).unwrap();
        assert_eq!(outcome, RetryOutcome::GaveUp);
        assert_eq!(queue.count().unwrap(), 0);
        assert!(queue.get("/tmp/flaky.jsonl").unwrap().is_none());
    }

    #[test]
    fn queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("retry.db");

        {
            let queue = RetryQueue::open_path(&db_path).unwrap();
            queue.add(Path::new("/tmp/a.jsonl"), "claudecode").unwrap();
            queue.add(Path::new("/tmp/b.json"), "copilot").unwrap();
        }

        let queue = RetryQueue::open_path(&db_path).unwrap();
        assert_eq!(queue.count().unwrap(), 2);
        let item = queue.get("/tmp/b.json").unwrap().unwrap();
        assert_eq!(item.tool, "copilot");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(&dir);
        queue.add(Path::new("/tmp/a.jsonl"), "claudecode").unwrap();
        queue.remove("/tmp/a.jsonl").unwrap();
        queue.remove("/tmp/a.jsonl").unwrap();
        assert_eq!(queue.count().unwrap(), 0);
    }
}
