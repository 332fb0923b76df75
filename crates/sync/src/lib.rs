pub mod debounce;
pub mod engine;
pub mod ledger;
pub mod queue;
pub mod watcher;

pub use debounce::{QUIESCENCE_WINDOW, QuiescenceTracker, SessionReady};
pub use engine::{SyncEngine, Uploader, run_retry_loop};
pub use ledger::Ledger;
pub use queue::{RetryItem, RetryQueue};
pub use watcher::{WatchEvent, start_watcher};
