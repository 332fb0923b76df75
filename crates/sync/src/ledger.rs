//! Persisted record of content hashes already delivered to the collector.
//!
//! The ledger is loaded fully into memory at startup and rewritten wholesale
//! on every addition. Hashes are computed over the raw file bytes at the
//! moment quiescence fired, never over parsed output, so two byte-identical
//! files count as the same session even across tools. Entries are never
//! pruned.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    hashes: HashMap<String, DateTime<Utc>>,
}

/// The dedup ledger and the file backing it.
pub struct Ledger {
    path: PathBuf,
    hashes: HashMap<String, DateTime<Utc>>,
}

impl Ledger {
    /// Load the ledger at `path`; a missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        let hashes = match std::fs::read_to_string(path) {
            Ok(content) => {
                let file: LedgerFile = serde_json::from_str(&content)
                    .with_context(|| format!("parsing ledger at {}", path.display()))?;
                file.hashes
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading ledger at {}", path.display()));
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            hashes,
        })
    }

    pub fn has_hash(&self, hash: &str) -> bool {
        self.hashes.contains_key(hash)
    }

    /// Record a hash with the current time. Idempotent: an existing entry
    /// keeps its original timestamp.
    pub fn add_hash(&mut self, hash: String) {
        self.hashes.entry(hash).or_insert_with(Utc::now);
    }

    /// Rewrite the backing file with the full map.
    ///
    /// A failure here leaves the file at its last-saved state; the caller
    /// logs and carries on, since a stale ledger only risks a duplicate
    /// upload, never loss.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", self.path.display()))?;
        }
        let file = LedgerFile {
            hashes: self.hashes.clone(),
        };
        let content = serde_json::to_string_pretty(&file).context("serialize ledger")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing ledger at {}", self.path.display()))
    }

    /// Number of recorded uploads, for status reporting.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// SHA-256 of the full byte content, lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("uploaded.json")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn add_save_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploaded.json");

        let mut ledger = Ledger::load(&path).unwrap();
        let hash = hash_bytes(b"session bytes");
        ledger.add_hash(hash.clone());
        ledger.save().unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        assert!(reloaded.has_hash(&hash));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn add_hash_is_idempotent_and_keeps_first_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(&dir.path().join("uploaded.json")).unwrap();

        let hash = hash_bytes(b"abc");
        ledger.add_hash(hash.clone());
        let first = *ledger.hashes.get(&hash).unwrap();
        ledger.add_hash(hash.clone());
        assert_eq!(ledger.len(), 1);
        assert_eq!(*ledger.hashes.get(&hash).unwrap(), first);
    }

    #[test]
    fn hash_bytes_is_stable_sha256() {
        // Well-known digest of the empty input.
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }

    #[test]
    fn malformed_ledger_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploaded.json");
        std::fs::write(&path, "{broken").unwrap();
        assert!(Ledger::load(&path).is_err());
    }
}
