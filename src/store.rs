//! Content-addressed durable storage for index artifacts.
//!
//! Each canonicalized URL maps to a fixed-length [`ContentKey`] (SHA-256 of
//! the canonical form), and each key maps to at most one artifact file under
//! the storage root. Writes are atomic (write-to-temp-then-rename), so a crash
//! mid-write never leaves a readable-but-corrupt entry.
//!
//! An existing artifact is authoritative for its key: the store never
//! re-validates it against the live page. Staleness is accepted by design;
//! content changes at a URL are only picked up after an out-of-band removal
//! of the artifact.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::StoreError;
use crate::index::VectorIndex;

/// Deterministic identifier for a cache/storage entry.
///
/// Derived from the canonicalized URL: surrounding whitespace trimmed, then
/// parsed with the `url` crate, which lowercases the scheme and host and
/// normalizes the path. The canonical string is hashed with SHA-256 and
/// rendered as 64 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey(String);

impl ContentKey {
    /// Compute the key for a URL.
    ///
    /// Unparseable URLs fall back to hashing the trimmed string itself, so a
    /// key always exists; the fetcher is the place that rejects bad URLs.
    pub fn for_url(url: &str) -> Self {
        let trimmed = url.trim();
        let canonical = match Url::parse(trimmed) {
            Ok(parsed) => parsed.to_string(),
            Err(_) => trimmed.to_string(),
        };
        let digest = Sha256::digest(canonical.as_bytes());
        let mut hex = String::with_capacity(64);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        ContentKey(hex)
    }

    /// The hex form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk serialized form of an index for a content key.
///
/// Carries the full document text alongside the index so summarization works
/// after a reload; artifacts written by older versions may lack it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// The searchable index.
    pub index: VectorIndex,
    /// Full page text, when persisted.
    pub document_text: Option<String>,
}

/// Filesystem store mapping content keys to artifact files.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    /// Monotonic counter making temp file names unique within the process.
    temp_seq: AtomicU64,
}

impl ArtifactStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::Io { source: e })?;
        Ok(Self {
            root,
            temp_seq: AtomicU64::new(0),
        })
    }

    /// The storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact file for a key.
    pub fn artifact_path(&self, key: &ContentKey) -> PathBuf {
        self.root.join(format!("{key}.idx"))
    }

    /// Whether an artifact exists for the key.
    pub fn contains(&self, key: &ContentKey) -> bool {
        self.artifact_path(key).exists()
    }

    /// Persist an artifact for a key.
    ///
    /// Idempotent: storing the same content twice leaves the same bytes on
    /// disk. The artifact is written to a temp file in the same directory and
    /// renamed into place, so readers never observe a partial write.
    pub fn store(&self, key: &ContentKey, artifact: &Artifact) -> Result<(), StoreError> {
        let bytes = bincode::serialize(artifact).map_err(|e| StoreError::Serialize {
            message: e.to_string(),
        })?;

        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let temp = self
            .root
            .join(format!(".{key}.tmp.{}.{seq}", std::process::id()));
        std::fs::write(&temp, &bytes).map_err(|e| StoreError::Io { source: e })?;
        std::fs::rename(&temp, self.artifact_path(key)).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            StoreError::Io { source: e }
        })?;

        tracing::debug!(%key, bytes = bytes.len(), "stored artifact");
        Ok(())
    }

    /// Load the artifact for a key.
    ///
    /// Returns `Ok(None)` if absent. A file that exists but fails to decode is
    /// reported as [`StoreError::Corrupt`]; callers treat that as absent and
    /// rebuild.
    pub fn load(&self, key: &ContentKey) -> Result<Option<Artifact>, StoreError> {
        let path = self.artifact_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io { source: e }),
        };

        let artifact = bincode::deserialize(&bytes).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(artifact))
    }
}
