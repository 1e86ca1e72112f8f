//! In-memory cache of ready indexes with durable backing.
//!
//! Every key is in exactly one of three states: absent, building, or ready.
//! At most one build runs per key at a time; concurrent requesters for a key
//! that is building wait on the in-flight build and share its outcome. A
//! failed build leaves nothing behind, so the next request retries from
//! scratch.
//!
//! The cache does not know how to build an index. Callers pass a build closure
//! to [`IndexCache::get_or_build`]; the cache decides whether to run it, serve
//! a memory hit, or rehydrate from the durable store.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use dashmap::DashMap;

use crate::error::{CacheError, PageloreError, PageloreResult};
use crate::index::VectorIndex;
use crate::store::{Artifact, ArtifactStore, ContentKey};

/// A fully built, immutable cache entry.
#[derive(Debug)]
pub struct CacheEntry {
    /// Content key this entry was built for.
    pub key: ContentKey,
    /// The searchable index.
    pub index: VectorIndex,
    /// Full document text, when the artifact carried it.
    pub document_text: Option<String>,
}

/// Shared state of one in-flight build.
///
/// The builder completes it exactly once; waiters block on the condvar until
/// the outcome is set. Errors are shared as messages because the build error
/// itself is consumed by the builder's own return path.
struct Flight {
    outcome: Mutex<Option<Result<Arc<CacheEntry>, String>>>,
    done: Condvar,
}

impl std::fmt::Debug for Flight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight").finish_non_exhaustive()
    }
}

impl Flight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<Arc<CacheEntry>, String>) {
        let mut slot = self
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Arc<CacheEntry>, String> {
        let mut slot = self
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

/// Cache manager coordinating memory, in-flight builds, and durable storage.
#[derive(Debug)]
pub struct IndexCache {
    entries: DashMap<ContentKey, Arc<CacheEntry>>,
    inflight: Mutex<HashMap<ContentKey, Arc<Flight>>>,
    store: ArtifactStore,
}

impl IndexCache {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Number of ready entries held in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The backing durable store.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Get the ready entry for `url`, building it at most once.
    ///
    /// Resolution order: memory hit, then in-flight wait, then durable
    /// rehydrate, then a cold build via `build`. Exactly one caller per key
    /// runs the build or disk load; everyone else waits and shares the
    /// outcome. A corrupt durable artifact is logged and rebuilt cold.
    pub fn get_or_build<F>(&self, url: &str, build: F) -> PageloreResult<Arc<CacheEntry>>
    where
        F: FnOnce() -> PageloreResult<Artifact>,
    {
        let key = ContentKey::for_url(url);

        if let Some(entry) = self.entries.get(&key) {
            tracing::debug!(%key, url, "cache hit (memory)");
            return Ok(Arc::clone(&entry));
        }

        // Either join an in-flight build or register our own. The entries
        // recheck under the lock closes the window where a build finished
        // between the fast path above and taking the lock.
        let flight = {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            if let Some(entry) = self.entries.get(&key) {
                return Ok(Arc::clone(&entry));
            }

            if let Some(existing) = inflight.get(&key).cloned() {
                drop(inflight);
                tracing::debug!(%key, url, "joining in-flight build");
                return existing.wait().map_err(|message| {
                    CacheError::BuildFailed {
                        url: url.to_string(),
                        message,
                    }
                    .into()
                });
            }

            let flight = Arc::new(Flight::new());
            inflight.insert(key.clone(), Arc::clone(&flight));
            flight
        };

        // We own the build for this key. Run it off-lock and publish the
        // outcome exactly once, success or failure.
        match self.load_or_build(&key, url, build) {
            Ok(entry) => {
                self.entries.insert(key.clone(), Arc::clone(&entry));
                self.remove_flight(&key);
                flight.complete(Ok(Arc::clone(&entry)));
                Ok(entry)
            }
            Err(err) => {
                // The key returns to absent so the next request retries.
                self.remove_flight(&key);
                flight.complete(Err(err.to_string()));
                Err(err)
            }
        }
    }

    /// Clear all in-memory entries, leaving durable artifacts intact.
    ///
    /// Returns the number of entries dropped. Subsequent requests for cleared
    /// keys rehydrate from disk without refetching or re-embedding.
    pub fn reset(&self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::info!(dropped, "cache reset (memory only)");
        dropped
    }

    fn remove_flight(&self, key: &ContentKey) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inflight.remove(key);
    }

    fn load_or_build<F>(&self, key: &ContentKey, url: &str, build: F) -> PageloreResult<Arc<CacheEntry>>
    where
        F: FnOnce() -> PageloreResult<Artifact>,
    {
        match self.store.load(key) {
            Ok(Some(artifact)) => {
                tracing::debug!(%key, url, "cache hit (durable)");
                return Ok(Arc::new(CacheEntry {
                    key: key.clone(),
                    index: artifact.index,
                    document_text: artifact.document_text,
                }));
            }
            Ok(None) => {}
            Err(err) => {
                // Corrupt or unreadable artifact behaves as absent.
                tracing::warn!(%key, url, error = %err, "durable artifact unusable, rebuilding");
            }
        }

        tracing::info!(%key, url, "cold build");
        let artifact = build()?;
        self.store.store(key, &artifact).map_err(PageloreError::from)?;

        Ok(Arc::new(CacheEntry {
            key: key.clone(),
            index: artifact.index,
            document_text: artifact.document_text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::model::Chunk;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn test_artifact(text: &str) -> Artifact {
        let chunks = vec![Chunk {
            index: 0,
            text: text.into(),
            start: 0,
            end: text.chars().count(),
        }];
        Artifact {
            index: VectorIndex::build(chunks, vec![vec![1.0, 0.0]]).unwrap(),
            document_text: Some(text.into()),
        }
    }

    #[test]
    fn cold_build_then_memory_hit() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(ArtifactStore::open(dir.path()).unwrap());
        let builds = AtomicUsize::new(0);

        let first = cache
            .get_or_build("https://example.com/page", || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(test_artifact("hello"))
            })
            .unwrap();
        let second = cache
            .get_or_build("https://example.com/page", || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(test_artifact("hello"))
            })
            .unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn reset_preserves_durable_artifacts() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(ArtifactStore::open(dir.path()).unwrap());
        let builds = AtomicUsize::new(0);

        cache
            .get_or_build("https://example.com/page", || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(test_artifact("durable text"))
            })
            .unwrap();
        assert_eq!(cache.reset(), 1);
        assert!(cache.is_empty());

        // Rehydrates from disk; the build closure never runs again.
        let entry = cache
            .get_or_build("https://example.com/page", || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(test_artifact("durable text"))
            })
            .unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(entry.document_text.as_deref(), Some("durable text"));
    }

    #[test]
    fn failed_build_leaves_key_absent() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(ArtifactStore::open(dir.path()).unwrap());

        let result = cache.get_or_build("https://example.com/broken", || {
            Err(FetchError::HttpStatus {
                url: "https://example.com/broken".into(),
                status: 503,
            }
            .into())
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
        assert!(!cache.store().contains(&ContentKey::for_url("https://example.com/broken")));

        // Next request retries and can succeed.
        let entry = cache
            .get_or_build("https://example.com/broken", || Ok(test_artifact("recovered")))
            .unwrap();
        assert_eq!(entry.document_text.as_deref(), Some("recovered"));
    }

    #[test]
    fn corrupt_artifact_triggers_cold_rebuild() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(ArtifactStore::open(dir.path()).unwrap());
        let key = ContentKey::for_url("https://example.com/page");

        std::fs::write(cache.store().artifact_path(&key), b"not bincode").unwrap();

        let builds = AtomicUsize::new(0);
        let entry = cache
            .get_or_build("https://example.com/page", || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(test_artifact("rebuilt"))
            })
            .unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(entry.document_text.as_deref(), Some("rebuilt"));

        // The rebuild replaced the corrupt bytes.
        assert!(cache.store().load(&key).unwrap().is_some());
    }

    #[test]
    fn distinct_urls_build_independently() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(ArtifactStore::open(dir.path()).unwrap());
        let builds = AtomicUsize::new(0);

        for url in ["https://example.com/a", "https://example.com/b"] {
            cache
                .get_or_build(url, || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(test_artifact(url))
                })
                .unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn equivalent_urls_share_one_entry() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(ArtifactStore::open(dir.path()).unwrap());
        let builds = AtomicUsize::new(0);

        for url in ["https://example.com/a", "  HTTPS://example.com/a "] {
            cache
                .get_or_build(url, || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(test_artifact("shared"))
                })
                .unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
