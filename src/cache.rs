//! In-memory content cache over the filesystem store.
//!
//! The cache is two layers:
//!
//! - A **resolved** layer: a weight-bounded moka cache mapping `key` to its
//!   record. Weight is the stored body length, capped in total at the
//!   configured byte budget; entries idle-expire after the cache TTL.
//!   Lookups that miss run the store load as a moka single-flight
//!   initializer, so any number of concurrent readers of one key share one
//!   disk read. That includes the case where the answer is "nothing there":
//!   the empty sentinel is cached like any record and short-circuits repeat
//!   misses.
//! - A **pending** layer: a concurrent map of shared futures, one per
//!   in-flight upload. A POST installs its promise here before the 201 goes
//!   out; readers that arrive before the record is formed await the same
//!   promise instead of touching the disk. On resolution the record moves
//!   into the resolved layer (where eviction can see its real weight) and
//!   only then is the disk write attempted.
//!
//! The resolve-then-write order is what makes reads-after-POST work without
//! durability: a GET issued the moment the 201 arrives is served from memory
//! even though the file may not exist yet.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use moka::future::Cache;

use crate::content::Content;
use crate::store::{ContentStore, StoreError};

/// A shared handle to a record still being formed (compressed and built) by
/// an upload. Every clone resolves to the same `Arc<Content>`.
type Promise = Shared<BoxFuture<'static, Arc<Content>>>;

/// Weight-bounded, idle-expiring record cache with single-flight loads.
#[derive(Clone)]
pub struct ContentCache {
    resolved: Cache<String, Arc<Content>>,
    pending: Arc<DashMap<String, Promise>>,
    store: Arc<ContentStore>,
}

impl ContentCache {
    /// Builds a cache over `store` holding at most `max_bytes` of stored
    /// bodies, idle-expiring entries after `idle_ttl`.
    pub fn new(store: Arc<ContentStore>, max_bytes: u64, idle_ttl: Duration) -> Self {
        let resolved = Cache::builder()
            .weigher(|_key: &String, value: &Arc<Content>| {
                value.body.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_bytes)
            .time_to_idle(idle_ttl)
            .build();
        Self {
            resolved,
            pending: Arc::new(DashMap::new()),
            store,
        }
    }

    /// Looks up `key`, loading through the store on a miss.
    ///
    /// Readers of a key with an upload in flight await the upload's promise.
    /// Otherwise moka's single-flight initializer runs one store load per
    /// key however many readers pile in. The returned record may be the
    /// empty sentinel; callers must check [`Content::is_present`].
    pub async fn get(&self, key: &str) -> Result<Arc<Content>, Arc<StoreError>> {
        if let Some(promise) = self.pending.get(key).map(|entry| entry.value().clone()) {
            return Ok(promise.await);
        }

        let store = Arc::clone(&self.store);
        let load_key = key.to_string();
        self.resolved
            .try_get_with(key.to_string(), async move {
                store.load(&load_key).await.map(Arc::new)
            })
            .await
    }

    /// Installs the promise for a fresh upload and spawns its save driver.
    ///
    /// The driver awaits the formed record, publishes it to the resolved
    /// layer, retires the promise, and then hands the record to the store.
    /// An exclusive-create conflict there is logged and dropped: the cache
    /// is already serving the resolved record for this key, and the disk
    /// keeps the earlier file.
    pub fn put<F>(&self, key: String, form: F)
    where
        F: std::future::Future<Output = Arc<Content>> + Send + 'static,
    {
        let promise: Promise = form.boxed().shared();
        self.pending.insert(key.clone(), promise.clone());

        let resolved = self.resolved.clone();
        let pending = Arc::clone(&self.pending);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let content = promise.await;
            resolved.insert(key.clone(), Arc::clone(&content)).await;
            pending.remove(&key);

            match store.write(content).await {
                Ok(()) => {}
                Err(StoreError::AlreadyExists) => {
                    tracing::info!(key = %key, "content file already exists, dropping write");
                }
                Err(err) => {
                    tracing::error!(key = %key, error = %err, "failed to persist content");
                }
            }
        });
    }

    /// Approximate total weight of resolved entries, in bytes.
    pub fn weighted_size(&self) -> u64 {
        self.resolved.weighted_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn record(key: &str, body: &'static [u8]) -> Arc<Content> {
        Arc::new(Content::new(
            key.into(),
            Bytes::from_static(b"text/plain"),
            i64::MAX,
            Bytes::from_static(body),
        ))
    }

    fn cache_over(dir: &std::path::Path) -> (ContentCache, Arc<ContentStore>) {
        let store = Arc::new(ContentStore::new(dir).unwrap());
        let cache = ContentCache::new(Arc::clone(&store), 64 * 1024 * 1024, Duration::from_secs(600));
        (cache, store)
    }

    #[tokio::test]
    async fn readers_wait_on_the_pending_promise() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _store) = cache_over(dir.path());

        let (tx, rx) = tokio::sync::oneshot::channel::<Arc<Content>>();
        cache.put("waiting".into(), async move { rx.await.unwrap() });

        // The key is pending, not missing: a bounded get neither resolves
        // nor falls through to a disk load that would cache the sentinel.
        let early = tokio::time::timeout(Duration::from_millis(20), cache.get("waiting")).await;
        assert!(early.is_err());

        tx.send(record("waiting", b"published")).unwrap();
        let got = cache.get("waiting").await.unwrap();
        assert_eq!(got.body, Bytes::from_static(b"published"));
    }

    #[tokio::test]
    async fn put_resolves_before_the_file_lands() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, store) = cache_over(dir.path());

        cache.put("abcd123".into(), async { record("abcd123", b"hello") });

        let got = cache.get("abcd123").await.unwrap();
        assert_eq!(got.body, Bytes::from_static(b"hello"));

        // The save driver still reaches disk.
        for _ in 0..100 {
            if store.path_for("abcd123").exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("record never persisted");
    }

    #[tokio::test]
    async fn missing_keys_are_negatively_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, store) = cache_over(dir.path());

        let miss = cache.get("ghost77").await.unwrap();
        assert!(!miss.is_present());

        // The sentinel is now authoritative until eviction: a record written
        // behind the cache's back stays invisible.
        store.write(record("ghost77", b"late")).await.unwrap();
        let still_miss = cache.get("ghost77").await.unwrap();
        assert!(!still_miss.is_present());
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, store) = cache_over(dir.path());
        store.write(record("shared1", b"body")).await.unwrap();

        let (a, b) = tokio::join!(cache.get("shared1"), cache.get("shared1"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.body, Bytes::from_static(b"body"));
    }
}
