use std::{future::Future, sync::Arc};

use apache_avro::Schema;
use dashmap::DashMap;
use tokio::sync::OnceCell;

/// Parsed registry schemas, keyed by schema ID.
///
/// Entries are added on the first successful fetch for an ID and are never evicted or replaced,
/// so the cache grows with the number of distinct IDs seen. Registries hand out a small, finite
/// set of IDs per topic, which keeps this bounded in practice.
///
/// Concurrent misses on the same ID are coalesced: the first caller runs the fetch while the
/// others wait for its outcome. A failed fetch leaves the entry empty and the next waiter runs
/// its own fetch. Once no caller is waiting on a failed entry it is dropped, so IDs that never
/// resolve do not accumulate.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: DashMap<u32, Arc<OnceCell<Arc<Schema>>>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema cached for `id` without fetching.
    pub fn get(&self, id: u32) -> Option<Arc<Schema>> {
        self.entries
            .get(&id)
            .and_then(|entry| entry.value().get().cloned())
    }

    /// Returns the cached schema for `id`, running `fetch` to populate the entry on a miss.
    ///
    /// Dropping the returned future part-way through leaves an empty entry behind, which the
    /// next call for `id` reuses.
    pub async fn get_or_fetch<F, Fut, E>(&self, id: u32, fetch: F) -> Result<Arc<Schema>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Schema, E>>,
    {
        // Clone the cell out so the shard lock is not held across the fetch.
        let cell = Arc::clone(&self.entries.entry(id).or_default());

        let result = cell
            .get_or_try_init(|| async move { fetch().await.map(Arc::new) })
            .await
            .cloned();

        if result.is_err() {
            // Waiters still holding the cell retry on it; the last one out removes it.
            drop(cell);
            self.entries
                .remove_if(&id, |_, cell| !cell.initialized() && Arc::strong_count(cell) == 1);
        }

        result
    }

    /// The number of cached schemas.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Returns `true` if no schema has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::test_util::TEST_SCHEMA;

    fn parse() -> Result<Schema, String> {
        Schema::parse_str(TEST_SCHEMA).map_err(|error| error.to_string())
    }

    #[tokio::test]
    async fn fetches_once_per_id() {
        let cache = SchemaCache::new();
        let fetches = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_fetch(7, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    parse()
                })
                .await
                .unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(7).is_some());
        assert!(cache.get(8).is_none());
    }

    #[tokio::test]
    async fn distinct_ids_fetch_separately() {
        let cache = SchemaCache::new();
        let fetches = AtomicUsize::new(0);

        for id in [1, 2, 1, 2, 3] {
            cache
                .get_or_fetch(id, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    parse()
                })
                .await
                .unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = SchemaCache::new();

        let error = cache
            .get_or_fetch(7, || async { Err::<Schema, _>("registry down".to_owned()) })
            .await
            .unwrap_err();
        assert_eq!(error, "registry down");
        assert!(cache.is_empty());

        cache.get_or_fetch(7, || async { parse() }).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_ids_leave_no_entries() {
        let cache = SchemaCache::new();

        for id in 0..1000 {
            cache
                .get_or_fetch(id, || async { Err::<Schema, _>("unknown schema") })
                .await
                .unwrap_err();
        }

        assert!(cache.is_empty());
        assert_eq!(cache.entries.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_leave_no_entries() {
        let cache = Arc::new(SchemaCache::new());

        let tasks = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache
                        .get_or_fetch(9, || async {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Err::<Schema, _>("registry down")
                        })
                        .await
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await.unwrap().unwrap_err();
        }

        assert_eq!(cache.entries.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_are_coalesced() {
        let cache = Arc::new(SchemaCache::new());
        let fetches = Arc::new(AtomicUsize::new(0));

        let tasks = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let fetches = Arc::clone(&fetches);
                tokio::spawn(async move {
                    cache
                        .get_or_fetch(42, || async move {
                            fetches.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            parse()
                        })
                        .await
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
