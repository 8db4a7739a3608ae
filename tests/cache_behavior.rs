//! Behavior-driven tests for the shared date-scoped cache as used by
//! concurrent pipeline runs.

use std::sync::Arc;
use std::time::Duration;

use dtrecap_core::{dt_file_key, CacheConfig, DateScopedCache, MemoryObjectStore, ObjectStore};
use dtrecap_tests::seed_dt_files;

fn shared_cache(store: Arc<MemoryObjectStore>) -> DateScopedCache {
    let store_dyn: Arc<dyn ObjectStore> = store;
    DateScopedCache::new(
        store_dyn,
        CacheConfig {
            ttl: Duration::from_secs(60),
            list_ttl: Duration::from_secs(60),
            inactivity_window: Duration::ZERO,
            max_bytes: 1024 * 1024,
        },
    )
}

#[tokio::test]
async fn when_two_runs_share_a_date_one_deactivation_keeps_it_cached() {
    // Given: two concurrent runs have activated the same date
    let store = Arc::new(MemoryObjectStore::new());
    let dates = seed_dt_files(&store, &["20260102", "20260103"]).await;
    let cache = shared_cache(store.clone());
    let shared = dates[0];
    let key = dt_file_key(shared);

    cache.activate_date(shared).await;
    cache.activate_date(shared).await;
    assert!(cache.raw_content(&key).await.is_some());

    // When: one run finishes and releases the date, and another insert
    // triggers the opportunistic inactivity sweep
    cache.deactivate_date(shared).await;
    let other = dates[1];
    cache.activate_date(other).await;
    assert!(cache.raw_content(&dt_file_key(other)).await.is_some());

    // Then: the shared date's entry still serves the surviving run
    store.fail_gets(true);
    assert!(
        cache.raw_content(&key).await.is_some(),
        "still-held date was purged"
    );
}

#[tokio::test]
async fn when_many_runs_overlap_each_fetch_happens_once() {
    // Given: a shared cache and several tasks wanting the same file
    let store = Arc::new(MemoryObjectStore::new());
    let dates = seed_dt_files(&store, &["20260102"]).await;
    let cache = shared_cache(store.clone());
    let date = dates[0];
    cache.activate_date(date).await;

    // Warm the entry, then hammer it concurrently.
    let key = dt_file_key(date);
    assert!(cache.raw_content(&key).await.is_some());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let key = key.clone();
        tasks.spawn(async move { cache.raw_content(&key).await.is_some() });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.expect("task"));
    }

    // Then: one miss (the warm-up), everything else served from cache
    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 8);
}

#[tokio::test]
async fn listing_ignores_keys_that_are_not_dt_files() {
    // Given: the input namespace contains stray objects alongside dumps
    let store = Arc::new(MemoryObjectStore::new());
    let dates = seed_dt_files(&store, &["20260103"]).await;
    store.insert("done-summary/manifest.txt", "not a dump").await;
    store.insert("done-summary/20260102/notes.csv", "scratch").await;

    // When: the run discovers its inputs
    let cache = shared_cache(store.clone());
    let listing = cache.dt_file_list().await;

    // Then: only well-formed DT keys are offered for processing
    assert_eq!(listing.as_slice(), &[dt_file_key(dates[0])]);
}
