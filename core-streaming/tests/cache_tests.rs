//! URL cache behaviour against a fake catalog

mod common;

use bridge_traits::time::{Clock, ManualClock};
use chrono::{TimeZone, Utc};
use common::FakeCatalog;
use core_streaming::cache::{CacheConfig, UrlCache};
use core_streaming::StreamingError;
use std::sync::Arc;
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(50 * 60);
const INTERVAL: Duration = Duration::from_secs(40 * 60);

fn catalog() -> Arc<FakeCatalog> {
    FakeCatalog::new()
        .with_asset("group1", "720p/prog_index.m3u8", "https://cdn.example/abc")
        .with_asset("group1", "720p/seg_0.ts", "https://cdn.example/seg0")
        .with_asset("group1", "init.mp4", "https://cdn.example/init")
        .with_asset("group2", "seg_0.ts", "https://cdn.example/other")
}

fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()))
}

fn cache_with_clock(catalog: Arc<FakeCatalog>, clock: Arc<ManualClock>) -> UrlCache {
    UrlCache::with_clock(catalog, CacheConfig::default(), clock)
}

#[tokio::test]
async fn test_entries_expire_after_validity_window() {
    let clock = manual_clock();
    let cache = cache_with_clock(catalog(), clock.clone());

    cache.refresh("group1", "720p/seg_0.ts").await.unwrap();

    let entry = cache.entry("group1", "720p/seg_0.ts").unwrap();
    assert_eq!(
        entry.expires_at - entry.cached_at,
        chrono::Duration::from_std(WINDOW).unwrap()
    );

    // Exactly at the boundary the entry is still valid
    clock.advance(WINDOW);
    assert_eq!(
        cache.lookup("group1", "720p/seg_0.ts").as_deref(),
        Some("https://cdn.example/seg0")
    );

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.lookup("group1", "720p/seg_0.ts"), None);
    // Lazily evicted
    assert!(cache.entry("group1", "720p/seg_0.ts").is_none());
}

#[tokio::test]
async fn test_concurrent_refresh_makes_one_backend_call() {
    let catalog = catalog();
    catalog.set_delay(Duration::from_millis(50));
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    let (first, second) = tokio::join!(
        cache.refresh("group1", "720p/seg_0.ts"),
        cache.refresh("group1", "720p/seg_0.ts"),
    );

    assert_eq!(first.unwrap(), "https://cdn.example/seg0");
    assert_eq!(second.unwrap(), "https://cdn.example/seg0");
    assert_eq!(catalog.calls(), 1);
    assert_eq!(cache.stats().in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_stampede_across_tasks() {
    let catalog = catalog();
    catalog.set_delay(Duration::from_millis(100));
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh("group1", "init.mp4").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "https://cdn.example/init");
    }
    assert_eq!(catalog.calls(), 1);
}

#[tokio::test]
async fn test_prefetch_then_lookup() {
    let clock = manual_clock();
    let cache = cache_with_clock(catalog(), clock.clone());

    let committed = cache.prefetch("group1").await.unwrap();
    assert_eq!(committed, 3);

    for path in ["720p/prog_index.m3u8", "720p/seg_0.ts", "init.mp4"] {
        assert!(cache.lookup("group1", path).is_some(), "{} not cached", path);
        let entry = cache.entry("group1", path).unwrap();
        assert!(entry.expires_at > clock.now());
    }

    assert_eq!(
        cache.cached_paths("group1"),
        vec!["720p/prog_index.m3u8", "720p/seg_0.ts", "init.mp4"]
    );
    assert!(cache.cached_paths("group2").is_empty());

    cache.clear_all();
}

#[tokio::test]
async fn test_refresh_unknown_path_is_not_found() {
    let catalog = catalog();
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    let result = cache.refresh("group1", "missing.ts").await;

    assert!(matches!(result, Err(StreamingError::SegmentNotFound(_))));
    assert!(cache.lookup("group1", "missing.ts").is_none());
}

#[tokio::test]
async fn test_failed_refresh_clears_in_flight_marker() {
    let catalog = catalog();
    catalog.fail_next(1);
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    let result = cache.refresh("group1", "720p/seg_0.ts").await;
    assert!(matches!(result, Err(StreamingError::DownloadFailed(_))));
    assert_eq!(cache.stats().in_flight, 0);

    // Not joined onto the failed resolution
    let url = cache.refresh("group1", "720p/seg_0.ts").await.unwrap();
    assert_eq!(url, "https://cdn.example/seg0");
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test]
async fn test_resolve_prefers_cached_entry() {
    let catalog = catalog();
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    cache.resolve("group1", "init.mp4").await.unwrap();
    cache.resolve("group1", "init.mp4").await.unwrap();

    assert_eq!(catalog.calls(), 1);
}

#[tokio::test]
async fn test_percent_encoded_paths_share_a_key() {
    let catalog = FakeCatalog::new().with_asset("g", "audio en/seg 0.ts", "https://cdn.example/en0");
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    cache.prefetch("g").await.unwrap();

    assert_eq!(
        cache.lookup("g", "audio%20en/seg%200.ts").as_deref(),
        Some("https://cdn.example/en0")
    );
    cache.clear_all();
}

#[tokio::test(start_paused = true)]
async fn test_clear_cancels_in_flight_refresh() {
    let catalog = catalog();
    catalog.set_delay(Duration::from_secs(10));
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    let waiter = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.refresh("group1", "720p/seg_0.ts").await })
    };

    // Let the resolution start
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(cache.stats().in_flight, 1);

    cache.clear("group1");

    let result = waiter.await.unwrap();
    assert_eq!(result, Err(StreamingError::Cancelled));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(cache.entry("group1", "720p/seg_0.ts").is_none());
    assert_eq!(cache.stats().in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn test_background_refresh_runs_until_clear() {
    let catalog = catalog();
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    cache.prefetch("group1").await.unwrap();
    assert_eq!(catalog.calls(), 1);
    assert_eq!(cache.stats().active_groups, 1);

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(catalog.calls(), 2);

    cache.clear("group1");
    assert_eq!(cache.stats().active_groups, 0);

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_background_refresh_survives_failures() {
    let catalog = catalog();
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    cache.prefetch("group1").await.unwrap();
    catalog.fail_next(1);

    tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;

    // One failed tick, one successful tick
    assert_eq!(catalog.calls(), 3);
    assert!(cache.lookup("group1", "init.mp4").is_some());

    cache.clear_all();
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_replaces_background_loop() {
    let catalog = catalog();
    let cache = UrlCache::new(catalog.clone(), CacheConfig::default());

    cache.prefetch("group1").await.unwrap();
    cache.prefetch("group1").await.unwrap();
    assert_eq!(cache.stats().active_groups, 1);

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    // Two prefetches plus a single loop tick
    assert_eq!(catalog.calls(), 3);

    cache.clear_all();
}

#[tokio::test]
async fn test_clear_is_scoped_to_group() {
    let cache = UrlCache::new(catalog(), CacheConfig::default());

    cache.prefetch("group1").await.unwrap();
    cache.prefetch("group2").await.unwrap();

    cache.clear("group1");

    assert!(cache.lookup("group1", "init.mp4").is_none());
    assert!(cache.lookup("group2", "seg_0.ts").is_some());
    assert_eq!(cache.stats().active_groups, 1);

    cache.clear_all();
    assert_eq!(cache.stats().total, 0);
}

#[tokio::test]
async fn test_stats_and_purge() {
    let clock = manual_clock();
    let cache = cache_with_clock(catalog(), clock.clone());

    cache.refresh("group1", "init.mp4").await.unwrap();
    clock.advance(Duration::from_secs(30 * 60));
    cache.refresh("group1", "720p/seg_0.ts").await.unwrap();
    clock.advance(Duration::from_secs(15 * 60));

    // init.mp4 has 5 minutes left, seg_0.ts has 35
    let stats = cache.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.expired, 0);
    assert_eq!(stats.near_expiry, 1);

    clock.advance(Duration::from_secs(10 * 60));
    let stats = cache.stats();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.valid(), 1);

    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.stats().total, 1);
}
