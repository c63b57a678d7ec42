//! # URL Cache
//!
//! Time-bounded cache of resolved URLs keyed by `(group, path)`.
//!
//! This module provides:
//! - Non-blocking `lookup` with lazy eviction of expired entries
//! - `refresh` with request de-duplication: concurrent callers for one key
//!   share a single backend resolution
//! - Group `prefetch` plus one background refresh loop per active group
//! - Cooperative cancellation of in-flight work and loops on `clear`
//!
//! All mutable state (entries, in-flight resolutions, group handles) lives in
//! one `parking_lot::Mutex`. The lock is never held across an `.await`.

use crate::cache::config::CacheConfig;
use crate::cache::entry::{CacheKey, CachedUrl};
use crate::cache::stats::CacheStats;
use crate::error::{Result, StreamingError};
use bridge_traits::catalog::{AssetCatalog, UrlMap};
use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::CancellationToken;
use core_async::time::sleep;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

type SharedResolution = Shared<BoxFuture<'static, Result<String>>>;

/// Resolved-URL cache handle.
///
/// Cheap to clone; all clones share one cache.
///
/// # Example
///
/// ```rust,ignore
/// use core_streaming::cache::{CacheConfig, UrlCache};
///
/// let cache = UrlCache::new(catalog, CacheConfig::default());
/// cache.prefetch("album-1").await?;
///
/// if let Some(url) = cache.lookup("album-1", "720p/seg_0.ts") {
///     // serve a redirect
/// }
/// ```
#[derive(Clone)]
pub struct UrlCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    catalog: Arc<dyn AssetCatalog>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CachedUrl>,
    in_flight: HashMap<CacheKey, InFlight>,
    groups: HashMap<String, GroupState>,
    next_request_id: u64,
}

struct InFlight {
    id: u64,
    resolution: SharedResolution,
}

struct GroupState {
    /// Parent of every in-flight resolution and the refresh loop of the group
    token: CancellationToken,
    refresh_loop: Option<CancellationToken>,
}

impl CacheState {
    fn group_token(&mut self, group: &str) -> CancellationToken {
        self.groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState {
                token: CancellationToken::new(),
                refresh_loop: None,
            })
            .token
            .clone()
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }
}

impl UrlCache {
    /// Create a cache backed by `catalog`, using the system clock.
    pub fn new(catalog: Arc<dyn AssetCatalog>, config: CacheConfig) -> Self {
        Self::with_clock(catalog, config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock (tests drive expiry with a
    /// `ManualClock`).
    pub fn with_clock(
        catalog: Arc<dyn AssetCatalog>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                catalog,
                clock,
                config,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Cached URL for `(group, path)` if present and not expired.
    ///
    /// Expired entries are evicted. Never performs I/O.
    pub fn lookup(&self, group: &str, path: &str) -> Option<String> {
        let key = CacheKey::new(group, path);
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock();

        match state.entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.url.clone()),
            Some(_) => {
                state.entries.remove(&key);
                debug!(key = %key, "Evicted expired entry");
                None
            }
            None => None,
        }
    }

    /// The stored entry for `(group, path)`, expired or not. Diagnostic only;
    /// does not evict.
    pub fn entry(&self, group: &str, path: &str) -> Option<CachedUrl> {
        let key = CacheKey::new(group, path);
        self.inner.state.lock().entries.get(&key).cloned()
    }

    /// Resolve `(group, path)` through the backend and cache the result.
    ///
    /// Joins a resolution already in flight for the same key instead of
    /// starting another. The resolution runs on its own task, so it commits
    /// even if every caller stops waiting, unless the group is cleared first.
    ///
    /// # Errors
    ///
    /// - `SegmentNotFound` if the catalog has no record for the path
    /// - `Cancelled` if the group was cleared while resolving
    /// - the catalog's own error kind otherwise
    #[instrument(skip(self))]
    pub async fn refresh(&self, group: &str, path: &str) -> Result<String> {
        let key = CacheKey::new(group, path);

        let resolution = {
            let mut state = self.inner.state.lock();
            match state.in_flight.get(&key) {
                Some(in_flight) => {
                    debug!("Joining in-flight resolution");
                    in_flight.resolution.clone()
                }
                None => {
                    let id = state.next_request_id();
                    let token = state.group_token(group).child_token();
                    let resolution = spawn_resolution(&self.inner, key.clone(), id, token);
                    state.in_flight.insert(
                        key,
                        InFlight {
                            id,
                            resolution: resolution.clone(),
                        },
                    );
                    resolution
                }
            }
        };

        resolution.await
    }

    /// `lookup`, falling back to `refresh` on a miss.
    pub async fn resolve(&self, group: &str, path: &str) -> Result<String> {
        match self.lookup(group, path) {
            Some(url) => Ok(url),
            None => self.refresh(group, path).await,
        }
    }

    /// Resolve every path of `group` in one batch, cache the results and
    /// (re)start the group's background refresh loop.
    ///
    /// Returns the number of entries committed.
    #[instrument(skip(self))]
    pub async fn prefetch(&self, group: &str) -> Result<usize> {
        let token = self.inner.state.lock().group_token(group);

        let committed = self.inner.resolve_group(group, &token).await?;
        self.start_refresh_loop(group, &token);

        info!(committed, "Prefetched group");
        Ok(committed)
    }

    /// Drop all entries of `group`, cancel its in-flight resolutions and stop
    /// its background loop.
    #[instrument(skip(self))]
    pub fn clear(&self, group: &str) {
        let mut state = self.inner.state.lock();

        let before = state.entries.len();
        state.entries.retain(|key, _| key.group != group);
        let removed = before - state.entries.len();

        state.in_flight.retain(|key, _| key.group != group);

        if let Some(group_state) = state.groups.remove(group) {
            group_state.token.cancel();
        }

        info!(removed, "Cleared cache group");
    }

    /// Drop everything and stop every background loop.
    pub fn clear_all(&self) {
        let mut state = self.inner.state.lock();

        let removed = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();

        for (_, group_state) in state.groups.drain() {
            group_state.token.cancel();
        }

        info!(removed, "Cleared entire cache");
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock();

        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - state.entries.len();

        if removed > 0 {
            debug!(removed, "Purged expired entries");
        }
        removed
    }

    /// Sorted relative paths currently cached for `group`.
    pub fn cached_paths(&self, group: &str) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut paths: Vec<String> = state
            .entries
            .keys()
            .filter(|key| key.group == group)
            .map(|key| key.path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.inner.clock.now();
        let threshold = self.inner.config.near_expiry_threshold;
        let state = self.inner.state.lock();

        let mut stats = CacheStats {
            total: state.entries.len(),
            in_flight: state.in_flight.len(),
            active_groups: state
                .groups
                .values()
                .filter(|group| group.refresh_loop.is_some())
                .count(),
            ..CacheStats::default()
        };

        for entry in state.entries.values() {
            if entry.is_expired(now) {
                stats.expired += 1;
            } else if entry.is_near_expiry(now, threshold) {
                stats.near_expiry += 1;
            }
        }

        stats
    }

    fn start_refresh_loop(&self, group: &str, group_token: &CancellationToken) {
        let mut state = self.inner.state.lock();
        if group_token.is_cancelled() {
            // Cleared between commit and here
            return;
        }
        let Some(group_state) = state.groups.get_mut(group) else {
            return;
        };

        if let Some(previous) = group_state.refresh_loop.take() {
            previous.cancel();
        }

        let token = group_state.token.child_token();
        group_state.refresh_loop = Some(token.clone());

        core_async::spawn(run_refresh_loop(
            Arc::downgrade(&self.inner),
            group.to_string(),
            self.inner.config.refresh_interval,
            token,
        ));
    }
}

impl CacheInner {
    async fn fetch_one(&self, key: &CacheKey) -> Result<String> {
        let paths = [key.path.clone()];
        let mut urls = self
            .catalog
            .resolve_for_group(&key.group, Some(&paths[..]))
            .await?;

        urls.remove(&key.path)
            .ok_or_else(|| StreamingError::SegmentNotFound(key.to_string()))
    }

    /// Remove the in-flight marker (if it is still ours) and commit a
    /// successful, uncancelled result.
    fn settle(&self, key: &CacheKey, id: u64, token: &CancellationToken, result: &Result<String>) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if state.in_flight.get(key).map(|in_flight| in_flight.id) == Some(id) {
            state.in_flight.remove(key);
        }

        match result {
            Ok(url) if !token.is_cancelled() => {
                state.entries.insert(
                    key.clone(),
                    CachedUrl::new(url.clone(), now, self.config.validity_window),
                );
                debug!(key = %key, "Committed resolved URL");
            }
            Ok(_) => debug!(key = %key, "Discarded resolution for cleared group"),
            Err(e) => debug!(key = %key, error = %e, "Resolution failed"),
        }
    }

    /// Fetch every path of a group and commit unless `token` is cancelled.
    async fn resolve_group(&self, group: &str, token: &CancellationToken) -> Result<usize> {
        let urls: UrlMap = core_async::select! {
            _ = token.cancelled() => return Err(StreamingError::Cancelled),
            result = self.catalog.resolve_for_group(group, None) => result?,
        };

        let now = self.clock.now();
        let mut state = self.state.lock();

        // Checked under the lock: `clear` cancels under the same lock.
        if token.is_cancelled() {
            return Err(StreamingError::Cancelled);
        }

        let committed = urls.len();
        for (path, url) in urls {
            let key = CacheKey::new(group, &path);
            state
                .entries
                .insert(key, CachedUrl::new(url, now, self.config.validity_window));
        }

        Ok(committed)
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        for group_state in self.state.get_mut().groups.values() {
            group_state.token.cancel();
        }
    }
}

fn spawn_resolution(
    inner: &Arc<CacheInner>,
    key: CacheKey,
    id: u64,
    token: CancellationToken,
) -> SharedResolution {
    let inner = Arc::clone(inner);

    let handle = core_async::spawn(async move {
        let result = core_async::select! {
            _ = token.cancelled() => Err(StreamingError::Cancelled),
            result = inner.fetch_one(&key) => result,
        };
        inner.settle(&key, id, &token, &result);
        result
    });

    async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(StreamingError::Internal(format!(
                "resolution task failed: {}",
                e
            ))),
        }
    }
    .boxed()
    .shared()
}

/// Re-resolve a group every `interval` until cancelled or the cache is gone.
async fn run_refresh_loop(
    cache: Weak<CacheInner>,
    group: String,
    interval: Duration,
    token: CancellationToken,
) {
    debug!(group = %group, interval_secs = interval.as_secs(), "Background refresh started");

    loop {
        if token.is_cancelled() {
            break;
        }

        core_async::select! {
            _ = token.cancelled() => break,
            _ = sleep(interval) => {}
        }

        if token.is_cancelled() {
            break;
        }

        let Some(inner) = cache.upgrade() else {
            break;
        };

        match inner.resolve_group(&group, &token).await {
            Ok(refreshed) => debug!(group = %group, refreshed, "Background refresh completed"),
            Err(StreamingError::Cancelled) => break,
            Err(e) => warn!(group = %group, error = %e, "Background refresh failed; retrying next tick"),
        }
    }

    debug!(group = %group, "Background refresh stopped");
}
