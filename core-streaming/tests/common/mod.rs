//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::catalog::{AssetCatalog, RecordMap, UrlMap};
use bridge_traits::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory catalog: group → path → URL.
///
/// Counts every group resolution so tests can assert how many backend round
/// trips were made.
#[derive(Default)]
pub struct FakeCatalog {
    groups: Mutex<HashMap<String, HashMap<String, String>>>,
    resolve_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_asset(self: &Arc<Self>, group: &str, path: &str, url: &str) -> Arc<Self> {
        self.groups
            .lock()
            .entry(group.to_string())
            .or_default()
            .insert(path.to_string(), url.to_string());
        Arc::clone(self)
    }

    /// Fail the next `count` resolutions with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Hold every resolution for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Most resolutions ever running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AssetCatalog for FakeCatalog {
    async fn list_records(&self, group: &str, paths: Option<&[String]>) -> Result<RecordMap> {
        let groups = self.groups.lock();
        Ok(groups
            .get(group)
            .map(|assets| {
                assets
                    .keys()
                    .filter(|path| paths.map_or(true, |wanted| wanted.contains(path)))
                    .map(|path| (path.clone(), format!("{}:{}", group, path)))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn resolve_urls(&self, record_ids: &[String]) -> Result<UrlMap> {
        let groups = self.groups.lock();
        Ok(record_ids
            .iter()
            .filter_map(|id| {
                let (group, path) = id.split_once(':')?;
                let url = groups.get(group)?.get(path)?;
                Some((id.clone(), url.clone()))
            })
            .collect())
    }

    async fn resolve_for_group(&self, group: &str, paths: Option<&[String]>) -> Result<UrlMap> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.take_failure() {
            return Err(BridgeError::OperationFailed("catalog unavailable".to_string()));
        }

        let records = self.list_records(group, paths).await?;
        let ids: Vec<String> = records.values().cloned().collect();
        let urls = self.resolve_urls(&ids).await?;

        Ok(records
            .into_iter()
            .filter_map(|(path, id)| urls.get(&id).map(|url| (path, url.clone())))
            .collect())
    }
}
