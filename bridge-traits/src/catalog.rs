//! Asset Catalog Abstraction
//!
//! The streaming core never talks to a storage backend directly. It needs two
//! capabilities, both expressed here:
//!
//! - a record query: asset group (optionally narrowed to a set of relative
//!   paths) → `relative path → opaque record id`
//! - a batch URL resolution: record ids → time-limited signed download URLs
//!
//! Backends that paginate must hide that behind `list_records`; backends that
//! cap batch sizes must hide that behind `resolve_urls`.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// Relative path → opaque record identifier.
pub type RecordMap = HashMap<String, String>;

/// Key (record id or relative path) → signed download URL.
pub type UrlMap = HashMap<String, String>;

/// Remote catalog of resolvable media records.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::AssetCatalog;
///
/// async fn warm(catalog: &dyn AssetCatalog) -> Result<()> {
///     let urls = catalog.resolve_for_group("trailer-01", None).await?;
///     for (path, url) in urls {
///         println!("{path} -> {url}");
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// List `relative path → record id` pairs for an asset group.
    ///
    /// `paths` narrows the query to the given relative paths. An empty map is
    /// a valid answer. A failure on any page aborts the whole listing.
    async fn list_records(&self, group: &str, paths: Option<&[String]>) -> Result<RecordMap>;

    /// Resolve record ids to signed download URLs, keyed by record id.
    ///
    /// Records whose asset payload is missing or malformed are omitted rather
    /// than failing the batch.
    async fn resolve_urls(&self, record_ids: &[String]) -> Result<UrlMap>;

    /// Resolve relative paths of a group to signed URLs, keyed by path.
    async fn resolve_for_group(&self, group: &str, paths: Option<&[String]>) -> Result<UrlMap> {
        let records = self.list_records(group, paths).await?;
        if records.is_empty() {
            return Ok(UrlMap::new());
        }

        let record_ids: Vec<String> = records.values().cloned().collect();
        let by_record = self.resolve_urls(&record_ids).await?;

        Ok(records
            .into_iter()
            .filter_map(|(path, record_id)| by_record.get(&record_id).map(|url| (path, url.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct StaticCatalog {
        records: RecordMap,
        urls: UrlMap,
        resolve_calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl AssetCatalog for StaticCatalog {
        async fn list_records(&self, _group: &str, paths: Option<&[String]>) -> Result<RecordMap> {
            Ok(self
                .records
                .iter()
                .filter(|(path, _)| paths.map_or(true, |p| p.contains(path)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        }

        async fn resolve_urls(&self, record_ids: &[String]) -> Result<UrlMap> {
            self.resolve_calls.lock().push(record_ids.to_vec());
            Ok(record_ids
                .iter()
                .filter_map(|id| self.urls.get(id).map(|url| (id.clone(), url.clone())))
                .collect())
        }
    }

    fn catalog() -> StaticCatalog {
        let mut records = RecordMap::new();
        records.insert("720p/prog_index.m3u8".into(), "rec-1".into());
        records.insert("720p/seg0.ts".into(), "rec-2".into());
        records.insert("init.mp4".into(), "rec-3".into());

        let mut urls = UrlMap::new();
        urls.insert("rec-1".into(), "https://cdn.example/abc".into());
        urls.insert("rec-2".into(), "https://cdn.example/seg0".into());

        StaticCatalog {
            records,
            urls,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_for_group_maps_back_to_paths() {
        let catalog = catalog();
        let urls = catalog.resolve_for_group("group1", None).await.unwrap();

        assert_eq!(urls.len(), 2);
        assert_eq!(urls["720p/prog_index.m3u8"], "https://cdn.example/abc");
        assert_eq!(urls["720p/seg0.ts"], "https://cdn.example/seg0");
        // rec-3 has no asset URL and is skipped
        assert!(!urls.contains_key("init.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_for_group_skips_lookup_when_no_records() {
        let catalog = catalog();
        let paths = vec!["missing.ts".to_string()];
        let urls = catalog.resolve_for_group("group1", Some(paths.as_slice())).await.unwrap();

        assert!(urls.is_empty());
        assert!(catalog.resolve_calls.lock().is_empty());
    }
}
