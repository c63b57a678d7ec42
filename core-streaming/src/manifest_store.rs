//! Top-level manifests supplied out of band, keyed by asset group

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared store of injected top-level manifests.
///
/// Cheap to clone; all clones share one map.
#[derive(Clone, Default)]
pub struct ManifestStore {
    manifests: Arc<RwLock<HashMap<String, Arc<str>>>>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the manifest text for `group`.
    pub fn set(&self, group: impl Into<String>, text: impl Into<Arc<str>>) {
        let group = group.into();
        let text = text.into();
        debug!(group = %group, bytes = text.len(), "Manifest injected");
        self.manifests.write().insert(group, text);
    }

    pub fn get(&self, group: &str) -> Option<Arc<str>> {
        self.manifests.read().get(group).cloned()
    }

    /// Returns whether a manifest was removed.
    pub fn remove(&self, group: &str) -> bool {
        self.manifests.write().remove(group).is_some()
    }

    pub fn clear(&self) {
        self.manifests.write().clear();
    }

    pub fn contains(&self, group: &str) -> bool {
        self.manifests.read().contains_key(group)
    }

    /// Sorted group names with an injected manifest
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.manifests.read().keys().cloned().collect();
        groups.sort();
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replace_remove() {
        let store = ManifestStore::new();
        store.set("g1", "#EXTM3U\n");
        store.set("g1", "#EXTM3U\n#EXT-X-VERSION:7\n");
        store.set("g0", "#EXTM3U\n");

        assert_eq!(store.get("g1").as_deref(), Some("#EXTM3U\n#EXT-X-VERSION:7\n"));
        assert_eq!(store.groups(), vec!["g0".to_string(), "g1".to_string()]);

        assert!(store.remove("g1"));
        assert!(!store.remove("g1"));
        assert!(!store.contains("g1"));

        store.clear();
        assert!(store.groups().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let store = ManifestStore::new();
        let other = store.clone();
        other.set("g", "#EXTM3U\n");
        assert!(store.contains("g"));
    }
}
