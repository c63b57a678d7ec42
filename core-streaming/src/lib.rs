//! # Core Streaming
//!
//! Signed-URL relay for HLS playback from a storage backend that only hands
//! out short-lived download URLs.
//!
//! ## Overview
//!
//! Players see placeholder URIs of the form `cloudkit://<group>/<path>`. This
//! crate turns them into something playable:
//!
//! - [`cache`]: time-bounded URL cache with request de-duplication and
//!   per-group background refresh
//! - [`manifest`]: rewrites placeholder URIs in playlists to resolved URLs
//! - [`interceptor`]: answers player requests with rewritten manifests or
//!   redirects to signed segment URLs
//! - [`manifest_store`]: top-level manifests injected out of band
//!
//! Backend access goes through [`bridge_traits::catalog::AssetCatalog`];
//! manifest downloads go through [`bridge_traits::http::HttpClient`].

pub mod cache;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod manifest;
pub mod manifest_store;
pub mod reference;

pub use cache::{CacheConfig, CacheKey, CacheStats, CachedUrl, UrlCache};
pub use config::StreamConfig;
pub use error::{Result, StreamingError};
pub use interceptor::{
    pending_resource, ByteRange, PendingResource, ResourceContent, ResourceInterceptor,
    ResourceOutcome, ResourceRequest, ResourceResponder,
};
pub use manifest::{validate_manifest, GeneratedManifest, ManifestGenerator, ManifestStatus};
pub use manifest_store::ManifestStore;
pub use reference::AssetReference;
