//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`StreamingConfig`] into the streaming core:
//! the CloudKit catalog connector, the URL cache, the injected manifest store
//! and the resource interceptor. Hosts talk to [`StreamingCore`] only.
//!
//! Desktop apps typically enable the `desktop-shims` feature, which lets the
//! configuration builder fall back to the reqwest-backed HTTP client from
//! `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

pub use core_runtime::config::{StreamingConfig, StreamingConfigBuilder};
pub use core_runtime::logging::{LogFormat, LoggingConfig};
pub use core_streaming::{
    pending_resource, ByteRange, CacheStats, GeneratedManifest, ManifestStatus, PendingResource,
    ResourceContent, ResourceOutcome, ResourceRequest, ResourceResponder, StreamingError,
};

use core_runtime::logging::redact_if_sensitive;
use core_streaming::{
    validate_manifest, CacheConfig, ManifestStore, ResourceInterceptor, StreamConfig, UrlCache,
};
use provider_cloudkit::{CloudKitConfig, CloudKitConnector};
use std::sync::Arc;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
///
/// Cheap to clone; clones share one cache, one manifest store and one
/// interceptor.
#[derive(Clone)]
pub struct StreamingCore {
    connector: Arc<CloudKitConnector>,
    cache: UrlCache,
    manifests: ManifestStore,
    interceptor: ResourceInterceptor,
}

impl StreamingCore {
    /// Build the core from a configuration.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the configuration or one of the component
    /// configurations derived from it does not validate.
    pub fn new(config: StreamingConfig) -> Result<Self> {
        config.validate()?;

        let cache_config = CacheConfig::from(&config);
        cache_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let stream_config = StreamConfig::from(&config);
        stream_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let connector = CloudKitConnector::new(
            Arc::clone(&config.http_client),
            CloudKitConfig::new(config.catalog_url.as_str()),
        );
        if let Some(token) = &config.api_token {
            connector.configure(token.as_str());
        }
        let connector = Arc::new(connector);

        let cache = UrlCache::new(connector.clone(), cache_config);
        let manifests = ManifestStore::new();
        let interceptor = ResourceInterceptor::new(
            stream_config,
            cache.clone(),
            manifests.clone(),
            Arc::clone(&config.http_client),
        );

        info!(scheme = %config.scheme, "Streaming core initialized");

        Ok(Self {
            connector,
            cache,
            manifests,
            interceptor,
        })
    }

    /// Set the API token used for URL resolution.
    pub fn configure(&self, api_token: impl Into<String>) -> Result<()> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(CoreError::InvalidInput("API token cannot be blank".to_string()));
        }

        info!(
            api_token = %redact_if_sensitive("api_token", &api_token),
            "API token configured"
        );
        self.connector.configure(api_token);
        Ok(())
    }

    pub fn clear_credentials(&self) {
        self.connector.clear_credentials();
    }

    pub fn is_configured(&self) -> bool {
        self.connector.is_configured()
    }

    /// Supply the top-level manifest for `group` ahead of playback.
    pub fn set_manifest(&self, group: &str, text: impl Into<Arc<str>>) -> Result<()> {
        ensure_group(group)?;
        self.manifests.set(group, text);
        Ok(())
    }

    /// Returns whether a manifest was removed.
    pub fn clear_manifest(&self, group: &str) -> bool {
        self.manifests.remove(group)
    }

    pub fn clear_all_manifests(&self) {
        self.manifests.clear();
    }

    /// Resolve and cache every asset of `group`, then keep it fresh in the
    /// background until [`clear_cache`](Self::clear_cache).
    #[instrument(skip(self))]
    pub async fn prefetch(&self, group: &str) -> Result<usize> {
        ensure_group(group)?;
        Ok(self.cache.prefetch(group).await?)
    }

    pub fn clear_cache(&self, group: &str) {
        self.cache.clear(group);
    }

    pub fn clear_all_cache(&self) {
        self.cache.clear_all();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Cached URL for `(group, path)`, without touching the network.
    pub fn cached_url(&self, group: &str, path: &str) -> Option<String> {
        self.cache.lookup(group, path)
    }

    /// Cached URL for `(group, path)`, resolving through the backend on a
    /// miss.
    pub async fn resolve_url(&self, group: &str, path: &str) -> Result<String> {
        ensure_group(group)?;
        Ok(self.cache.resolve(group, path).await?)
    }

    /// Rewrite a manifest for `group` outside the request path.
    pub async fn generate_manifest(&self, text: &str, group: &str) -> GeneratedManifest {
        self.interceptor.generator().generate_with_report(text, group).await
    }

    pub fn validate_manifest(&self, text: &str) -> ManifestStatus {
        validate_manifest(text, &self.interceptor.config().scheme)
    }

    /// Offer a player request to the core. See
    /// [`ResourceInterceptor::intercept`].
    pub fn intercept(&self, request: ResourceRequest, responder: Box<dyn ResourceResponder>) -> bool {
        self.interceptor.intercept(request, responder)
    }

    /// Cancel outstanding requests and drop all cached state.
    pub fn shutdown(&self) {
        self.interceptor.shutdown();
        self.cache.clear_all();
        self.manifests.clear();
        info!("Streaming core shut down");
    }
}

/// Convenience bootstrapper for desktop hosts, using the reqwest-backed HTTP
/// client.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # fn example() -> core_service::Result<()> {
/// use core_service::bootstrap_desktop;
///
/// let core = bootstrap_desktop(
///     "https://api.apple-cloudkit.com/database/1/iCloud.com.example/production/public",
///     Some("api-token"),
/// )?;
/// assert!(core.is_configured());
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(catalog_url: &str, api_token: Option<&str>) -> Result<StreamingCore> {
    let mut builder = StreamingConfig::builder().catalog_url(catalog_url);
    if let Some(token) = api_token {
        builder = builder.api_token(token);
    }

    StreamingCore::new(builder.build()?)
}

/// [`bootstrap_desktop`], installing the global `tracing` subscriber first.
///
/// # Errors
///
/// `InitializationFailed` if logging was already initialized in this process
/// or the filter does not parse.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop_with_logging(
    catalog_url: &str,
    api_token: Option<&str>,
    logging: LoggingConfig,
) -> Result<StreamingCore> {
    core_runtime::logging::init_logging(logging)?;
    bootstrap_desktop(catalog_url, api_token)
}

fn ensure_group(group: &str) -> Result<()> {
    if group.trim().is_empty() || group.contains('/') {
        return Err(CoreError::InvalidInput(format!(
            "invalid asset group: {:?}",
            group
        )));
    }
    Ok(())
}
