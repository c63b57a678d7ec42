//! # Streaming Configuration Module
//!
//! Provides configuration management for the streaming core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `StreamingConfig` instance that holds the host capabilities and the
//! settings shared by every component (placeholder scheme, cache timing,
//! segment retry budget, asset catalog location). It enforces fail-fast
//! validation so misconfiguration surfaces at startup instead of as a
//! playback failure.
//!
//! ## Required Settings
//!
//! - `catalog_url` - Base URL of the asset catalog (CloudKit database path)
//!
//! ## Capabilities (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest). Without the
//!   `desktop-shims` feature the host must inject one.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::StreamingConfig;
//! use std::time::Duration;
//!
//! let config = StreamingConfig::builder()
//!     .catalog_url("https://api.apple-cloudkit.com/database/1/iCloud.com.example/production/public")
//!     .api_token("ck-api-token")
//!     .refresh_interval(Duration::from_secs(30 * 60))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::StreamingConfig;
//!
//! // The catalog location is mandatory
//! let config = StreamingConfig::builder()
//!     .build()
//!     .expect("Should fail - missing catalog url");
//! ```

use crate::error::{Error, Result};
use bridge_traits::HttpClient;
use std::sync::Arc;
use std::time::Duration;

/// Default placeholder scheme (`cloudkit://<group>/<path>`).
pub const DEFAULT_SCHEME: &str = "cloudkit";

/// Default name of the injected top-level playlist.
pub const DEFAULT_TOP_LEVEL_MANIFEST: &str = "master.m3u8";

/// Signed URLs are treated as valid for this long after being resolved.
pub const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(50 * 60);

/// Background refresh cadence per active asset group.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(40 * 60);

/// Streaming core configuration.
///
/// Use [`StreamingConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct StreamingConfig {
    /// Base URL of the asset catalog database
    pub catalog_url: String,

    /// API token for the batch lookup endpoint. Can also be supplied later
    /// through the service's `configure` call.
    pub api_token: Option<String>,

    /// Placeholder URI scheme, without `://`
    pub scheme: String,

    /// File name of the injected top-level manifest
    pub top_level_manifest: String,

    /// How long a resolved URL is served from cache
    pub validity_window: Duration,

    /// How often an active group is re-resolved in the background
    pub refresh_interval: Duration,

    /// Resolution attempts per segment request before failing it
    pub segment_retry_attempts: u32,

    /// Base backoff between segment attempts (multiplied by attempt number)
    pub segment_retry_backoff: Duration,

    /// HTTP client used for catalog calls and nested manifest downloads
    pub http_client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for StreamingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingConfig")
            .field("catalog_url", &self.catalog_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("scheme", &self.scheme)
            .field("top_level_manifest", &self.top_level_manifest)
            .field("validity_window", &self.validity_window)
            .field("refresh_interval", &self.refresh_interval)
            .field("segment_retry_attempts", &self.segment_retry_attempts)
            .field("segment_retry_backoff", &self.segment_retry_backoff)
            .field("http_client", &"HttpClient { ... }")
            .finish()
    }
}

impl StreamingConfig {
    /// Creates a new builder for constructing a `StreamingConfig`.
    pub fn builder() -> StreamingConfigBuilder {
        StreamingConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The catalog URL is an http(s) URL
    /// - The scheme is a valid URI scheme and not `http`/`https`
    /// - The top-level manifest name is a playlist file name
    /// - Cache timing is consistent (refresh strictly inside the window)
    /// - At least one segment attempt is allowed
    pub fn validate(&self) -> Result<()> {
        if !(self.catalog_url.starts_with("https://") || self.catalog_url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "Catalog URL must be an http(s) URL, got '{}'",
                self.catalog_url
            )));
        }

        validate_scheme(&self.scheme)?;

        if self.top_level_manifest.is_empty()
            || self.top_level_manifest.contains('/')
            || !self.top_level_manifest.ends_with(".m3u8")
        {
            return Err(Error::Config(format!(
                "Top-level manifest must be a bare .m3u8 file name, got '{}'",
                self.top_level_manifest
            )));
        }

        if let Some(token) = &self.api_token {
            if token.trim().is_empty() {
                return Err(Error::Config("API token cannot be empty".to_string()));
            }
        }

        if self.validity_window.is_zero() {
            return Err(Error::Config(
                "Validity window must be greater than zero".to_string(),
            ));
        }

        if self.refresh_interval.is_zero() || self.refresh_interval >= self.validity_window {
            return Err(Error::Config(format!(
                "Refresh interval ({}s) must be non-zero and shorter than the validity window ({}s)",
                self.refresh_interval.as_secs(),
                self.validity_window.as_secs()
            )));
        }

        if self.segment_retry_attempts == 0 {
            return Err(Error::Config(
                "Segment retry attempts must be at least 1".to_string(),
            ));
        }

        if self.segment_retry_attempts > 10 {
            return Err(Error::Config(
                "Segment retry attempts exceeds maximum of 10".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_scheme(scheme: &str) -> Result<()> {
    let mut chars = scheme.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    };

    if !valid {
        return Err(Error::Config(format!("Invalid URI scheme '{}'", scheme)));
    }

    if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
        return Err(Error::Config(
            "Placeholder scheme must not be http or https".to_string(),
        ));
    }

    Ok(())
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for catalog calls and manifest downloads. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Mobile: inject a client backed by URLSession/OkHttp."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Failed to create default ReqwestHttpClient: {}", e),
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for constructing [`StreamingConfig`] instances.
#[derive(Default)]
pub struct StreamingConfigBuilder {
    catalog_url: Option<String>,
    api_token: Option<String>,
    scheme: Option<String>,
    top_level_manifest: Option<String>,
    validity_window: Option<Duration>,
    refresh_interval: Option<Duration>,
    segment_retry_attempts: Option<u32>,
    segment_retry_backoff: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl StreamingConfigBuilder {
    /// Sets the asset catalog base URL (required).
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::StreamingConfig;
    ///
    /// let builder = StreamingConfig::builder()
    ///     .catalog_url("https://api.apple-cloudkit.com/database/1/iCloud.com.example/production/public");
    /// ```
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Sets the initial API token.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the placeholder scheme.
    ///
    /// Default: `cloudkit`
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Sets the top-level manifest file name.
    ///
    /// Default: `master.m3u8`
    pub fn top_level_manifest(mut self, name: impl Into<String>) -> Self {
        self.top_level_manifest = Some(name.into());
        self
    }

    /// Sets how long resolved URLs stay valid in cache.
    ///
    /// Default: 50 minutes
    pub fn validity_window(mut self, window: Duration) -> Self {
        self.validity_window = Some(window);
        self
    }

    /// Sets the background refresh interval.
    ///
    /// Default: 40 minutes. Must be shorter than the validity window.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Sets the number of resolution attempts per segment request.
    ///
    /// Default: 3
    pub fn segment_retry_attempts(mut self, attempts: u32) -> Self {
        self.segment_retry_attempts = Some(attempts);
        self
    }

    /// Sets the base backoff between segment attempts.
    ///
    /// Default: 500ms
    pub fn segment_retry_backoff(mut self, backoff: Duration) -> Self {
        self.segment_retry_backoff = Some(backoff);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the final `StreamingConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(StreamingConfig)` on success, or an error if:
    /// - The catalog URL is missing
    /// - No `HttpClient` was provided and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<StreamingConfig> {
        let catalog_url = self.catalog_url.ok_or_else(|| {
            Error::Config("Catalog URL is required. Use .catalog_url() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = StreamingConfig {
            catalog_url,
            api_token: self.api_token,
            scheme: self.scheme.unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
            top_level_manifest: self
                .top_level_manifest
                .unwrap_or_else(|| DEFAULT_TOP_LEVEL_MANIFEST.to_string()),
            validity_window: self.validity_window.unwrap_or(DEFAULT_VALIDITY_WINDOW),
            refresh_interval: self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL),
            segment_retry_attempts: self.segment_retry_attempts.unwrap_or(3),
            segment_retry_backoff: self
                .segment_retry_backoff
                .unwrap_or(Duration::from_millis(500)),
            http_client,
        };

        config.validate()?;

        Ok(config)
    }
}
