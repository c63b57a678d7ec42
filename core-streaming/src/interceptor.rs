//! # Resource Interception
//!
//! Entry point for every player request under the placeholder scheme.
//!
//! `intercept` answers synchronously whether the request is ours. Accepted
//! requests run on their own task and finish their [`ResourceResponder`]
//! exactly once with one of:
//!
//! - [`ResourceOutcome::Content`]: a rewritten manifest served from memory
//! - [`ResourceOutcome::Redirect`]: a temporary redirect to a signed segment URL
//! - [`ResourceOutcome::Failed`]: a terminal error
//!
//! ## Dispatch
//!
//! ```text
//! <scheme>://<group>/<path>
//!        │
//!        ├─ path == top-level name ──▶ ManifestStore ──▶ generate ──▶ Content
//!        ├─ path ends in .m3u8 ──────▶ UrlCache ──▶ HTTP GET ──▶ generate ──▶ Content
//!        └─ anything else ───────────▶ lookup / refresh (retried) ──▶ Redirect
//! ```

use crate::cache::UrlCache;
use crate::config::StreamConfig;
use crate::error::{Result, StreamingError};
use crate::manifest::ManifestGenerator;
use crate::manifest_store::ManifestStore;
use crate::reference::{has_scheme, AssetReference};
use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_async::sync::{oneshot, CancellationToken};
use core_async::time::{linear_backoff, sleep};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Content type of served playlists
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Status used for segment redirects
pub const TEMPORARY_REDIRECT: u16 = 307;

/// Inclusive byte range requested by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Last byte, inclusive. `None` reads to the end.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Parse a `Range` header value of the form `bytes=<start>-[<end>]`.
    ///
    /// Suffix ranges (`bytes=-500`) and multi-range requests are not
    /// supported and yield `None`.
    pub fn parse_header(value: &str) -> Option<Self> {
        let ranges = value.trim().strip_prefix("bytes=")?;
        if ranges.contains(',') {
            return None;
        }

        let (start, end) = ranges.split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = match end.trim() {
            "" => None,
            end => Some(end.parse().ok()?),
        };

        match end {
            Some(end) if end < start => None,
            _ => Some(Self { start, end }),
        }
    }

    fn slice(&self, data: &Bytes) -> Bytes {
        let len = data.len();
        let start = usize::try_from(self.start).unwrap_or(usize::MAX).min(len);
        let end = match self.end {
            Some(end) => usize::try_from(end)
                .unwrap_or(usize::MAX)
                .saturating_add(1)
                .min(len),
            None => len,
        };

        if start >= end {
            Bytes::new()
        } else {
            data.slice(start..end)
        }
    }
}

/// A request from the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub url: String,
    pub byte_range: Option<ByteRange>,
}

impl ResourceRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            byte_range: None,
        }
    }

    pub fn with_byte_range(mut self, range: ByteRange) -> Self {
        self.byte_range = Some(range);
        self
    }
}

/// In-memory content handed back to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContent {
    /// The requested bytes (the whole document unless a range was asked for)
    pub data: Bytes,
    pub content_type: String,
    /// Length of the whole document in bytes
    pub content_length: u64,
    pub byte_range_access: bool,
}

impl ResourceContent {
    fn playlist(text: String, range: Option<ByteRange>) -> Self {
        let data = Bytes::from(text);
        let content_length = data.len() as u64;
        let data = match range {
            Some(range) => range.slice(&data),
            None => data,
        };

        Self {
            data,
            content_type: PLAYLIST_CONTENT_TYPE.to_string(),
            content_length,
            byte_range_access: true,
        }
    }
}

/// Terminal outcome of an accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOutcome {
    Content(ResourceContent),
    Redirect { status: u16, location: String },
    Failed(StreamingError),
}

impl ResourceOutcome {
    fn redirect(location: String) -> Self {
        ResourceOutcome::Redirect {
            status: TEMPORARY_REDIRECT,
            location,
        }
    }
}

/// Host-side handle for an accepted request.
///
/// `finish` consumes the responder, so each request completes once.
pub trait ResourceResponder: Send + 'static {
    fn finish(self: Box<Self>, outcome: ResourceOutcome);
}

impl<F> ResourceResponder for F
where
    F: FnOnce(ResourceOutcome) + Send + 'static,
{
    fn finish(self: Box<Self>, outcome: ResourceOutcome) {
        (*self)(outcome)
    }
}

struct ChannelResponder(oneshot::Sender<ResourceOutcome>);

impl ResourceResponder for ChannelResponder {
    fn finish(self: Box<Self>, outcome: ResourceOutcome) {
        // Receiver gone means nobody is waiting any more
        let _ = self.0.send(outcome);
    }
}

/// Awaitable side of [`pending_resource`].
pub struct PendingResource {
    receiver: oneshot::Receiver<ResourceOutcome>,
}

impl PendingResource {
    pub async fn wait(self) -> ResourceOutcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => ResourceOutcome::Failed(StreamingError::Internal(
                "responder dropped without an outcome".to_string(),
            )),
        }
    }
}

/// A responder paired with a future that yields its outcome.
pub fn pending_resource() -> (Box<dyn ResourceResponder>, PendingResource) {
    let (sender, receiver) = oneshot::channel();
    (
        Box::new(ChannelResponder(sender)),
        PendingResource { receiver },
    )
}

/// Services player requests under the placeholder scheme.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ResourceInterceptor {
    inner: Arc<InterceptorInner>,
}

struct InterceptorInner {
    config: StreamConfig,
    cache: UrlCache,
    generator: ManifestGenerator,
    manifests: ManifestStore,
    http_client: Arc<dyn HttpClient>,
    shutdown: CancellationToken,
}

impl ResourceInterceptor {
    pub fn new(
        config: StreamConfig,
        cache: UrlCache,
        manifests: ManifestStore,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        let generator = ManifestGenerator::new(cache.clone(), config.clone());
        Self {
            inner: Arc::new(InterceptorInner {
                config,
                cache,
                generator,
                manifests,
                http_client,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    pub fn generator(&self) -> &ManifestGenerator {
        &self.inner.generator
    }

    /// Accept or decline `request`.
    ///
    /// Returns `false` when the URL is not under the placeholder scheme; the
    /// responder is dropped untouched and the caller handles the request
    /// itself. Otherwise returns `true` and finishes `responder` later from a
    /// spawned task. Must be called from within the runtime.
    pub fn intercept(&self, request: ResourceRequest, responder: Box<dyn ResourceResponder>) -> bool {
        if !has_scheme(&request.url, &self.inner.config.scheme) {
            debug!(url = %redact_url(&request.url), "Declined request");
            return false;
        }

        let inner = Arc::clone(&self.inner);
        let token = inner.shutdown.child_token();

        core_async::spawn(async move {
            let outcome = if token.is_cancelled() {
                ResourceOutcome::Failed(StreamingError::Cancelled)
            } else {
                core_async::select! {
                    _ = token.cancelled() => ResourceOutcome::Failed(StreamingError::Cancelled),
                    outcome = inner.handle(&request) => outcome,
                }
            };

            match &outcome {
                ResourceOutcome::Content(content) => {
                    debug!(bytes = content.data.len(), "Served manifest")
                }
                ResourceOutcome::Redirect { location, .. } => {
                    debug!(location = %redact_url(location), "Redirected segment")
                }
                ResourceOutcome::Failed(e) => {
                    warn!(url = %redact_url(&request.url), error = %e, "Request failed")
                }
            }

            responder.finish(outcome);
        });

        true
    }

    /// Finish every outstanding and future request with `Cancelled`.
    pub fn shutdown(&self) {
        info!("Resource interceptor shutting down");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl InterceptorInner {
    async fn handle(&self, request: &ResourceRequest) -> ResourceOutcome {
        let reference = match AssetReference::parse(&request.url, &self.config.scheme) {
            Ok(reference) => reference,
            Err(e) => return ResourceOutcome::Failed(e),
        };

        let served = if reference.decoded_path() == self.config.top_level_manifest {
            self.injected_manifest(&reference.group).await
        } else if self.config.is_manifest_path(&reference.path) {
            self.nested_manifest(&reference).await
        } else {
            return self.redirect_segment(&reference).await;
        };

        match served {
            Ok(text) => ResourceOutcome::Content(ResourceContent::playlist(text, request.byte_range)),
            Err(e) => ResourceOutcome::Failed(e),
        }
    }

    async fn injected_manifest(&self, group: &str) -> Result<String> {
        let text = self.manifests.get(group).ok_or_else(|| {
            StreamingError::SegmentNotFound(format!("no manifest injected for group {}", group))
        })?;

        Ok(self.generator.generate(&text, group).await)
    }

    #[instrument(skip(self, reference), fields(group = %reference.group, path = %reference.path))]
    async fn nested_manifest(&self, reference: &AssetReference) -> Result<String> {
        let url = self.cache.resolve(&reference.group, &reference.path).await?;

        let response = self
            .http_client
            .execute(HttpRequest::get(url.as_str()))
            .await
            .map_err(|e| {
                // Host HTTP clients may echo the signed URL in their errors
                let reason = e.to_string().replace(url.as_str(), &redact_url(&url));
                StreamingError::DownloadFailed(format!("{}: {}", reference.path, reason))
            })?;

        if !response.is_success() {
            return Err(StreamingError::DownloadFailed(format!(
                "HTTP {} fetching {}",
                response.status, reference.path
            )));
        }

        let text = String::from_utf8(response.body.to_vec())
            .map_err(|e| StreamingError::DecodeFailed(format!("{}: {}", reference.path, e)))?;

        Ok(self.generator.generate(&text, &reference.group).await)
    }

    async fn redirect_segment(&self, reference: &AssetReference) -> ResourceOutcome {
        let group = reference.group.as_str();
        let path = reference.path.as_str();
        let attempts = self.config.segment_retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if let Some(url) = self.cache.lookup(group, path) {
                return ResourceOutcome::redirect(url);
            }

            match self.cache.refresh(group, path).await {
                Ok(url) => return ResourceOutcome::redirect(url),
                Err(StreamingError::Cancelled) => {
                    return ResourceOutcome::Failed(StreamingError::Cancelled)
                }
                Err(e) => {
                    warn!(group, path, attempt, error = %e, "Segment resolution failed");
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                sleep(linear_backoff(
                    self.config.segment_retry_backoff,
                    attempt,
                    self.config.max_segment_backoff,
                ))
                .await;
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());

        ResourceOutcome::Failed(StreamingError::DownloadFailed(format!(
            "{} after {} attempts: {}",
            path, attempts, reason
        )))
    }
}
