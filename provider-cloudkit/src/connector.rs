//! CloudKit Web Services connector implementation
//!
//! Implements the `AssetCatalog` trait on top of `records/query` and
//! `records/lookup`.

use async_trait::async_trait;
use bridge_traits::catalog::{AssetCatalog, RecordMap, UrlMap};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use core_async::time::{exponential_backoff, sleep};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::CloudKitConfig;
use crate::error::CloudKitError;
use crate::types::{
    Filter, LookupRequest, LookupResponse, Query, QueryRequest, QueryResponse, Record, RecordRef,
};

/// Placeholder CloudKit leaves in download URLs for the file name
const FILE_NAME_TEMPLATE: &str = "${f}";

/// Upper bound on query pages followed for one listing
const MAX_QUERY_PAGES: usize = 500;

/// CloudKit Web Services connector
///
/// Implements `AssetCatalog` for a public CloudKit database.
///
/// # Features
///
/// - Query filtered by asset group (and optionally a path set), following
///   continuation markers until exhausted
/// - Batched lookups of record ids to signed asset URLs
/// - API token configurable at runtime
/// - Exponential backoff for rate limiting and server errors
///
/// # Example
///
/// ```ignore
/// use provider_cloudkit::{CloudKitConfig, CloudKitConnector};
/// use bridge_traits::catalog::AssetCatalog;
///
/// let connector = CloudKitConnector::new(http_client, CloudKitConfig::new(base_url));
/// connector.configure("api-token");
/// let urls = connector.resolve_for_group("album-1", None).await?;
/// ```
pub struct CloudKitConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    config: CloudKitConfig,

    /// API token for lookups; `None` until configured
    api_token: RwLock<Option<String>>,
}

impl CloudKitConnector {
    /// Create a new connector without credentials
    pub fn new(http_client: Arc<dyn HttpClient>, config: CloudKitConfig) -> Self {
        Self {
            http_client,
            config,
            api_token: RwLock::new(None),
        }
    }

    /// Create a connector with an API token already set
    pub fn with_api_token(self, token: impl Into<String>) -> Self {
        self.configure(token);
        self
    }

    /// Set or replace the API token
    pub fn configure(&self, token: impl Into<String>) {
        *self.api_token.write() = Some(token.into());
        info!("CloudKit API token configured");
    }

    /// Forget the API token; subsequent lookups fail with `CredentialMissing`
    pub fn clear_credentials(&self) {
        *self.api_token.write() = None;
        info!("CloudKit API token cleared");
    }

    pub fn is_configured(&self) -> bool {
        self.api_token.read().is_some()
    }

    pub fn config(&self) -> &CloudKitConfig {
        &self.config
    }

    fn api_token(&self) -> Option<String> {
        self.api_token.read().clone()
    }

    /// Substitute CloudKit's `${f}` file name template with the record's
    /// file name.
    fn finalize_url(&self, url: String, record: &Record) -> String {
        if !url.contains(FILE_NAME_TEMPLATE) {
            return url;
        }

        let file_name = record
            .string_field(&self.config.path_field)
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .or(record.record_name.as_deref())
            .unwrap_or("file");

        url.replace(FILE_NAME_TEMPLATE, &urlencoding::encode(file_name))
    }

    /// POST a JSON body with retry logic
    ///
    /// Implements exponential backoff for rate limiting and transient errors,
    /// making at most `max_retries` HTTP attempts in total.
    #[instrument(skip(self, body), fields(url = %url))]
    async fn post_with_retry<B: Serialize + Sync>(
        &self,
        url: String,
        body: &B,
    ) -> std::result::Result<HttpResponse, CloudKitError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            let mut request = HttpRequest::post(url.clone())
                .header("Accept", "application/json")
                .timeout(self.config.request_timeout)
                .json(body)?;

            if let Some(token) = self.api_token() {
                request = request.header(self.config.token_header.clone(), token);
            }

            // This loop owns retries; the client makes one attempt per call
            match self
                .http_client
                .execute_with_retry(request, RetryPolicy::no_retry())
                .await
            {
                Ok(response) => {
                    let status = response.status;

                    if response.is_success() {
                        debug!(status, "API request succeeded");
                        return Ok(response);
                    } else if status == 429 || response.is_server_error() {
                        attempt += 1;
                        if attempt >= max_retries {
                            warn!(status, attempts = attempt, "API request failed after retries");
                            return Err(CloudKitError::ApiError {
                                status_code: status,
                                message: format!("Request failed after {} attempts", attempt),
                            });
                        }

                        let backoff = retry_backoff(attempt);
                        warn!(
                            status,
                            attempt,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            "API request failed, retrying"
                        );
                        sleep(backoff).await;
                    } else if status == 401 || status == 403 {
                        warn!(status, "API token rejected");
                        return Err(CloudKitError::AuthenticationFailed {
                            status_code: status,
                            message: String::from_utf8_lossy(&response.body).to_string(),
                        });
                    } else {
                        // Client error - don't retry
                        warn!(status, "API request failed");
                        return Err(CloudKitError::ApiError {
                            status_code: status,
                            message: String::from_utf8_lossy(&response.body).to_string(),
                        });
                    }
                }
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= max_retries {
                        warn!(error = %e, attempts = attempt, "API request failed after retries");
                        return Err(e.into());
                    }

                    let backoff = retry_backoff(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "API request failed, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn query_page(
        &self,
        group: &str,
        paths: Option<&[String]>,
        continuation_marker: Option<String>,
    ) -> std::result::Result<QueryResponse, CloudKitError> {
        let mut filter_by = vec![Filter::equals(&self.config.group_field, group)];
        if let Some(paths) = paths {
            filter_by.push(Filter::one_of(&self.config.path_field, paths));
        }

        let body = QueryRequest {
            query: Query {
                record_type: self.config.record_type.clone(),
                filter_by,
            },
            results_limit: self.config.page_size,
            desired_keys: vec![self.config.path_field.clone()],
            continuation_marker,
        };

        let response = self
            .post_with_retry(self.config.endpoint("query"), &body)
            .await?;

        serde_json::from_slice(&response.body).map_err(|e| {
            CloudKitError::ParseError(format!("Failed to parse query response: {}", e))
        })
    }

    async fn lookup_batch(&self, record_ids: &[String]) -> std::result::Result<UrlMap, CloudKitError> {
        let body = LookupRequest {
            records: record_ids
                .iter()
                .map(|id| RecordRef {
                    record_name: id.clone(),
                })
                .collect(),
            desired_keys: vec![
                self.config.asset_field.clone(),
                self.config.path_field.clone(),
            ],
        };

        let response = self
            .post_with_retry(self.config.endpoint("lookup"), &body)
            .await?;

        let lookup: LookupResponse = serde_json::from_slice(&response.body).map_err(|e| {
            CloudKitError::ParseError(format!("Failed to parse lookup response: {}", e))
        })?;

        let mut urls = UrlMap::with_capacity(lookup.records.len());
        for record in lookup.records {
            let Some(record_name) = record.record_name.clone() else {
                continue;
            };

            if record.is_error() {
                debug!(
                    record = %record_name,
                    code = record.server_error_code.as_deref().unwrap_or_default(),
                    "Skipping record with server error"
                );
                continue;
            }

            match record.download_url(&self.config.asset_field) {
                Some(url) => {
                    let url = self.finalize_url(url, &record);
                    urls.insert(record_name, url);
                }
                None => debug!(record = %record_name, "Skipping record without asset URL"),
            }
        }

        Ok(urls)
    }
}

fn retry_backoff(attempt: u32) -> Duration {
    exponential_backoff(Duration::from_millis(200), attempt, Duration::from_secs(5))
}

#[async_trait]
impl AssetCatalog for CloudKitConnector {
    #[instrument(skip(self, paths), fields(group = %group, paths = paths.map(|p| p.len())))]
    async fn list_records(&self, group: &str, paths: Option<&[String]>) -> Result<RecordMap> {
        if matches!(paths, Some(p) if p.is_empty()) {
            return Ok(RecordMap::new());
        }

        let mut records = RecordMap::new();
        let mut marker = None;
        let mut seen_markers = HashSet::new();
        let mut pages = 0;

        loop {
            let page = self.query_page(group, paths, marker).await?;
            pages += 1;

            for record in page.records {
                if record.is_error() {
                    continue;
                }
                let (Some(record_name), Some(path)) = (
                    record.record_name.as_deref(),
                    record.string_field(&self.config.path_field),
                ) else {
                    continue;
                };
                records.insert(path.to_string(), record_name.to_string());
            }

            let next = match page.continuation_marker {
                Some(next) if !next.is_empty() => next,
                _ => break,
            };

            if !seen_markers.insert(next.clone()) {
                warn!(pages, "Query returned a continuation marker twice");
                return Err(CloudKitError::ParseError(
                    "continuation marker repeated".to_string(),
                )
                .into());
            }
            if pages >= MAX_QUERY_PAGES {
                warn!(pages, "Query exceeded page limit");
                return Err(CloudKitError::ParseError(format!(
                    "query did not finish within {} pages",
                    MAX_QUERY_PAGES
                ))
                .into());
            }
            marker = Some(next);
        }

        info!(records = records.len(), pages, "Listed CloudKit records");
        Ok(records)
    }

    #[instrument(skip(self, record_ids), fields(count = record_ids.len()))]
    async fn resolve_urls(&self, record_ids: &[String]) -> Result<UrlMap> {
        if !self.is_configured() {
            return Err(CloudKitError::CredentialMissing.into());
        }

        let mut urls = UrlMap::with_capacity(record_ids.len());
        for batch in record_ids.chunks(self.config.max_lookup_batch) {
            urls.extend(self.lookup_batch(batch).await?);
        }

        info!(requested = record_ids.len(), resolved = urls.len(), "Resolved asset URLs");
        Ok(urls)
    }
}
