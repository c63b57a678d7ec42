//! Connector configuration

use std::time::Duration;

/// Settings for talking to one CloudKit database.
#[derive(Debug, Clone)]
pub struct CloudKitConfig {
    /// Database base URL, e.g.
    /// `https://api.apple-cloudkit.com/database/1/<container>/production/public`
    pub base_url: String,

    /// Record type holding one stream file per record
    pub record_type: String,

    /// Field holding the asset group identifier
    pub group_field: String,

    /// Field holding the relative path within the group
    pub path_field: String,

    /// Asset field carrying the signed download URL
    pub asset_field: String,

    /// Header carrying the API token
    pub token_header: String,

    /// `resultsLimit` per query page (CloudKit caps this at 200)
    pub page_size: u32,

    /// Record ids per lookup call
    pub max_lookup_batch: usize,

    /// Attempts per API call for 429 / 5xx / transport failures
    pub max_retries: u32,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl CloudKitConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            record_type: "StreamFile".to_string(),
            group_field: "assetGroup".to_string(),
            path_field: "relativePath".to_string(),
            asset_field: "asset".to_string(),
            token_header: "X-CloudKit-Api-Token".to_string(),
            page_size: 200,
            max_lookup_batch: 200,
            max_retries: 3,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = record_type.into();
        self
    }

    pub fn with_fields(
        mut self,
        group_field: impl Into<String>,
        path_field: impl Into<String>,
        asset_field: impl Into<String>,
    ) -> Self {
        self.group_field = group_field.into();
        self.path_field = path_field.into();
        self.asset_field = asset_field.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 200);
        self
    }

    pub fn with_max_lookup_batch(mut self, batch: usize) -> Self {
        self.max_lookup_batch = batch.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub(crate) fn endpoint(&self, operation: &str) -> String {
        format!("{}/records/{}", self.base_url, operation)
    }
}
