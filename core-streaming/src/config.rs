//! Protocol configuration for manifest rewriting and request interception

use core_runtime::config::StreamingConfig;
use std::time::Duration;

/// How placeholder URIs look and how segment requests are retried.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Placeholder scheme, without `://` (default: `cloudkit`)
    pub scheme: String,

    /// Name of the injected top-level manifest (default: `master.m3u8`)
    pub top_level_manifest: String,

    /// Extension of nested manifests, without the dot
    pub manifest_extension: String,

    /// Extensions treated as media segments on bare reference lines
    pub segment_extensions: Vec<String>,

    /// Resolution attempts per segment request (default: 3)
    pub segment_retry_attempts: u32,

    /// Backoff unit between attempts, multiplied by the attempt number
    pub segment_retry_backoff: Duration,

    /// Upper bound for a single backoff sleep
    pub max_segment_backoff: Duration,

    /// Placeholder resolutions a single rewrite keeps in flight (default: 8)
    pub max_concurrent_resolutions: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            scheme: "cloudkit".to_string(),
            top_level_manifest: "master.m3u8".to_string(),
            manifest_extension: "m3u8".to_string(),
            segment_extensions: ["ts", "m4s", "mp4", "m4a", "aac", "vtt", "webvtt"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            segment_retry_attempts: 3,
            segment_retry_backoff: Duration::from_millis(500),
            max_segment_backoff: Duration::from_secs(5),
            max_concurrent_resolutions: 8,
        }
    }
}

impl From<&StreamingConfig> for StreamConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            scheme: config.scheme.clone(),
            top_level_manifest: config.top_level_manifest.clone(),
            segment_retry_attempts: config.segment_retry_attempts,
            segment_retry_backoff: config.segment_retry_backoff,
            ..Self::default()
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_top_level_manifest(mut self, name: impl Into<String>) -> Self {
        self.top_level_manifest = name.into();
        self
    }

    pub fn with_segment_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segment_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_segment_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.segment_retry_attempts = attempts;
        self.segment_retry_backoff = backoff;
        self
    }

    pub fn with_max_concurrent_resolutions(mut self, limit: usize) -> Self {
        self.max_concurrent_resolutions = limit;
        self
    }

    /// `<scheme>://`
    pub fn scheme_prefix(&self) -> String {
        format!("{}://", self.scheme)
    }

    /// Whether `path` names a nested manifest
    pub fn is_manifest_path(&self, path: &str) -> bool {
        has_extension(path, &self.manifest_extension)
    }

    /// Whether `path` names a media segment with a known extension
    pub fn is_segment_path(&self, path: &str) -> bool {
        self.segment_extensions
            .iter()
            .any(|ext| has_extension(path, ext))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.scheme.is_empty() {
            return Err("scheme cannot be empty".to_string());
        }

        if self.top_level_manifest.is_empty() {
            return Err("top_level_manifest cannot be empty".to_string());
        }

        if self.segment_retry_attempts == 0 {
            return Err("segment_retry_attempts must be at least 1".to_string());
        }

        if self.max_concurrent_resolutions == 0 {
            return Err("max_concurrent_resolutions must be at least 1".to_string());
        }

        Ok(())
    }
}

fn has_extension(path: &str, extension: &str) -> bool {
    // Ignore any query string a placeholder might carry
    let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or(path);
    match path.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(extension),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.scheme_prefix(), "cloudkit://");
        assert_eq!(config.segment_retry_attempts, 3);
        assert_eq!(config.segment_retry_backoff, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_classification() {
        let config = StreamConfig::default();

        assert!(config.is_manifest_path("720p/prog_index.m3u8"));
        assert!(config.is_manifest_path("720p/PROG_INDEX.M3U8"));
        assert!(!config.is_manifest_path("720p/seg_0.ts"));

        assert!(config.is_segment_path("720p/seg_0.ts"));
        assert!(config.is_segment_path("init.mp4"));
        assert!(config.is_segment_path("subs/en.vtt?lang=en"));
        assert!(!config.is_segment_path("notes.txt"));
        assert!(!config.is_segment_path(".ts"));
    }

    #[test]
    fn test_config_validation() {
        assert!(StreamConfig::default().with_scheme("").validate().is_err());
        assert!(StreamConfig::default()
            .with_segment_retry(0, Duration::from_millis(1))
            .validate()
            .is_err());
        assert!(StreamConfig::default()
            .with_max_concurrent_resolutions(0)
            .validate()
            .is_err());
    }
}
