//! # Manifest Rewriting
//!
//! Replaces placeholder URIs in an HLS playlist with resolved URLs.
//!
//! The rewriter is a line and attribute scanner, not a playlist parser. Three
//! line shapes are recognized:
//!
//! - **Bare reference**: the trimmed line is a placeholder ending in the
//!   manifest extension or a segment extension. The whole line becomes the
//!   resolved URL.
//! - **Tag with `URI="..."`**: every quoted `URI` value that is a placeholder
//!   is replaced in place. Everything else on the line is kept byte-for-byte.
//!   `#EXT-X-MAP` and `#EXT-X-KEY` carry one such attribute, `#EXT-X-MEDIA`
//!   style tags may carry more.
//! - **Passthrough**: anything else.
//!
//! Line terminators are preserved per line, so a document without
//! placeholders is returned unchanged.

use crate::cache::UrlCache;
use crate::config::StreamConfig;
use crate::reference::{has_scheme, AssetReference};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use tracing::{debug, instrument, warn};

const URI_ATTRIBUTE: &str = "URI=\"";

/// Result of a rewrite, with the placeholders that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedManifest {
    pub text: String,
    /// Number of placeholder occurrences replaced
    pub resolved: usize,
    /// Placeholder URIs left in place, sorted and de-duplicated
    pub unresolved: Vec<String>,
}

impl GeneratedManifest {
    /// Whether every placeholder in the document was replaced
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Diagnostic classification of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    /// Only resolved URLs
    StreamingReady,
    /// Only placeholders
    NotConverted,
    /// Both
    Mixed,
    NoUrlsFound,
}

/// Classify `text` by counting lines that start with `http(s)://` versus
/// lines that start with `<scheme>://`.
pub fn validate_manifest(text: &str, scheme: &str) -> ManifestStatus {
    let mut resolved = 0usize;
    let mut placeholders = 0usize;

    for line in text.lines().map(str::trim) {
        if line.starts_with("https://") || line.starts_with("http://") {
            resolved += 1;
        } else if has_scheme(line, scheme) {
            placeholders += 1;
        }
    }

    match (resolved, placeholders) {
        (0, 0) => ManifestStatus::NoUrlsFound,
        (_, 0) => ManifestStatus::StreamingReady,
        (0, _) => ManifestStatus::NotConverted,
        _ => ManifestStatus::Mixed,
    }
}

/// Rewrites manifests against a [`UrlCache`].
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ManifestGenerator {
    cache: UrlCache,
    config: StreamConfig,
}

impl ManifestGenerator {
    pub fn new(cache: UrlCache, config: StreamConfig) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &UrlCache {
        &self.cache
    }

    /// Rewrite `text` for `group`. Never fails; placeholders that cannot be
    /// resolved are left as written.
    pub async fn generate(&self, text: &str, group: &str) -> String {
        self.generate_with_report(text, group).await.text
    }

    /// Like [`generate`](Self::generate), also reporting what was left
    /// unresolved.
    ///
    /// Every distinct placeholder is resolved once through
    /// `UrlCache::resolve` under `group`, with at most
    /// `max_concurrent_resolutions` lookups in flight.
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn generate_with_report(&self, text: &str, group: &str) -> GeneratedManifest {
        let lines: Vec<ScannedLine<'_>> = text
            .split_inclusive('\n')
            .map(|raw| self.scan_line(raw))
            .collect();

        let placeholders: BTreeSet<&str> = lines
            .iter()
            .flat_map(|line| line.occurrences.iter().map(move |range| &line.content[range.clone()]))
            .collect();

        if placeholders.is_empty() {
            return GeneratedManifest {
                text: text.to_string(),
                resolved: 0,
                unresolved: Vec::new(),
            };
        }

        let resolutions = self.resolve_all(&placeholders, group).await;

        let mut output = String::with_capacity(text.len());
        let mut resolved = 0;
        for line in &lines {
            let mut content = line.content.to_string();
            // Back to front so earlier ranges stay valid
            for range in line.occurrences.iter().rev() {
                if let Some(Some(url)) = resolutions.get(&line.content[range.clone()]) {
                    content.replace_range(range.clone(), url);
                    resolved += 1;
                }
            }
            output.push_str(&content);
            output.push_str(line.terminator);
        }

        let unresolved: Vec<String> = resolutions
            .iter()
            .filter(|(_, url)| url.is_none())
            .map(|(placeholder, _)| placeholder.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if !unresolved.is_empty() {
            warn!(
                unresolved = unresolved.len(),
                "Manifest rewritten with placeholders left in place"
            );
        }
        debug!(resolved, "Manifest rewritten");

        GeneratedManifest {
            text: output,
            resolved,
            unresolved,
        }
    }

    async fn resolve_all<'a>(
        &self,
        placeholders: &BTreeSet<&'a str>,
        group: &str,
    ) -> HashMap<&'a str, Option<String>> {
        let lookups = placeholders.iter().map(|&placeholder| async move {
            let url = match AssetReference::parse(placeholder, &self.config.scheme) {
                Ok(reference) => match self.cache.resolve(group, &reference.path).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        debug!(path = %reference.path, error = %e, "Placeholder not resolved");
                        None
                    }
                },
                Err(e) => {
                    debug!(error = %e, "Malformed placeholder left in place");
                    None
                }
            };
            (placeholder, url)
        });
        // Collected up front so the stream does not hold the mapping closure;
        // works around rustc's higher-ranked `Send` inference failure.
        let lookups: Vec<_> = lookups.collect();

        stream::iter(lookups)
            .buffer_unordered(self.config.max_concurrent_resolutions.max(1))
            .collect()
            .await
    }

    fn scan_line<'a>(&self, raw: &'a str) -> ScannedLine<'a> {
        let (content, terminator) = split_terminator(raw);
        let trimmed = content.trim();

        let occurrences = if trimmed.starts_with('#') {
            uri_attributes(content)
                .filter(|range| has_scheme(&content[range.clone()], &self.config.scheme))
                .collect()
        } else if self.is_bare_reference(trimmed) {
            let start = content.len() - content.trim_start().len();
            vec![start..start + trimmed.len()]
        } else {
            Vec::new()
        };

        ScannedLine {
            content,
            terminator,
            occurrences,
        }
    }

    fn is_bare_reference(&self, trimmed: &str) -> bool {
        has_scheme(trimmed, &self.config.scheme)
            && (self.config.is_manifest_path(trimmed) || self.config.is_segment_path(trimmed))
    }
}

struct ScannedLine<'a> {
    content: &'a str,
    terminator: &'a str,
    /// Byte ranges within `content` holding placeholder URIs
    occurrences: Vec<Range<usize>>,
}

fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(content) = raw.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = raw.strip_suffix('\n') {
        (content, "\n")
    } else {
        (raw, "")
    }
}

/// Byte ranges of every quoted `URI="..."` value on a line. An unterminated
/// quote ends the scan.
fn uri_attributes(line: &str) -> impl Iterator<Item = Range<usize>> + '_ {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        let found = line[cursor..].find(URI_ATTRIBUTE)?;
        let start = cursor + found + URI_ATTRIBUTE.len();
        let end = start + line[start..].find('"')?;
        cursor = end + 1;
        Some(start..end)
    })
}
