//! Placeholder URI parsing
//!
//! A placeholder has the shape `<scheme>://<group>/<relative path>`. The
//! relative path may contain further `/` separators and percent escapes.

use crate::error::{Result, StreamingError};
use std::borrow::Cow;

/// A parsed placeholder URI.
///
/// `path` is kept exactly as written; [`AssetReference::decoded_path`] yields
/// the cache key form. Decoding happens once, when the cache key is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub group: String,
    pub path: String,
}

impl AssetReference {
    /// Parse `uri` as a placeholder under `scheme`.
    ///
    /// Fails with `InvalidReference` when the scheme differs, when there is no
    /// separator between group and path, or when either part is empty or not
    /// valid UTF-8 after percent-decoding.
    pub fn parse(uri: &str, scheme: &str) -> Result<Self> {
        let rest = strip_scheme(uri, scheme)
            .ok_or_else(|| StreamingError::InvalidReference(format!("not a {} URI: {}", scheme, uri)))?;

        let rest = rest.split(|c: char| c == '?' || c == '#').next().unwrap_or(rest);

        let (group, path) = rest
            .split_once('/')
            .ok_or_else(|| StreamingError::InvalidReference(format!("missing path: {}", uri)))?;

        if group.is_empty() || path.is_empty() {
            return Err(StreamingError::InvalidReference(format!(
                "empty group or path: {}",
                uri
            )));
        }

        let group = urlencoding::decode(group)
            .map_err(|e| StreamingError::InvalidReference(format!("{}: {}", uri, e)))?
            .into_owned();
        urlencoding::decode(path)
            .map_err(|e| StreamingError::InvalidReference(format!("{}: {}", uri, e)))?;

        Ok(Self {
            group,
            path: path.to_string(),
        })
    }

    pub fn decoded_path(&self) -> Cow<'_, str> {
        decode_path(&self.path)
    }

    /// File name component of the path
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Whether `uri` starts with `<scheme>://` (scheme compared case-insensitively).
pub fn has_scheme(uri: &str, scheme: &str) -> bool {
    strip_scheme(uri, scheme).is_some()
}

fn strip_scheme<'a>(uri: &'a str, scheme: &str) -> Option<&'a str> {
    let (uri_scheme, rest) = uri.split_once("://")?;
    uri_scheme.eq_ignore_ascii_case(scheme).then_some(rest)
}

/// Percent-decode a relative path, falling back to the raw text when the
/// escapes do not decode to UTF-8.
pub(crate) fn decode_path(path: &str) -> Cow<'_, str> {
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}
