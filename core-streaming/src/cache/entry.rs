//! Cache keys and entries

use crate::reference::decode_path;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// `(asset group, relative path)`. The path is percent-decoded on
/// construction so encoded and plain spellings share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub group: String,
    pub path: String,
}

impl CacheKey {
    pub fn new(group: &str, path: &str) -> Self {
        Self {
            group: group.to_string(),
            path: decode_path(path).into_owned(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.path)
    }
}

/// A resolved URL and its validity period.
///
/// `expires_at` is always `cached_at + validity window`; entries are replaced
/// whole, never updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedUrl {
    pub url: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedUrl {
    pub fn new(url: String, cached_at: DateTime<Utc>, validity_window: Duration) -> Self {
        Self {
            url,
            cached_at,
            expires_at: cached_at + to_chrono(validity_window),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_near_expiry(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.expires_at - now < to_chrono(threshold)
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(duration.as_millis().min(i64::MAX as u128) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_key_decodes_path() {
        assert_eq!(
            CacheKey::new("g", "audio%20en/seg%201.ts"),
            CacheKey::new("g", "audio en/seg 1.ts")
        );
        assert_eq!(CacheKey::new("g", "a/b.ts").to_string(), "g/a/b.ts");
    }

    #[test]
    fn test_expiry_boundaries() {
        let entry = CachedUrl::new("https://cdn.example/a".into(), at(0), Duration::from_secs(3000));

        assert_eq!(entry.expires_at, at(3000));
        assert!(!entry.is_expired(at(2999)));
        assert!(!entry.is_expired(at(3000)));
        assert!(entry.is_expired(at(3001)));
    }

    #[test]
    fn test_near_expiry() {
        let threshold = Duration::from_secs(600);
        let entry = CachedUrl::new("https://cdn.example/a".into(), at(0), Duration::from_secs(3000));

        assert!(!entry.is_near_expiry(at(2400), threshold));
        assert!(entry.is_near_expiry(at(2401), threshold));
        assert_eq!(entry.remaining(at(2400)), threshold);
        assert_eq!(entry.remaining(at(4000)), Duration::ZERO);
    }
}
