//! # URL Cache Module
//!
//! Keeps short-lived signed URLs warm for the player.
//!
//! ## Overview
//!
//! Signed download URLs expire. The cache stores each resolved URL for a
//! fixed validity window (shorter than the backend's real lifetime), collapses
//! concurrent resolutions of the same key into one backend call, and runs one
//! background loop per prefetched group that re-resolves the whole group
//! before entries go stale.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     UrlCache                           │
//! │  - lookup()      (sync, no I/O)        │
//! │  - refresh()     (de-duplicated)       │
//! │  - prefetch()    (+ background loop)   │
//! │  - clear()/clear_all()                 │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> AssetCatalog (query + batch lookup)
//!          └──> Clock (expiry)
//! ```

pub mod config;
pub mod entry;
pub mod manager;
pub mod stats;

pub use config::CacheConfig;
pub use entry::{CacheKey, CachedUrl};
pub use manager::UrlCache;
pub use stats::CacheStats;
