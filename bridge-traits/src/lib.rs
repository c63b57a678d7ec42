//! # Host Bridge Traits
//!
//! Contracts between the streaming core and the world around it.
//!
//! ## Overview
//!
//! Each trait represents a capability the core requires but does not own. The
//! desktop implementations live in `bridge-desktop`; tests substitute mocks.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP with timeouts and retry
//! - [`AssetCatalog`](catalog::AssetCatalog) - Record query + batch signed-URL resolution
//! - [`Clock`](time::Clock) - Time source for expiry calculations
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map their own failures onto the closest variant so the core can tell
//! a missing credential from a transport failure from a decode failure.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the core shares them across tasks
//! running on a multi-threaded runtime.

pub mod catalog;
pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use catalog::{AssetCatalog, RecordMap, UrlMap};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
