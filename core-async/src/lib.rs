//! Runtime facade for the streaming core.
//!
//! Core and provider crates depend on this crate instead of naming Tokio
//! directly. Everything here is a thin re-export of the native Tokio runtime
//! plus the handful of helpers the streaming pipeline leans on:
//!
//! - `task`: task spawning (`spawn`, `JoinHandle`)
//! - `time`: sleeping, timeouts and monotonic instants
//! - `sync`: async-aware locks, channels and [`sync::CancellationToken`]
//! - `runtime`: handles for code that has to bridge into sync callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!
//!     let handle = core_async::spawn(async move {
//!         core_async::select! {
//!             _ = child.cancelled() => "cancelled",
//!             _ = sleep(Duration::from_secs(60)) => "elapsed",
//!         }
//!     });
//!
//!     token.cancel();
//!     assert_eq!(handle.await.unwrap(), "cancelled");
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

// `select!` is used by the cache and interceptor for cooperative cancellation.
pub use tokio::select;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
