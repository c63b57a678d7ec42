//! Synchronization primitives.
//!
//! Async-aware primitives from `tokio::sync` (safe to hold across `.await`)
//! plus cooperative cancellation from `tokio-util`.
//!
//! Code that only needs a short, never-awaited critical section should prefer
//! a blocking mutex (`parking_lot`) so it can be used from synchronous APIs.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(0);
//!     *mutex.lock().await += 1;
//!
//!     let parent = CancellationToken::new();
//!     let child = parent.child_token();
//!     parent.cancel();
//!     assert!(child.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
