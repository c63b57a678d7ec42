//! Runtime handles.
//!
//! Exposes Tokio's runtime types so downstream crates can check for an
//! ambient runtime (`Handle::try_current`) without depending on Tokio.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread runtime.
///
/// Only meant for synchronous call sites outside any runtime (log sinks,
/// host callbacks). Returns an I/O error if the runtime cannot be built.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
