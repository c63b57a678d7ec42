//! Workspace facade crate.
//!
//! Re-exports the [`core_service`] façade so host applications can depend on
//! `ckstream` alone and pick the platform shims through features.

pub use core_service::*;
