//! # CloudKit Provider
//!
//! Implements the `AssetCatalog` trait against CloudKit Web Services.
//!
//! ## Overview
//!
//! This module provides:
//! - Filtered record queries (`records/query`) with continuation markers
//! - Batched record lookups (`records/lookup`) yielding signed download URLs
//! - API token configuration at runtime
//! - Rate limiting and exponential backoff

pub mod config;
pub mod connector;
pub mod error;
pub mod types;

pub use config::CloudKitConfig;
pub use connector::CloudKitConnector;
pub use error::{CloudKitError, Result};
