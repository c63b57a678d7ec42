//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the streaming core:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the validated configuration
//! every component is built from.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{StreamingConfig, StreamingConfigBuilder};
pub use error::{Error, Result};
