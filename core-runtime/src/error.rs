//! Runtime error type shared by configuration and logging setup

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A host capability (HTTP client) was not supplied and no platform
    /// default is compiled in
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
