//! # Streaming Error Types
//!
//! Error kinds surfaced by the cache, the manifest rewriter and the resource
//! interceptor.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur while resolving or serving stream resources.
///
/// `Clone` because one in-flight resolution fans its result out to every
/// waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamingError {
    /// Placeholder URI could not be parsed (wrong scheme, no path separator,
    /// undecodable path).
    #[error("Invalid asset reference: {0}")]
    InvalidReference(String),

    /// No injected manifest for the group, or no catalog record for the path.
    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    /// The catalog needs an API token that has not been configured.
    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    /// Transport failure or non-2xx response.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Response was not UTF-8 or could not be parsed.
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// The work was cancelled by a cache clear or shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreamingError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamingError::Cancelled)
    }
}

impl From<BridgeError> for StreamingError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::CredentialMissing(what) => StreamingError::CredentialMissing(what),
            BridgeError::NotFound(what) => StreamingError::SegmentNotFound(what),
            BridgeError::Decode(msg) => StreamingError::DecodeFailed(msg),
            BridgeError::Http { status, message } => {
                StreamingError::DownloadFailed(format!("HTTP {}: {}", status, message))
            }
            BridgeError::OperationFailed(msg) | BridgeError::NotAvailable(msg) => {
                StreamingError::DownloadFailed(msg)
            }
            BridgeError::Io(e) => StreamingError::DownloadFailed(e.to_string()),
        }
    }
}

/// Result type for streaming operations.
pub type Result<T> = std::result::Result<T, StreamingError>;
