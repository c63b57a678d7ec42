//! Error types for the CloudKit provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// CloudKit provider errors
#[derive(Error, Debug)]
pub enum CloudKitError {
    /// No API token has been configured
    #[error("CloudKit API token is not configured")]
    CredentialMissing,

    /// The token was rejected by the server
    #[error("Authentication failed (status {status_code}): {message}")]
    AuthenticationFailed { status_code: u16, message: String },

    /// API request returned an error
    #[error("CloudKit API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for CloudKit operations
pub type Result<T> = std::result::Result<T, CloudKitError>;

impl From<CloudKitError> for BridgeError {
    fn from(error: CloudKitError) -> Self {
        match error {
            CloudKitError::CredentialMissing => {
                BridgeError::CredentialMissing("CloudKit API token".to_string())
            }
            CloudKitError::AuthenticationFailed {
                status_code,
                message,
            } => BridgeError::Http {
                status: status_code,
                message: format!("Authentication failed: {}", message),
            },
            CloudKitError::ApiError {
                status_code,
                message,
            } => BridgeError::Http {
                status: status_code,
                message,
            },
            CloudKitError::ParseError(msg) => BridgeError::Decode(msg),
            CloudKitError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CloudKitError::ApiError {
            status_code: 400,
            message: "BAD_REQUEST".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "CloudKit API error (status 400): BAD_REQUEST"
        );
    }

    #[test]
    fn test_error_conversion() {
        let bridge_error: BridgeError = CloudKitError::CredentialMissing.into();
        assert!(matches!(bridge_error, BridgeError::CredentialMissing(_)));

        let bridge_error: BridgeError = CloudKitError::ParseError("eof".to_string()).into();
        assert!(matches!(bridge_error, BridgeError::Decode(_)));

        let bridge_error: BridgeError = CloudKitError::ApiError {
            status_code: 503,
            message: "TRY_AGAIN_LATER".to_string(),
        }
        .into();
        assert!(matches!(bridge_error, BridgeError::Http { status: 503, .. }));
    }
}
