use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::OperationFailed(_) | BridgeError::Io(_) => true,
            BridgeError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BridgeError::Http { status: 503, message: String::new() }.is_transient());
        assert!(BridgeError::Http { status: 429, message: String::new() }.is_transient());
        assert!(!BridgeError::Http { status: 404, message: String::new() }.is_transient());
        assert!(!BridgeError::CredentialMissing("api token".into()).is_transient());
        assert!(BridgeError::OperationFailed("Connection reset".into()).is_transient());
    }
}
