//! Error types shared by the REST client and the state controller

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced to the user by a backend-facing action
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Input rejected before any request was made
    #[error("{0}")]
    Validation(String),

    /// Action not allowed in the current application phase
    #[error("cannot {action} while {phase}")]
    InvalidPhase { action: &'static str, phase: &'static str },

    /// Connectivity problem or timeout
    #[error("network error: {0}")]
    Network(String),

    /// Failure reported by the backend; `status` is 0 when it came in-band
    /// with a successful HTTP response
    #[error("{message}")]
    Backend { status: u16, message: String },

    /// Response body could not be understood
    #[error("invalid response from backend: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<ureq::Error> for ClientError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => ClientError::Network("request timed out".to_string()),
            other => ClientError::Network(other.to_string()),
        }
    }
}
