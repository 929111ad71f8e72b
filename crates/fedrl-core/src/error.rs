//! Error types for fedrl-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FedrlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The login endpoint refused the credentials.
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Refresh token rejected by backend (HTTP {0})")]
    RefreshRejected(u16),

    /// Any other non-success response from the backend.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl FedrlError {
    /// Authentication failures are resolved by forcing a fresh login;
    /// everything else leaves the session untouched.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            FedrlError::InvalidCredentials(_)
            | FedrlError::InvalidToken(_)
            | FedrlError::NoRefreshToken
            | FedrlError::RefreshRejected(_) => true,
            FedrlError::Api { status, .. } => *status == 401,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FedrlError>;
