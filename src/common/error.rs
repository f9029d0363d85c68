//! Error types for groupsaga

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Compensation Errors ===
    /// A compensating call came back transient. Caught by the retry wrapper.
    #[error("Compensation failed on {node} for group {group_id}")]
    CompensationFailed { node: String, group_id: String },

    #[error("Compensation exhausted for group {group_id} after {attempts} attempts, still pending on {pending:?}")]
    CompensationExhausted {
        group_id: String,
        attempts: usize,
        pending: Vec<String>,
    },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid group id: {0}")]
    InvalidGroupId(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Is this the signal the compensation retry wrapper swallows?
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CompensationFailed { .. })
    }

    /// Configuration errors fail fast and are never retried
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_)
                | Error::UnknownNode(_)
                | Error::InvalidTimestamp(_)
                | Error::InvalidGroupId(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::UnknownNode(_)
            | Error::InvalidTimestamp(_)
            | Error::InvalidGroupId(_)
            | Error::InvalidConfig(_) => StatusCode::NOT_ACCEPTABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
