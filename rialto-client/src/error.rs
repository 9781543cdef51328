//! Error types for domain client calls.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors a [`DomainClient`](crate::DomainClient) may report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request could not be delivered or the response was lost.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service rejected the request.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The caller is not allowed to perform the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested query or operation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The call observed its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The client was used incorrectly.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
