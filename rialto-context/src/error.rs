//! Error types for domain operations.

use rialto_client::ClientError;
use rialto_model::{ModelError, ValidationResult};
use rialto_tracking::TrackingError;
use rialto_types::{AggregateError, EntityHandle};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Why a domain operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationErrorStatus {
    /// Transport or server failure.
    ServerError,
    ValidationFailed,
    Conflicts,
    Unauthorized,
    NotFound,
}

/// Errors surfaced by a [`DomainContext`](crate::DomainContext) and its
/// operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// The service call failed.
    #[error("domain operation failed ({status:?}): {message}")]
    Operation {
        status: OperationErrorStatus,
        message: String,
    },

    /// Client or server validation failed. `entities` lists the entities that
    /// now carry errors; `errors` holds what the service or validator reported.
    #[error("validation failed for {} entities", entities.len())]
    Validation {
        entities: Vec<EntityHandle>,
        errors: Vec<ValidationResult>,
    },

    /// The submit conflicted with the store.
    #[error("submit failed with conflicts on {} entities", entities.len())]
    Conflicts { entities: Vec<EntityHandle> },

    #[error("operation was cancelled")]
    Cancelled,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// One or more completion subscribers failed.
    #[error("completion notification failed: {0}")]
    Notification(#[from] AggregateError),
}

impl DomainError {
    /// The failure category, for service and result errors.
    #[must_use]
    pub fn status(&self) -> Option<OperationErrorStatus> {
        match self {
            Self::Operation { status, .. } => Some(*status),
            Self::Validation { .. } => Some(OperationErrorStatus::ValidationFailed),
            Self::Conflicts { .. } => Some(OperationErrorStatus::Conflicts),
            _ => None,
        }
    }

    /// The entities the failure is attributed to.
    #[must_use]
    pub fn entities_in_error(&self) -> &[EntityHandle] {
        match self {
            Self::Validation { entities, .. } | Self::Conflicts { entities } => entities,
            _ => &[],
        }
    }
}

impl From<ClientError> for DomainError {
    fn from(err: ClientError) -> Self {
        let (status, message) = match err {
            ClientError::Cancelled => return Self::Cancelled,
            ClientError::InvalidOperation(message) => return Self::InvalidOperation(message),
            ClientError::Unauthorized(message) => (OperationErrorStatus::Unauthorized, message),
            ClientError::NotFound(message) => (OperationErrorStatus::NotFound, message),
            ClientError::Server { status, message } => (
                OperationErrorStatus::ServerError,
                format!("server returned {status}: {message}"),
            ),
            ClientError::Transport(message) | ClientError::Serialization(message) => {
                (OperationErrorStatus::ServerError, message)
            }
        };
        Self::Operation { status, message }
    }
}

impl From<ModelError> for DomainError {
    fn from(err: ModelError) -> Self {
        Self::Tracking(TrackingError::Model(err))
    }
}
