//! Error types for the tracking layer.

use rialto_model::ModelError;
use rialto_types::{AggregateError, ContainerId, EntityHandle};
use thiserror::Error;

/// Result type for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;

/// Errors raised by entity sets and containers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Another attached entity of the same type already has this key.
    #[error("an entity of type '{entity_type}' with key {key} is already attached")]
    DuplicateKey { entity_type: String, key: String },

    /// The container has no set for the entity type.
    #[error("no entity set registered for type '{0}'")]
    EntitySetNotFound(String),

    /// The handle does not address an attached entity of this container.
    #[error("no attached entity at {0}")]
    UnknownEntity(EntityHandle),

    /// The entity belongs to a different container.
    #[error("entity {handle} belongs to another container than {container}")]
    CrossContainer {
        handle: EntityHandle,
        container: ContainerId,
    },

    /// The set does not permit the operation.
    #[error("'{operation}' is not supported on entity set '{entity_type}'")]
    OperationNotSupported {
        entity_type: String,
        operation: &'static str,
    },

    #[error("entity type '{entity_type}' has no association '{association}'")]
    UnknownAssociation {
        entity_type: String,
        association: String,
    },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// One or more subscribers failed; the operation itself completed.
    #[error("change notification failed: {0}")]
    Notification(#[from] AggregateError),
}

/// Collects subscriber failures across a multi-step operation so every step
/// runs before they are reported.
#[derive(Debug, Default)]
pub(crate) struct Failures(Vec<AggregateError>);

impl Failures {
    /// Returns `fallback` in place of a model result whose only failure was a
    /// notification, recording that failure.
    pub(crate) fn absorb<T>(&mut self, result: Result<T, ModelError>, fallback: T) -> TrackingResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(ModelError::Notification(err)) => {
                self.0.push(err);
                Ok(fallback)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn push(&mut self, result: Result<(), AggregateError>) {
        if let Err(err) = result {
            self.0.push(err);
        }
    }

    pub(crate) fn into_result(self) -> TrackingResult<()> {
        match AggregateError::combine(self.0) {
            Some(err) => Err(TrackingError::Notification(err)),
            None => Ok(()),
        }
    }
}
