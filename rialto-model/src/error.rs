//! Error types for the entity model.

use rialto_types::{AggregateError, EntityState};
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by entity operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The object graph reachable from a member refers back to itself.
    #[error("cyclic reference detected while extracting state at '{path}'")]
    CyclicReference { path: String },

    /// The member is not declared on the entity type.
    #[error("entity type '{entity_type}' has no member '{member}'")]
    UnknownMember { entity_type: String, member: String },

    /// Key members cannot change once the entity has an identity.
    #[error("key member '{member}' of '{entity_type}' cannot change once attached")]
    KeyMemberImmutable { entity_type: String, member: String },

    /// A value does not match the declared member kind.
    #[error("member '{member}' expects a {expected} value")]
    KindMismatch { member: String, expected: &'static str },

    /// A key could not be built from the entity's key members.
    #[error("invalid entity key: {0}")]
    InvalidKey(#[from] rialto_types::Error),

    /// The state machine does not permit this transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: EntityState, to: EntityState },

    /// The operation is not valid in the entity's current condition.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Delete conflicts have no store values to resolve against.
    #[error("delete conflicts cannot be resolved")]
    ConflictNotResolvable,

    /// One or more property-changed subscribers failed.
    #[error("change notification failed: {0}")]
    Notification(#[from] AggregateError),
}
