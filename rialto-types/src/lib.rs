//! Core type definitions for Rialto.
//!
//! This crate defines the small, dependency-free vocabulary shared by every
//! layer of the entity tracking engine:
//! - Container ids and entity handles (arena addresses of attached entities)
//! - Composite entity keys
//! - Entity states and load behaviours
//! - Subscriber lists for change notifications
//!
//! Entity metadata, values and the merge engine live in `rialto-model`.

mod ids;
mod key;
mod notify;
mod state;

pub use ids::{ContainerId, EntityHandle, EntryId};
pub use key::{EntityKey, KeyValue};
pub use notify::{
    AggregateError, CollectionChangeAction, CollectionChanged, PropertyChanged, SubscriberError,
    Subscribers, SubscriptionId,
};
pub use state::{EntityState, LoadBehavior};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid key value for member '{member}': {reason}")]
    InvalidKey { member: String, reason: String },

    #[error("invalid container id: {0}")]
    InvalidContainerId(String),
}
