//! Change notifications.
//!
//! Observers register callbacks on a [`Subscribers`] list. Notifying walks
//! every callback in registration order; a failing callback does not stop the
//! walk, its error is collected and all failures are reported together as an
//! [`AggregateError`].

use crate::EntityHandle;
use std::fmt;

/// Error type returned by subscriber callbacks.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Handler<E> = Box<dyn Fn(&E) -> Result<(), SubscriberError> + Send + Sync>;

/// Token identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Failures raised by one or more subscribers during a single notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} subscriber(s) failed: {}", .messages.len(), .messages.join("; "))]
pub struct AggregateError {
    messages: Vec<String>,
}

impl AggregateError {
    /// Creates an aggregate from already-rendered messages.
    #[must_use]
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    /// The individual failure messages, in subscriber order.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Merges another aggregate into this one.
    pub fn extend(&mut self, other: AggregateError) {
        self.messages.extend(other.messages);
    }

    /// Folds a list of aggregates into one, or `None` when the list is empty.
    #[must_use]
    pub fn combine(errors: impl IntoIterator<Item = AggregateError>) -> Option<AggregateError> {
        let mut iter = errors.into_iter();
        let mut first = iter.next()?;
        for err in iter {
            first.extend(err);
        }
        Some(first)
    }
}

/// An ordered list of callbacks observing events of type `E`.
pub struct Subscribers<E> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<E>)>,
}

impl<E> Subscribers<E> {
    /// Creates an empty subscriber list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    /// Registers a callback and returns its subscription id.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Removes a callback. Returns false if the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _)| *sid != id);
        self.handlers.len() != before
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invokes every callback in order, aggregating failures.
    pub fn notify(&self, event: &E) -> Result<(), AggregateError> {
        let messages: Vec<String> = self
            .handlers
            .iter()
            .filter_map(|(_, handler)| handler(event).err())
            .map(|err| err.to_string())
            .collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(AggregateError::new(messages))
        }
    }

    /// Moves all callbacks out, leaving the list empty.
    pub fn take(&mut self) -> Subscribers<E> {
        std::mem::take(self)
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.handlers.len())
            .finish()
    }
}

/// A named property changed on an observable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChanged {
    pub property: String,
}

impl PropertyChanged {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

/// Kind of membership change on an entity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionChangeAction {
    Add,
    Remove,
    Reset,
}

/// A membership change on an entity set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChanged {
    pub action: CollectionChangeAction,
    /// Affected entities; empty for `Reset`.
    pub handles: Vec<EntityHandle>,
}

impl CollectionChanged {
    pub fn added(handle: EntityHandle) -> Self {
        Self {
            action: CollectionChangeAction::Add,
            handles: vec![handle],
        }
    }

    pub fn removed(handle: EntityHandle) -> Self {
        Self {
            action: CollectionChangeAction::Remove,
            handles: vec![handle],
        }
    }

    pub fn reset() -> Self {
        Self {
            action: CollectionChangeAction::Reset,
            handles: Vec::new(),
        }
    }
}
