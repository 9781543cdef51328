//! Optimistic-concurrency conflicts.

use serde::{Deserialize, Serialize};

use crate::value::StateMap;

/// A conflict reported by the server for a submitted entity.
///
/// `store_state` holds the server's current values and is absent when the
/// entity was deleted on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConflict {
    store_state: Option<StateMap>,
    client_state: StateMap,
    conflicting_members: Vec<String>,
    is_deleted: bool,
}

impl EntityConflict {
    /// An update conflict against the given store values.
    #[must_use]
    pub fn new(store_state: StateMap, client_state: StateMap, conflicting_members: Vec<String>) -> Self {
        Self {
            store_state: Some(store_state),
            client_state,
            conflicting_members,
            is_deleted: false,
        }
    }

    /// The entity no longer exists on the server.
    #[must_use]
    pub fn deleted(client_state: StateMap) -> Self {
        Self {
            store_state: None,
            client_state,
            conflicting_members: Vec::new(),
            is_deleted: true,
        }
    }

    #[must_use]
    pub fn store_state(&self) -> Option<&StateMap> {
        self.store_state.as_ref()
    }

    #[must_use]
    pub fn client_state(&self) -> &StateMap {
        &self.client_state
    }

    #[must_use]
    pub fn conflicting_members(&self) -> &[String] {
        &self.conflicting_members
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}
