//! Change sets: the batch of pending changes sent in one submit.

use rialto_model::{EntityAction, EntityConflict, StateMap, ValidationResult};
use rialto_types::{EntityHandle, EntityState, EntryId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// What the server is asked to do with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOperationType {
    None,
    Insert,
    Update,
    Delete,
}

impl From<EntityState> for EntityOperationType {
    fn from(state: EntityState) -> Self {
        match state {
            EntityState::New => Self::Insert,
            EntityState::Modified => Self::Update,
            EntityState::Deleted => Self::Delete,
            EntityState::Detached | EntityState::Unmodified => Self::None,
        }
    }
}

/// A snapshot of one pending entity taken when the change set was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSetItem {
    pub handle: EntityHandle,
    pub entity_type: String,
    pub state: EntityState,
    pub current: StateMap,
    /// Original values of round-tripped members, for updates and deletes.
    #[serde(default)]
    pub original: Option<StateMap>,
    #[serde(default)]
    pub actions: Vec<EntityAction>,
    /// Composition parent, when the entity is a composed child.
    #[serde(default)]
    pub parent: Option<EntityHandle>,
}

/// One entry of a submitted change set, and the server's verdict on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSetEntry {
    pub id: EntryId,
    pub operation: EntityOperationType,
    pub entity_type: String,
    pub handle: EntityHandle,
    pub current: StateMap,
    #[serde(default)]
    pub original: Option<StateMap>,
    #[serde(default)]
    pub actions: Vec<EntityAction>,
    #[serde(default)]
    pub parent: Option<EntryId>,
    #[serde(default)]
    pub validation_errors: Vec<ValidationResult>,
    #[serde(default)]
    pub conflict: Option<EntityConflict>,
    /// Post-submit server values, used to synchronize the client entity.
    #[serde(default)]
    pub server_state: Option<StateMap>,
}

impl ChangeSetEntry {
    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.validation_errors.is_empty() || self.conflict.is_some()
    }

    #[must_use]
    pub fn with_validation_errors(mut self, errors: Vec<ValidationResult>) -> Self {
        self.validation_errors = errors;
        self
    }

    #[must_use]
    pub fn with_conflict(mut self, conflict: EntityConflict) -> Self {
        self.conflict = Some(conflict);
        self
    }

    #[must_use]
    pub fn with_server_state(mut self, state: StateMap) -> Self {
        self.server_state = Some(state);
        self
    }
}

/// An immutable snapshot of a container's pending changes.
///
/// Items keep the order they were given in; entries are derived lazily and
/// numbered from zero across added, modified and removed items in turn.
#[derive(Debug, Default)]
pub struct EntityChangeSet {
    added: Vec<ChangeSetItem>,
    modified: Vec<ChangeSetItem>,
    removed: Vec<ChangeSetItem>,
    entries: OnceLock<Vec<ChangeSetEntry>>,
}

impl EntityChangeSet {
    #[must_use]
    pub fn new(added: Vec<ChangeSetItem>, modified: Vec<ChangeSetItem>, removed: Vec<ChangeSetItem>) -> Self {
        Self {
            added,
            modified,
            removed,
            entries: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn added(&self) -> &[ChangeSetItem] {
        &self.added
    }

    #[must_use]
    pub fn modified(&self) -> &[ChangeSetItem] {
        &self.modified
    }

    #[must_use]
    pub fn removed(&self) -> &[ChangeSetItem] {
        &self.removed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// Every item, in entry order.
    pub fn items(&self) -> impl Iterator<Item = &ChangeSetItem> {
        self.added.iter().chain(&self.modified).chain(&self.removed)
    }

    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.items().any(|item| item.handle == handle)
    }

    /// The change set entries, computed on first access.
    pub fn entries(&self) -> &[ChangeSetEntry] {
        self.entries.get_or_init(|| self.build_entries())
    }

    #[must_use]
    pub fn entry_for(&self, handle: EntityHandle) -> Option<&ChangeSetEntry> {
        self.entries().iter().find(|entry| entry.handle == handle)
    }

    fn build_entries(&self) -> Vec<ChangeSetEntry> {
        let ids: HashMap<EntityHandle, EntryId> = self
            .items()
            .enumerate()
            .map(|(index, item)| (item.handle, EntryId::from_index(index)))
            .collect();
        self.items()
            .enumerate()
            .map(|(index, item)| ChangeSetEntry {
                id: EntryId::from_index(index),
                operation: item.state.into(),
                entity_type: item.entity_type.clone(),
                handle: item.handle,
                current: item.current.clone(),
                original: item.original.clone(),
                actions: item.actions.clone(),
                parent: item.parent.and_then(|parent| ids.get(&parent).copied()),
                validation_errors: Vec::new(),
                conflict: None,
                server_state: None,
            })
            .collect()
    }
}
