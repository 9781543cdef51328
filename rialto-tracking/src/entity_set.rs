//! Identity-keyed collections of one entity type.

use rialto_model::{Entity, EntityType};
use rialto_types::{
    CollectionChanged, ContainerId, EntityHandle, EntityKey, EntityState, SubscriberError,
    Subscribers, SubscriptionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{TrackingError, TrackingResult};

/// Operations an entity set permits on its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySetOperations {
    pub add: bool,
    pub edit: bool,
    pub remove: bool,
}

impl EntitySetOperations {
    /// Every operation permitted.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            add: true,
            edit: true,
            remove: true,
        }
    }

    /// Load-only sets.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            add: false,
            edit: false,
            remove: false,
        }
    }
}

impl Default for EntitySetOperations {
    fn default() -> Self {
        Self::all()
    }
}

/// The attached entities of one type within a container.
///
/// Entities are stored by slot. Non-new entities are also indexed by key;
/// new entities join the index when their insert is accepted, since the
/// server may assign their keys.
pub struct EntitySet {
    container: ContainerId,
    entity_type: Arc<EntityType>,
    operations: EntitySetOperations,
    entities: BTreeMap<u64, Entity>,
    identity: HashMap<EntityKey, u64>,
    collection_changed: Subscribers<CollectionChanged>,
}

impl EntitySet {
    pub(crate) fn new(
        container: ContainerId,
        entity_type: Arc<EntityType>,
        operations: EntitySetOperations,
    ) -> Self {
        Self {
            container,
            entity_type,
            operations,
            entities: BTreeMap::new(),
            identity: HashMap::new(),
            collection_changed: Subscribers::new(),
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.entity_type.name
    }

    #[must_use]
    pub fn operations(&self) -> EntitySetOperations {
        self.operations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        handle.container() == self.container && self.entities.contains_key(&handle.slot())
    }

    #[must_use]
    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        if handle.container() != self.container {
            return None;
        }
        self.entities.get(&handle.slot())
    }

    /// Attached entities in attach order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.entities
            .iter()
            .map(|(slot, entity)| (EntityHandle::new(self.container, *slot), entity))
    }

    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.entities
            .keys()
            .map(|slot| EntityHandle::new(self.container, *slot))
    }

    /// Looks up a non-new entity by key.
    #[must_use]
    pub fn find(&self, key: &EntityKey) -> Option<EntityHandle> {
        self.identity
            .get(key)
            .map(|slot| EntityHandle::new(self.container, *slot))
    }

    /// Entities added since the last accept.
    #[must_use]
    pub fn added(&self) -> Vec<EntityHandle> {
        self.in_state(EntityState::New)
    }

    /// Entities with pending edits.
    #[must_use]
    pub fn modified(&self) -> Vec<EntityHandle> {
        self.in_state(EntityState::Modified)
    }

    /// Entities marked for deletion.
    #[must_use]
    pub fn removed(&self) -> Vec<EntityHandle> {
        self.in_state(EntityState::Deleted)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entities.values().any(|e| e.state().has_pending_change())
    }

    fn in_state(&self, state: EntityState) -> Vec<EntityHandle> {
        self.iter()
            .filter(|(_, entity)| entity.state() == state)
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Handlers run while the owning container is borrowed and must not
    /// reach back into it.
    pub fn subscribe_collection_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&CollectionChanged) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.collection_changed.subscribe(handler)
    }

    pub fn unsubscribe_collection_changed(&mut self, id: SubscriptionId) -> bool {
        self.collection_changed.unsubscribe(id)
    }

    // ── Container internals ──────────────────────────────────────

    pub(crate) fn get_mut(&mut self, slot: u64) -> Option<&mut Entity> {
        self.entities.get_mut(&slot)
    }

    pub(crate) fn check(&self, operation: &'static str, allowed: bool) -> TrackingResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(TrackingError::OperationNotSupported {
                entity_type: self.entity_type.name.clone(),
                operation,
            })
        }
    }

    /// Reserves `key` for `slot`, failing if another entity holds it.
    pub(crate) fn claim_key(&mut self, key: EntityKey, slot: u64) -> TrackingResult<()> {
        match self.identity.get(&key) {
            Some(existing) if *existing != slot => Err(TrackingError::DuplicateKey {
                entity_type: self.entity_type.name.clone(),
                key: key.to_string(),
            }),
            _ => {
                self.identity.insert(key, slot);
                Ok(())
            }
        }
    }

    pub(crate) fn insert(&mut self, slot: u64, entity: Entity) {
        self.entities.insert(slot, entity);
    }

    /// Removes the entity and its key, if indexed.
    pub(crate) fn take(&mut self, slot: u64) -> Option<Entity> {
        let entity = self.entities.remove(&slot)?;
        match entity.key() {
            Ok(key) if self.identity.get(&key) == Some(&slot) => {
                self.identity.remove(&key);
            }
            _ => self.identity.retain(|_, s| *s != slot),
        }
        Some(entity)
    }

    pub(crate) fn notify(&self, event: &CollectionChanged) -> Result<(), rialto_types::AggregateError> {
        self.collection_changed.notify(event)
    }
}

impl std::fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySet")
            .field("entity_type", &self.entity_type.name)
            .field("operations", &self.operations)
            .field("len", &self.entities.len())
            .finish_non_exhaustive()
    }
}
