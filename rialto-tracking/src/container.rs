//! The entity container: one unit of work.
//!
//! An [`EntityContainer`] owns one [`EntitySet`] per registered type and is
//! the only place attached entities are mutated. Callers address entities
//! through [`EntityHandle`]s; handles of other containers are rejected.
//!
//! Every mutating operation runs to completion before any subscriber failure
//! is reported, so a failing observer never leaves the container half
//! updated.

use parking_lot::Mutex;
use rialto_model::{ComplexObject, Entity, EntityType, Value};
use rialto_types::{
    CollectionChanged, ContainerId, EntityHandle, EntityState, PropertyChanged, SubscriberError,
    Subscribers, SubscriptionId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::association::{CachedCollection, CachedRef};
use crate::entity_set::{EntitySet, EntitySetOperations};
use crate::error::{Failures, TrackingError, TrackingResult};

/// A container shared between a context and the operations it spawns.
pub type SharedContainer = Arc<Mutex<EntityContainer>>;

/// Property raised when [`EntityContainer::has_changes`] flips.
pub const HAS_CHANGES: &str = "has_changes";

/// Aggregate root for the entity sets of a unit of work.
pub struct EntityContainer {
    id: ContainerId,
    sets: BTreeMap<String, EntitySet>,
    slots: HashMap<u64, String>,
    next_slot: u64,
    pub(crate) generation: u64,
    pub(crate) refs: HashMap<(u64, String), CachedRef>,
    pub(crate) collections: HashMap<(u64, String), CachedCollection>,
    external: Vec<Weak<Mutex<EntityContainer>>>,
    has_changes: bool,
    property_changed: Subscribers<PropertyChanged>,
}

impl EntityContainer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ContainerId::new(),
            sets: BTreeMap::new(),
            slots: HashMap::new(),
            next_slot: 0,
            generation: 0,
            refs: HashMap::new(),
            collections: HashMap::new(),
            external: Vec::new(),
            has_changes: false,
            property_changed: Subscribers::new(),
        }
    }

    /// Creates a container with a set for each type.
    pub fn with_types<I>(types: I) -> TrackingResult<Self>
    where
        I: IntoIterator<Item = Arc<EntityType>>,
    {
        let mut container = Self::new();
        for entity_type in types {
            container.register(entity_type)?;
        }
        Ok(container)
    }

    /// Wraps the container for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedContainer {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    // ── Sets ─────────────────────────────────────────────────────

    /// Registers a set permitting every operation.
    pub fn register(&mut self, entity_type: Arc<EntityType>) -> TrackingResult<()> {
        self.register_with_operations(entity_type, EntitySetOperations::all())
    }

    pub fn register_with_operations(
        &mut self,
        entity_type: Arc<EntityType>,
        operations: EntitySetOperations,
    ) -> TrackingResult<()> {
        if self.sets.contains_key(&entity_type.name) {
            return Err(TrackingError::InvalidOperation(format!(
                "entity set '{}' is already registered",
                entity_type.name
            )));
        }
        debug!(container = %self.id, entity_type = %entity_type.name, "registered entity set");
        let name = entity_type.name.clone();
        self.sets
            .insert(name, EntitySet::new(self.id, entity_type, operations));
        Ok(())
    }

    pub fn entity_set(&self, name: &str) -> TrackingResult<&EntitySet> {
        self.sets
            .get(name)
            .ok_or_else(|| TrackingError::EntitySetNotFound(name.to_string()))
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.sets.values()
    }

    /// Registers a membership callback on the set for `name`.
    ///
    /// Callbacks run while the container is borrowed; behind a
    /// [`SharedContainer`] that means while its lock is held, so a callback
    /// must not lock the same container again.
    pub fn subscribe_collection_changed<F>(&mut self, name: &str, handler: F) -> TrackingResult<SubscriptionId>
    where
        F: Fn(&CollectionChanged) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.sets
            .get_mut(name)
            .map(|set| set.subscribe_collection_changed(handler))
            .ok_or_else(|| TrackingError::EntitySetNotFound(name.to_string()))
    }

    // ── Lookup ───────────────────────────────────────────────────

    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.locate(handle).is_ok()
    }

    pub fn entity(&self, handle: EntityHandle) -> TrackingResult<&Entity> {
        self.locate(handle)?
            .get(handle)
            .ok_or(TrackingError::UnknownEntity(handle))
    }

    pub(crate) fn entity_mut(&mut self, handle: EntityHandle) -> TrackingResult<&mut Entity> {
        if handle.container() != self.id {
            return Err(TrackingError::UnknownEntity(handle));
        }
        let name = self
            .slots
            .get(&handle.slot())
            .ok_or(TrackingError::UnknownEntity(handle))?;
        self.sets
            .get_mut(name)
            .and_then(|set| set.get_mut(handle.slot()))
            .ok_or(TrackingError::UnknownEntity(handle))
    }

    pub(crate) fn locate(&self, handle: EntityHandle) -> TrackingResult<&EntitySet> {
        if handle.container() != self.id {
            return Err(TrackingError::UnknownEntity(handle));
        }
        self.slots
            .get(&handle.slot())
            .and_then(|name| self.sets.get(name))
            .ok_or(TrackingError::UnknownEntity(handle))
    }

    /// Every attached handle in attach order.
    #[must_use]
    pub fn handles(&self) -> Vec<EntityHandle> {
        let mut slots: Vec<u64> = self.slots.keys().copied().collect();
        slots.sort_unstable();
        slots
            .into_iter()
            .map(|slot| EntityHandle::new(self.id, slot))
            .collect()
    }

    /// Fails unless `handle` was issued by this container.
    pub fn check_cross_container(&self, handle: EntityHandle) -> TrackingResult<()> {
        if handle.container() == self.id {
            Ok(())
        } else {
            Err(TrackingError::CrossContainer {
                handle,
                container: self.id,
            })
        }
    }

    // ── Membership ───────────────────────────────────────────────

    /// Adds a detached entity as `New`.
    ///
    /// The entity stays attached even if a subscriber then fails; the error
    /// reports the failure only.
    pub fn add(&mut self, mut entity: Entity) -> TrackingResult<EntityHandle> {
        let name = entity.type_name().to_string();
        let set = self.entity_set(&name)?;
        set.check("add", set.operations().add)?;
        if entity.state() != EntityState::Detached {
            return Err(TrackingError::InvalidOperation(format!(
                "cannot add a {} entity",
                entity.state()
            )));
        }

        let mut failures = Failures::default();
        failures.absorb(entity.transition(EntityState::New), ())?;
        let handle = self.insert_entity(&name, entity);
        debug!(container = %self.id, entity_type = %name, handle = %handle, "added entity");
        self.membership_changed(&name, &CollectionChanged::added(handle), &mut failures);
        if let Some(parent) = self.composition_parent(handle)? {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)?;
        Ok(handle)
    }

    /// Attaches a detached entity as `Unmodified`. Fails with `DuplicateKey`
    /// if its key is taken.
    pub fn attach(&mut self, entity: Entity) -> TrackingResult<EntityHandle> {
        let mut failures = Failures::default();
        let handle = self.attach_inner(entity, &mut failures)?;
        self.finish(failures)?;
        Ok(handle)
    }

    pub(crate) fn attach_inner(
        &mut self,
        mut entity: Entity,
        failures: &mut Failures,
    ) -> TrackingResult<EntityHandle> {
        let name = entity.type_name().to_string();
        if entity.state() != EntityState::Detached {
            return Err(TrackingError::InvalidOperation(format!(
                "cannot attach a {} entity",
                entity.state()
            )));
        }
        let key = entity.key()?;
        let slot = self.next_slot;
        self.sets
            .get_mut(&name)
            .ok_or_else(|| TrackingError::EntitySetNotFound(name.clone()))?
            .claim_key(key, slot)?;

        failures.absorb(entity.transition(EntityState::Unmodified), ())?;
        let handle = self.insert_entity(&name, entity);
        debug!(container = %self.id, entity_type = %name, handle = %handle, "attached entity");
        self.membership_changed(&name, &CollectionChanged::added(handle), failures);
        Ok(handle)
    }

    /// Re-adds a `Deleted` entity, returning it to `Modified` or `Unmodified`
    /// depending on its pending edits.
    pub fn readd(&mut self, handle: EntityHandle) -> TrackingResult<()> {
        let set = self.locate(handle)?;
        set.check("add", set.operations().add)?;
        let entity = self.entity(handle)?;
        if entity.state() != EntityState::Deleted {
            return Err(TrackingError::InvalidOperation(format!(
                "only deleted entities can be re-added, {handle} is {}",
                entity.state()
            )));
        }
        let next = if entity.has_changes()? {
            EntityState::Modified
        } else {
            EntityState::Unmodified
        };
        let name = entity.type_name().to_string();

        let mut failures = Failures::default();
        failures.absorb(self.entity_mut(handle)?.transition(next), ())?;
        self.membership_changed(&name, &CollectionChanged::added(handle), &mut failures);
        if let Some(parent) = self.composition_parent(handle)? {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)
    }

    /// Removes an entity: `New` entities are detached and dropped, others are
    /// marked `Deleted`. Composed children are removed first.
    pub fn remove(&mut self, handle: EntityHandle) -> TrackingResult<()> {
        let parent = self.composition_parent(handle)?;
        let mut failures = Failures::default();
        self.remove_inner(handle, &mut failures)?;
        if let Some(parent) = parent {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)
    }

    pub(crate) fn remove_inner(
        &mut self,
        handle: EntityHandle,
        failures: &mut Failures,
    ) -> TrackingResult<()> {
        let set = self.locate(handle)?;
        set.check("remove", set.operations().remove)?;
        if self.entity(handle)?.state() == EntityState::Deleted {
            return Ok(());
        }

        for child in self.composition_children(handle)? {
            if self.entity(child)?.state() != EntityState::Deleted {
                self.remove_inner(child, failures)?;
            }
        }

        let entity = self.entity(handle)?;
        let name = entity.type_name().to_string();
        match entity.state() {
            EntityState::New => {
                let mut entity = self.take_entity(handle)?;
                failures.absorb(entity.transition(EntityState::Detached), ())?;
                debug!(container = %self.id, handle = %handle, "dropped new entity");
            }
            EntityState::Unmodified | EntityState::Modified => {
                failures.absorb(self.entity_mut(handle)?.transition(EntityState::Deleted), ())?;
                debug!(container = %self.id, handle = %handle, "marked entity deleted");
            }
            EntityState::Deleted | EntityState::Detached => return Ok(()),
        }
        self.membership_changed(&name, &CollectionChanged::removed(handle), failures);
        Ok(())
    }

    /// Detaches an entity and hands it back. Composed children stay attached.
    pub fn detach(&mut self, handle: EntityHandle) -> TrackingResult<Entity> {
        let parent = self.composition_parent(handle)?;
        let name = self.entity(handle)?.type_name().to_string();
        let mut entity = self.take_entity(handle)?;

        let mut failures = Failures::default();
        failures.absorb(entity.transition(EntityState::Detached), ())?;
        self.membership_changed(&name, &CollectionChanged::removed(handle), &mut failures);
        if let Some(parent) = parent {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)?;
        Ok(entity)
    }

    /// Detaches every entity.
    pub fn clear(&mut self) -> TrackingResult<()> {
        let mut failures = Failures::default();
        for handle in self.handles() {
            let mut entity = self.take_entity(handle)?;
            failures.absorb(entity.transition(EntityState::Detached), ())?;
        }
        self.refs.clear();
        self.collections.clear();
        self.generation += 1;
        for set in self.sets.values() {
            failures.push(set.notify(&CollectionChanged::reset()));
        }
        self.finish(failures)
    }

    fn insert_entity(&mut self, name: &str, entity: Entity) -> EntityHandle {
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(set) = self.sets.get_mut(name) {
            set.insert(slot, entity);
            self.slots.insert(slot, name.to_string());
        }
        EntityHandle::new(self.id, slot)
    }

    pub(crate) fn take_entity(&mut self, handle: EntityHandle) -> TrackingResult<Entity> {
        let name = self
            .slots
            .remove(&handle.slot())
            .filter(|_| handle.container() == self.id)
            .ok_or(TrackingError::UnknownEntity(handle))?;
        self.refs.retain(|(slot, _), _| *slot != handle.slot());
        self.collections.retain(|(slot, _), _| *slot != handle.slot());
        self.sets
            .get_mut(&name)
            .and_then(|set| set.take(handle.slot()))
            .ok_or(TrackingError::UnknownEntity(handle))
    }

    pub(crate) fn membership_changed(
        &mut self,
        name: &str,
        event: &CollectionChanged,
        failures: &mut Failures,
    ) {
        self.generation += 1;
        if let Some(set) = self.sets.get(name) {
            failures.push(set.notify(event));
        }
    }

    // ── Editing ──────────────────────────────────────────────────

    /// Sets a member of an attached entity. Returns false if unchanged.
    pub fn set_value(
        &mut self,
        handle: EntityHandle,
        member: &str,
        value: impl Into<Value>,
    ) -> TrackingResult<bool> {
        self.check_edit(handle)?;
        let mut failures = Failures::default();
        let changed = self.write_member(handle, member, value.into(), &mut failures)?;
        self.finish(failures)?;
        Ok(changed)
    }

    /// Edits a nested object of an attached entity in place.
    pub fn update_complex<F>(&mut self, handle: EntityHandle, member: &str, edit: F) -> TrackingResult<bool>
    where
        F: FnOnce(&mut ComplexObject),
    {
        self.check_edit(handle)?;
        let parent = self.composition_parent(handle)?;
        let mut failures = Failures::default();
        let changed = failures.absorb(self.entity_mut(handle)?.update_complex(member, edit), true)?;
        if let Some(parent) = parent.filter(|_| changed) {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)?;
        Ok(changed)
    }

    /// Records a custom update method invocation.
    pub fn invoke_action(
        &mut self,
        handle: EntityHandle,
        name: &str,
        parameters: Vec<serde_json::Value>,
    ) -> TrackingResult<()> {
        self.check_edit(handle)?;
        let mut failures = Failures::default();
        failures.absorb(self.entity_mut(handle)?.invoke_action(name, parameters), ())?;
        if let Some(parent) = self.composition_parent(handle)? {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)
    }

    pub fn cancel_action(&mut self, handle: EntityHandle, name: &str) -> TrackingResult<bool> {
        let mut failures = Failures::default();
        let cancelled = failures.absorb(self.entity_mut(handle)?.cancel_action(name), true)?;
        if let Some(parent) = self.composition_parent(handle)? {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)?;
        Ok(cancelled)
    }

    /// Resolves the entity's update conflict against the store values.
    pub fn resolve_conflict(&mut self, handle: EntityHandle) -> TrackingResult<()> {
        let mut failures = Failures::default();
        failures.absorb(self.entity_mut(handle)?.resolve_conflict(), ())?;
        self.generation += 1;
        if let Some(parent) = self.composition_parent(handle)? {
            self.refresh_child_changes(parent, &mut failures)?;
        }
        self.finish(failures)
    }

    /// Registers a property callback on one attached entity. Runs under the
    /// container lock like every container notification.
    pub fn subscribe_entity_property_changed<F>(
        &mut self,
        handle: EntityHandle,
        handler: F,
    ) -> TrackingResult<SubscriptionId>
    where
        F: Fn(&PropertyChanged) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        Ok(self.entity_mut(handle)?.subscribe_property_changed(handler))
    }

    fn check_edit(&self, handle: EntityHandle) -> TrackingResult<()> {
        let set = self.locate(handle)?;
        let ops = set.operations();
        match self.entity(handle)?.state() {
            EntityState::New => set.check("add", ops.add),
            _ => set.check("edit", ops.edit),
        }
    }

    /// Writes one member and keeps associations and composition flags in
    /// step with it.
    pub(crate) fn write_member(
        &mut self,
        handle: EntityHandle,
        member: &str,
        value: Value,
        failures: &mut Failures,
    ) -> TrackingResult<bool> {
        let parent_before = self.composition_parent(handle)?;
        let changed = failures.absorb(self.entity_mut(handle)?.set_value(member, value), true)?;
        if !changed {
            return Ok(false);
        }

        let entity_type = Arc::clone(self.entity(handle)?.entity_type());
        if entity_type.is_association_member(member) {
            self.drop_own_caches(handle, &entity_type, member);
        }
        if self.is_association_relevant(&entity_type.name, member) {
            self.generation += 1;
        }

        let parent_after = self.composition_parent(handle)?;
        if let Some(parent) = parent_before {
            self.refresh_child_changes(parent, failures)?;
        }
        if let Some(parent) = parent_after.filter(|p| Some(*p) != parent_before) {
            self.refresh_child_changes(parent, failures)?;
        }
        Ok(true)
    }

    fn drop_own_caches(&mut self, handle: EntityHandle, entity_type: &EntityType, member: &str) {
        for association in &entity_type.associations {
            if association.this_key.iter().any(|k| k == member) {
                let key = (handle.slot(), association.name.clone());
                self.refs.remove(&key);
                self.collections.remove(&key);
            }
        }
    }

    /// True if `member` of `type_name` takes part in any association predicate.
    fn is_association_relevant(&self, type_name: &str, member: &str) -> bool {
        self.sets
            .get(type_name)
            .is_some_and(|set| set.entity_type().is_association_member(member))
            || self.sets.values().any(|set| {
                set.entity_type().associations.iter().any(|a| {
                    a.target_type == type_name && a.other_key.iter().any(|k| k == member)
                })
            })
    }

    /// Recomputes `has_child_changes` for `parent` and its ancestors.
    pub(crate) fn refresh_child_changes(
        &mut self,
        parent: EntityHandle,
        failures: &mut Failures,
    ) -> TrackingResult<()> {
        let mut visited = HashSet::new();
        let mut current = Some(parent);
        while let Some(handle) = current {
            if !visited.insert(handle) || !self.contains(handle) {
                break;
            }
            let pending = self
                .composition_children(handle)?
                .into_iter()
                .filter_map(|child| self.entity(child).ok())
                .any(|child| child.state().has_pending_change());
            failures.absorb(self.entity_mut(handle)?.set_has_child_changes(pending), false)?;
            current = self.composition_parent(handle)?;
        }
        Ok(())
    }

    // ── Accept / reject ──────────────────────────────────────────

    /// Whether any entity has a pending change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.sets.values().any(EntitySet::has_changes)
    }

    /// Commits every pending change locally.
    pub fn accept_changes(&mut self) -> TrackingResult<()> {
        let mut failures = Failures::default();
        let handles = self.handles();
        let (deleted, rest): (Vec<_>, Vec<_>) = handles.into_iter().partition(|h| {
            self.entity(*h)
                .is_ok_and(|e| e.state() == EntityState::Deleted)
        });
        for handle in deleted.into_iter().chain(rest) {
            self.accept_one(handle, &mut failures)?;
        }
        self.finish(failures)
    }

    /// Accepts an entity after its composed children, depth first.
    pub(crate) fn accept_entity(
        &mut self,
        handle: EntityHandle,
        failures: &mut Failures,
    ) -> TrackingResult<()> {
        if !self.contains(handle) {
            return Ok(());
        }
        for child in self.composition_children(handle)? {
            if child != handle {
                self.accept_entity(child, failures)?;
            }
        }
        self.accept_one(handle, failures)
    }

    fn accept_one(&mut self, handle: EntityHandle, failures: &mut Failures) -> TrackingResult<()> {
        if !self.contains(handle) {
            return Ok(());
        }
        let entity = self.entity(handle)?;
        let name = entity.type_name().to_string();
        match entity.state() {
            EntityState::Deleted => {
                let mut entity = self.take_entity(handle)?;
                failures.absorb(entity.accept_changes(), ())?;
                self.membership_changed(&name, &CollectionChanged::removed(handle), failures);
            }
            EntityState::New => {
                let key = entity.key()?;
                self.sets
                    .get_mut(&name)
                    .ok_or_else(|| TrackingError::EntitySetNotFound(name.clone()))?
                    .claim_key(key, handle.slot())?;
                failures.absorb(self.entity_mut(handle)?.accept_changes(), ())?;
                self.generation += 1;
            }
            _ => {
                failures.absorb(self.entity_mut(handle)?.accept_changes(), ())?;
            }
        }
        debug!(container = %self.id, handle = %handle, "accepted entity");
        Ok(())
    }

    /// Reverts every pending change locally: edits and deletes are undone,
    /// new entities are dropped. No server call is made.
    pub fn reject_changes(&mut self) -> TrackingResult<()> {
        let mut failures = Failures::default();
        for handle in self.handles() {
            let entity = self.entity(handle)?;
            let name = entity.type_name().to_string();
            match entity.state() {
                EntityState::New => {
                    let mut entity = self.take_entity(handle)?;
                    failures.absorb(entity.reject_changes(), ())?;
                    self.membership_changed(&name, &CollectionChanged::removed(handle), &mut failures);
                }
                EntityState::Deleted => {
                    failures.absorb(self.entity_mut(handle)?.reject_changes(), ())?;
                    self.membership_changed(&name, &CollectionChanged::added(handle), &mut failures);
                }
                _ => {
                    failures.absorb(self.entity_mut(handle)?.reject_changes(), ())?;
                }
            }
        }
        self.refs.clear();
        self.collections.clear();
        self.generation += 1;
        debug!(container = %self.id, "rejected changes");
        self.finish(failures)
    }

    // ── External references ──────────────────────────────────────

    /// Registers another container for cross-container association
    /// resolution. The reference is weak.
    pub fn add_reference(&mut self, other: &SharedContainer) -> TrackingResult<()> {
        let Some(guard) = other.try_lock() else {
            return Err(TrackingError::InvalidOperation(
                "cannot reference a container that is locked, including this one".into(),
            ));
        };
        if guard.id == self.id {
            return Err(TrackingError::InvalidOperation(
                "a container cannot reference itself".into(),
            ));
        }
        drop(guard);
        self.external.retain(|weak| weak.strong_count() > 0);
        if !self.external.iter().any(|weak| weak.ptr_eq(&Arc::downgrade(other))) {
            self.external.push(Arc::downgrade(other));
        }
        Ok(())
    }

    /// Live external containers.
    pub(crate) fn external_containers(&self) -> Vec<SharedContainer> {
        self.external.iter().filter_map(Weak::upgrade).collect()
    }

    // ── Notifications ────────────────────────────────────────────

    /// Registers a callback for container properties ([`HAS_CHANGES`]).
    ///
    /// The callback runs under the container lock; calling back into the
    /// same [`SharedContainer`] from it deadlocks.
    pub fn subscribe_property_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&PropertyChanged) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.property_changed.subscribe(handler)
    }

    pub fn unsubscribe_property_changed(&mut self, id: SubscriptionId) -> bool {
        self.property_changed.unsubscribe(id)
    }

    /// Raises `has_changes` if it flipped, then reports collected failures.
    pub(crate) fn finish(&mut self, mut failures: Failures) -> TrackingResult<()> {
        let has_changes = self.has_changes();
        if has_changes != self.has_changes {
            self.has_changes = has_changes;
            failures.push(self.property_changed.notify(&PropertyChanged::new(HAS_CHANGES)));
        }
        failures.into_result()
    }
}

impl Default for EntityContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityContainer")
            .field("id", &self.id)
            .field("sets", &self.sets)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
