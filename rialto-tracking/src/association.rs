//! Association resolution between attached entities.
//!
//! A to-one association (an entity ref) and a to-many association (an entity
//! collection) are both predicates: the source's `this_key` members must
//! equal the target's `other_key` members. Results are cached per
//! `(slot, association)` and stamped with the container generation, which
//! moves whenever set membership or an association-relevant member changes.
//!
//! Explicit assignments are cached as *assigned* and ignore generation
//! changes. They are dropped when the source's own key members change or the
//! assigned target leaves the container.

use rialto_model::{AssociationMetadata, Entity, Multiplicity, Value};
use rialto_types::{EntityHandle, EntityState};
use serde_json::Value as J;
use tracing::debug;

use crate::container::EntityContainer;
use crate::error::{Failures, TrackingError, TrackingResult};

#[derive(Debug, Clone)]
pub(crate) struct CachedRef {
    generation: u64,
    target: Option<EntityHandle>,
    assigned: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CachedCollection {
    generation: u64,
    members: Vec<EntityHandle>,
}

fn keys_match(entity: &Entity, members: &[String], values: &[J]) -> bool {
    members.len() == values.len()
        && members
            .iter()
            .zip(values)
            .all(|(member, value)| entity.scalar(member) == value)
}

impl EntityContainer {
    // ── Entity refs ──────────────────────────────────────────────

    /// Resolves a to-one association of `handle`.
    ///
    /// Deleted targets never match and a null key matches nothing. When no
    /// local target matches, referenced external containers are searched;
    /// external hits are returned as handles of their own container and are
    /// not cached.
    pub fn resolve_ref(
        &mut self,
        handle: EntityHandle,
        association: &str,
    ) -> TrackingResult<Option<EntityHandle>> {
        let assoc = self.association_of(handle, association, Multiplicity::One)?;
        let cache_key = (handle.slot(), assoc.name.clone());

        if let Some(cached) = self.refs.get(&cache_key) {
            if cached.assigned {
                match cached.target {
                    Some(target) if !self.contains(target) => {
                        self.refs.remove(&cache_key);
                    }
                    target => return Ok(target),
                }
            } else if cached.generation == self.generation {
                return Ok(cached.target);
            }
        }

        let Some(values) = self.source_values(handle, &assoc)? else {
            return Ok(None);
        };
        let local = self.matches(&assoc.target_type, &assoc.other_key, &values, false);
        if let Some(target) = local.first().copied() {
            self.refs.insert(
                cache_key,
                CachedRef {
                    generation: self.generation,
                    target: Some(target),
                    assigned: false,
                },
            );
            return Ok(Some(target));
        }

        if let Some(target) = self.resolve_external(&assoc, &values) {
            return Ok(Some(target));
        }
        self.refs.insert(
            cache_key,
            CachedRef {
                generation: self.generation,
                target: None,
                assigned: false,
            },
        );
        Ok(None)
    }

    /// Points a to-one association at `target`, or clears it.
    ///
    /// Writes the foreign key on whichever side holds it. For a composition
    /// the previously referenced child is removed.
    pub fn assign_ref(
        &mut self,
        handle: EntityHandle,
        association: &str,
        target: Option<EntityHandle>,
    ) -> TrackingResult<()> {
        let assoc = self.association_of(handle, association, Multiplicity::One)?;
        if let Some(target) = target {
            self.check_target(&assoc, target)?;
        }
        let previous = self.resolve_ref(handle, association)?;

        let mut failures = Failures::default();
        if let Some(old) = previous.filter(|old| Some(*old) != target && self.contains(*old)) {
            if assoc.is_composition {
                self.remove_inner(old, &mut failures)?;
            } else if !assoc.is_foreign_key {
                self.write_key(old, &assoc.other_key, &vec![J::Null; assoc.other_key.len()], &mut failures)?;
            }
        }

        if assoc.is_foreign_key {
            let values = match target {
                Some(target) => {
                    let entity = self.entity(target)?;
                    assoc.other_key.iter().map(|k| entity.scalar(k).clone()).collect()
                }
                None => vec![J::Null; assoc.this_key.len()],
            };
            self.write_key(handle, &assoc.this_key, &values, &mut failures)?;
        } else if let Some(target) = target {
            let entity = self.entity(handle)?;
            let values: Vec<J> = assoc.this_key.iter().map(|k| entity.scalar(k).clone()).collect();
            self.write_key(target, &assoc.other_key, &values, &mut failures)?;
        }

        self.refs.insert(
            (handle.slot(), assoc.name.clone()),
            CachedRef {
                generation: self.generation,
                target,
                assigned: true,
            },
        );
        if assoc.is_composition {
            self.refresh_child_changes(handle, &mut failures)?;
        }
        debug!(handle = %handle, association = %assoc.name, target = ?target, "assigned entity ref");
        self.finish(failures)
    }

    /// Adds a detached entity and assigns it to a to-one association.
    pub fn assign_new_ref(
        &mut self,
        handle: EntityHandle,
        association: &str,
        entity: Entity,
    ) -> TrackingResult<EntityHandle> {
        self.association_of(handle, association, Multiplicity::One)?;
        let target = self.add(entity)?;
        self.assign_ref(handle, association, Some(target))?;
        Ok(target)
    }

    // ── Entity collections ───────────────────────────────────────

    /// Resolves a to-many association of `handle` in attach order.
    pub fn collection(
        &mut self,
        handle: EntityHandle,
        association: &str,
    ) -> TrackingResult<Vec<EntityHandle>> {
        let assoc = self.association_of(handle, association, Multiplicity::Many)?;
        let cache_key = (handle.slot(), assoc.name.clone());
        if let Some(cached) = self.collections.get(&cache_key) {
            if cached.generation == self.generation {
                return Ok(cached.members.clone());
            }
        }

        let Some(values) = self.source_values(handle, &assoc)? else {
            return Ok(Vec::new());
        };
        let members = self.matches(&assoc.target_type, &assoc.other_key, &values, false);
        self.collections.insert(
            cache_key,
            CachedCollection {
                generation: self.generation,
                members: members.clone(),
            },
        );
        Ok(members)
    }

    /// Makes `child` a member of the collection by writing its foreign key.
    pub fn add_to_collection(
        &mut self,
        handle: EntityHandle,
        association: &str,
        child: EntityHandle,
    ) -> TrackingResult<()> {
        let assoc = self.association_of(handle, association, Multiplicity::Many)?;
        self.check_target(&assoc, child)?;

        let entity = self.entity(handle)?;
        let values: Vec<J> = assoc.this_key.iter().map(|k| entity.scalar(k).clone()).collect();
        let mut failures = Failures::default();
        self.write_key(child, &assoc.other_key, &values, &mut failures)?;
        if assoc.is_composition {
            self.refresh_child_changes(handle, &mut failures)?;
        }
        self.finish(failures)
    }

    /// Adds a detached entity and makes it a member of the collection.
    pub fn add_new_to_collection(
        &mut self,
        handle: EntityHandle,
        association: &str,
        entity: Entity,
    ) -> TrackingResult<EntityHandle> {
        self.association_of(handle, association, Multiplicity::Many)?;
        let child = self.add(entity)?;
        self.add_to_collection(handle, association, child)?;
        Ok(child)
    }

    /// Takes `child` out of the collection. A composed child is removed; any
    /// other child has its foreign key nulled.
    pub fn remove_from_collection(
        &mut self,
        handle: EntityHandle,
        association: &str,
        child: EntityHandle,
    ) -> TrackingResult<()> {
        let assoc = self.association_of(handle, association, Multiplicity::Many)?;
        self.check_cross_container(child)?;
        if !self.collection(handle, association)?.contains(&child) {
            return Err(TrackingError::InvalidOperation(format!(
                "{child} is not a member of '{}' on {handle}",
                assoc.name
            )));
        }

        let mut failures = Failures::default();
        if assoc.is_composition {
            self.remove_inner(child, &mut failures)?;
            self.refresh_child_changes(handle, &mut failures)?;
        } else {
            let nulls = vec![J::Null; assoc.other_key.len()];
            self.write_key(child, &assoc.other_key, &nulls, &mut failures)?;
        }
        self.finish(failures)
    }

    // ── Composition ──────────────────────────────────────────────

    /// Children composed by `handle`, deleted ones included.
    pub fn composition_children(&self, handle: EntityHandle) -> TrackingResult<Vec<EntityHandle>> {
        let entity = self.entity(handle)?;
        let mut children = Vec::new();
        for assoc in entity.entity_type().associations.iter().filter(|a| a.is_composition) {
            let values: Vec<J> = assoc.this_key.iter().map(|k| entity.scalar(k).clone()).collect();
            if values.iter().any(J::is_null) {
                continue;
            }
            for child in self.matches(&assoc.target_type, &assoc.other_key, &values, true) {
                if child != handle && !children.contains(&child) {
                    children.push(child);
                }
            }
        }
        Ok(children)
    }

    /// The entity composing `handle`, if any.
    pub fn composition_parent(&self, handle: EntityHandle) -> TrackingResult<Option<EntityHandle>> {
        let child = self.entity(handle)?;
        for set in self.entity_sets() {
            let composing = set
                .entity_type()
                .associations
                .iter()
                .filter(|a| a.is_composition && a.target_type == child.type_name());
            for assoc in composing {
                let values: Vec<J> = assoc.other_key.iter().map(|k| child.scalar(k).clone()).collect();
                if values.iter().any(J::is_null) {
                    continue;
                }
                let parent = set
                    .iter()
                    .find(|(h, parent)| *h != handle && keys_match(parent, &assoc.this_key, &values));
                if let Some((parent, _)) = parent {
                    return Ok(Some(parent));
                }
            }
        }
        Ok(None)
    }

    // ── Internals ────────────────────────────────────────────────

    fn association_of(
        &self,
        handle: EntityHandle,
        association: &str,
        multiplicity: Multiplicity,
    ) -> TrackingResult<AssociationMetadata> {
        let entity = self.entity(handle)?;
        let assoc = entity
            .entity_type()
            .association(association)
            .filter(|a| a.multiplicity == multiplicity)
            .ok_or_else(|| TrackingError::UnknownAssociation {
                entity_type: entity.type_name().to_string(),
                association: association.to_string(),
            })?;
        Ok(assoc.clone())
    }

    fn check_target(&self, assoc: &AssociationMetadata, target: EntityHandle) -> TrackingResult<()> {
        self.check_cross_container(target)?;
        let entity = self.entity(target)?;
        if entity.type_name() != assoc.target_type {
            return Err(TrackingError::InvalidOperation(format!(
                "association '{}' expects '{}', got '{}'",
                assoc.name,
                assoc.target_type,
                entity.type_name()
            )));
        }
        if entity.state() == EntityState::Deleted {
            return Err(TrackingError::InvalidOperation(format!(
                "cannot associate deleted entity {target}"
            )));
        }
        Ok(())
    }

    /// The source's key values, or `None` if any is null.
    fn source_values(
        &self,
        handle: EntityHandle,
        assoc: &AssociationMetadata,
    ) -> TrackingResult<Option<Vec<J>>> {
        let entity = self.entity(handle)?;
        let values: Vec<J> = assoc.this_key.iter().map(|k| entity.scalar(k).clone()).collect();
        Ok((!values.iter().any(J::is_null)).then_some(values))
    }

    fn matches(
        &self,
        target_type: &str,
        members: &[String],
        values: &[J],
        include_deleted: bool,
    ) -> Vec<EntityHandle> {
        let Ok(set) = self.entity_set(target_type) else {
            return Vec::new();
        };
        set.iter()
            .filter(|(_, e)| include_deleted || e.state() != EntityState::Deleted)
            .filter(|(_, e)| keys_match(e, members, values))
            .map(|(h, _)| h)
            .collect()
    }

    fn resolve_external(&self, assoc: &AssociationMetadata, values: &[J]) -> Option<EntityHandle> {
        self.external_containers().into_iter().find_map(|other| {
            let other = other.try_lock()?;
            other
                .matches(&assoc.target_type, &assoc.other_key, values, false)
                .first()
                .copied()
        })
    }

    fn write_key(
        &mut self,
        handle: EntityHandle,
        members: &[String],
        values: &[J],
        failures: &mut Failures,
    ) -> TrackingResult<()> {
        for (member, value) in members.iter().zip(values) {
            self.write_member(handle, member, Value::Scalar(value.clone()), failures)?;
        }
        Ok(())
    }
}
