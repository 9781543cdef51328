//! Building the change set of a container.

use rialto_client::{ChangeSetItem, EntityChangeSet};
use rialto_model::StateMap;
use rialto_types::{EntityHandle, EntityState};
use std::collections::HashSet;

use crate::container::EntityContainer;
use crate::error::TrackingResult;

impl EntityContainer {
    /// Snapshots every pending change.
    ///
    /// Inserts are ordered parent before child along compositions, deletes
    /// child before parent; otherwise entities keep attach order.
    pub fn get_changes(&self) -> TrackingResult<EntityChangeSet> {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();
        for handle in self.handles() {
            match self.entity(handle)?.state() {
                EntityState::New => added.push(handle),
                EntityState::Modified => modified.push(handle),
                EntityState::Deleted => removed.push(handle),
                EntityState::Unmodified | EntityState::Detached => {}
            }
        }

        let added = self.parents_first(&added)?;
        let removed = self.children_first(&removed)?;
        Ok(EntityChangeSet::new(
            self.items(&added)?,
            self.items(&modified)?,
            self.items(&removed)?,
        ))
    }

    fn items(&self, handles: &[EntityHandle]) -> TrackingResult<Vec<ChangeSetItem>> {
        handles.iter().map(|h| self.change_set_item(*h)).collect()
    }

    fn change_set_item(&self, handle: EntityHandle) -> TrackingResult<ChangeSetItem> {
        let entity = self.entity(handle)?;
        let state = entity.state();
        let current = entity.current_state()?;
        let original = match state {
            EntityState::Modified | EntityState::Deleted => Some(
                entity
                    .round_trip_original()
                    .unwrap_or_else(|| round_trip_members(entity, &current)),
            ),
            _ => None,
        };
        Ok(ChangeSetItem {
            handle,
            entity_type: entity.type_name().to_string(),
            state,
            current,
            original,
            actions: entity.actions().to_vec(),
            parent: self.composition_parent(handle)?,
        })
    }

    fn parents_first(&self, pending: &[EntityHandle]) -> TrackingResult<Vec<EntityHandle>> {
        let members: HashSet<EntityHandle> = pending.iter().copied().collect();
        let mut visited = HashSet::new();
        let mut ordered = Vec::with_capacity(pending.len());
        for handle in pending {
            self.visit_parent_first(*handle, &members, &mut visited, &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit_parent_first(
        &self,
        handle: EntityHandle,
        members: &HashSet<EntityHandle>,
        visited: &mut HashSet<EntityHandle>,
        ordered: &mut Vec<EntityHandle>,
    ) -> TrackingResult<()> {
        if !visited.insert(handle) {
            return Ok(());
        }
        if let Some(parent) = self.composition_parent(handle)? {
            if members.contains(&parent) {
                self.visit_parent_first(parent, members, visited, ordered)?;
            }
        }
        ordered.push(handle);
        Ok(())
    }

    fn children_first(&self, pending: &[EntityHandle]) -> TrackingResult<Vec<EntityHandle>> {
        let members: HashSet<EntityHandle> = pending.iter().copied().collect();
        let mut visited = HashSet::new();
        let mut ordered = Vec::with_capacity(pending.len());
        for handle in pending {
            self.visit_children_first(*handle, &members, &mut visited, &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit_children_first(
        &self,
        handle: EntityHandle,
        members: &HashSet<EntityHandle>,
        visited: &mut HashSet<EntityHandle>,
        ordered: &mut Vec<EntityHandle>,
    ) -> TrackingResult<()> {
        if !visited.insert(handle) {
            return Ok(());
        }
        for child in self.composition_children(handle)? {
            if members.contains(&child) {
                self.visit_children_first(child, members, visited, ordered)?;
            }
        }
        ordered.push(handle);
        Ok(())
    }
}

/// Round-trip members of an entity deleted without prior edits.
fn round_trip_members(entity: &rialto_model::Entity, current: &StateMap) -> StateMap {
    current
        .iter()
        .filter(|(name, _)| {
            entity
                .entity_type()
                .member(name)
                .is_some_and(|m| m.round_trip_original)
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
