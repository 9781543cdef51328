//! Applying a server's verdict on a submitted change set.

use rialto_client::{ChangeSetEntry, EntityChangeSet, EntityOperationType};
use rialto_types::{EntityHandle, EntityState};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::container::EntityContainer;
use crate::error::{Failures, TrackingResult};

/// How a submit ended for the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Every entry succeeded; the changes were synchronized and accepted.
    Accepted,
    /// Some entries carried validation errors; nothing was accepted.
    ValidationFailed(Vec<EntityHandle>),
    /// Some entries conflicted with the store; nothing was accepted.
    Conflicts(Vec<EntityHandle>),
}

impl SubmitOutcome {
    /// The entities that failed, if any.
    #[must_use]
    pub fn entities_in_error(&self) -> &[EntityHandle] {
        match self {
            Self::Accepted => &[],
            Self::ValidationFailed(entities) | Self::Conflicts(entities) => entities,
        }
    }
}

impl EntityContainer {
    /// Sets or clears `is_submitting` on every entity of the change set that
    /// is still attached.
    pub fn set_submitting(&mut self, change_set: &EntityChangeSet, value: bool) -> TrackingResult<()> {
        let mut failures = Failures::default();
        for item in change_set.items() {
            if let Ok(entity) = self.entity_mut(item.handle) {
                failures.absorb(entity.set_submitting(value), ())?;
            }
        }
        failures.into_result()
    }

    /// Applies per-entry submit results.
    ///
    /// Validation errors and conflicts are attached to their entities and
    /// abort the submit, validation taking precedence. Otherwise server state
    /// is synchronized into every non-delete entry and the change set is
    /// accepted: every delete first, children before parents, then inserts
    /// and updates, each top-level entity after its composed children.
    ///
    /// An error reported for an entity detached while the submit was in
    /// flight still fails the whole batch.
    pub fn apply_submit_results(
        &mut self,
        change_set: &EntityChangeSet,
        results: &[ChangeSetEntry],
    ) -> TrackingResult<SubmitOutcome> {
        let mut failures = Failures::default();
        let mut invalid = Vec::new();
        let mut conflicted = Vec::new();

        for entry in results.iter().filter(|e| e.has_error()) {
            if !entry.validation_errors.is_empty() {
                invalid.push(entry.handle);
            }
            if let Some(conflict) = &entry.conflict {
                warn!(
                    handle = %entry.handle,
                    entity_type = %entry.entity_type,
                    deleted = conflict.is_deleted(),
                    members = ?conflict.conflicting_members(),
                    "submit conflict"
                );
                conflicted.push(entry.handle);
            }
            // The batch still fails; only the error bookkeeping is skipped.
            let Ok(entity) = self.entity_mut(entry.handle) else {
                debug!(handle = %entry.handle, "failed entry belongs to an entity no longer attached");
                continue;
            };
            if !entry.validation_errors.is_empty() {
                failures.absorb(entity.add_validation_errors(entry.validation_errors.clone()), ())?;
            }
            if let Some(conflict) = &entry.conflict {
                failures.absorb(entity.set_conflict(conflict.clone()), ())?;
            }
        }

        if !invalid.is_empty() {
            self.finish(failures)?;
            return Ok(SubmitOutcome::ValidationFailed(invalid));
        }
        if !conflicted.is_empty() {
            self.finish(failures)?;
            return Ok(SubmitOutcome::Conflicts(conflicted));
        }

        for entry in results {
            if entry.operation == EntityOperationType::Delete {
                continue;
            }
            let Some(server_state) = &entry.server_state else {
                continue;
            };
            if let Ok(entity) = self.entity_mut(entry.handle) {
                failures.absorb(entity.apply_server_state(server_state), Vec::new())?;
                debug!(handle = %entry.handle, "synchronized server state");
            }
        }
        self.generation += 1;

        // Every delete is committed before any insert claims a key, so a key
        // moved from a deleted entity to a new one is free by then.
        for item in change_set.removed() {
            self.accept_entity(item.handle, &mut failures)?;
        }
        let in_change_set: HashSet<EntityHandle> = change_set.items().map(|i| i.handle).collect();
        let ordered: Vec<EntityHandle> = change_set
            .added()
            .iter()
            .chain(change_set.modified())
            .filter(|item| item.parent.is_none_or(|p| !in_change_set.contains(&p)))
            .map(|item| item.handle)
            .collect();
        for handle in ordered {
            self.accept_entity(handle, &mut failures)?;
        }

        // Entities whose parent link changed during synchronization.
        for item in change_set.items() {
            let pending = self
                .entity(item.handle)
                .is_ok_and(|e| e.state() != EntityState::Unmodified);
            if pending {
                self.accept_entity(item.handle, &mut failures)?;
            }
        }

        debug!(entries = change_set.len(), "accepted submitted changes");
        self.finish(failures)?;
        Ok(SubmitOutcome::Accepted)
    }
}
