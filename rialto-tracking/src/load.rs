//! Merging loaded entities into a container.

use rialto_client::EntityPayload;
use rialto_model::Entity;
use rialto_types::{EntityHandle, LoadBehavior};
use std::sync::Arc;
use tracing::debug;

use crate::container::EntityContainer;
use crate::error::{Failures, TrackingResult};

/// Handles produced by merging one query response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedEntities {
    /// The primary results, in response order.
    pub entities: Vec<EntityHandle>,
    /// Primary and included results, each handle once.
    pub all_entities: Vec<EntityHandle>,
}

impl EntityContainer {
    /// Merges one loaded entity.
    ///
    /// An entity already attached under the same key is merged with
    /// `behavior`; otherwise the payload is attached as `Unmodified`.
    pub fn load_entity(
        &mut self,
        payload: &EntityPayload,
        behavior: LoadBehavior,
    ) -> TrackingResult<EntityHandle> {
        let mut failures = Failures::default();
        let handle = self.load_inner(payload, behavior, &mut failures)?;
        self.finish(failures)?;
        Ok(handle)
    }

    /// Merges a query response: primary results, then included ones.
    ///
    /// Stops at the first payload that cannot be merged; payloads before it
    /// stay merged.
    pub fn merge_payloads(
        &mut self,
        entities: &[EntityPayload],
        included: &[EntityPayload],
        behavior: LoadBehavior,
    ) -> TrackingResult<MergedEntities> {
        let mut failures = Failures::default();
        let mut merged = MergedEntities::default();
        for payload in entities {
            let handle = self.load_inner(payload, behavior, &mut failures)?;
            merged.entities.push(handle);
            if !merged.all_entities.contains(&handle) {
                merged.all_entities.push(handle);
            }
        }
        for payload in included {
            let handle = self.load_inner(payload, behavior, &mut failures)?;
            if !merged.all_entities.contains(&handle) {
                merged.all_entities.push(handle);
            }
        }
        self.finish(failures)?;
        Ok(merged)
    }

    fn load_inner(
        &mut self,
        payload: &EntityPayload,
        behavior: LoadBehavior,
        failures: &mut Failures,
    ) -> TrackingResult<EntityHandle> {
        let set = self.entity_set(&payload.entity_type)?;
        let entity = Entity::from_state(Arc::clone(set.entity_type()), &payload.state)?;
        let key = entity.key()?;

        let Some(handle) = set.find(&key) else {
            return self.attach_inner(entity, failures);
        };
        let changed = failures.absorb(
            self.entity_mut(handle)?.merge(&payload.state, behavior),
            Vec::new(),
        )?;
        if !changed.is_empty() {
            self.generation += 1;
        }
        debug!(handle = %handle, behavior = ?behavior, changed = changed.len(), "merged loaded entity");
        Ok(handle)
    }
}
