//! The change-tracked entity.
//!
//! An [`Entity`] holds member values plus everything change tracking needs:
//! its [`EntityState`], an original-value snapshot taken on the first edit,
//! recorded custom-method invocations, validation errors and an optional
//! conflict. Every mutation recomputes the state and raises property-changed
//! notifications to subscribers.

use rialto_types::{
    AggregateError, EntityKey, EntityState, LoadBehavior, PropertyChanged, SubscriberError,
    Subscribers, SubscriptionId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::conflict::EntityConflict;
use crate::error::{ModelError, ModelResult};
use crate::merge::Merger;
use crate::metadata::{EntityType, MemberMetadata};
use crate::snapshot::{extract_state, value_state};
use crate::validation::ValidationResult;
use crate::value::{ComplexObject, StateMap, Value};

/// Property names raised through [`Entity::subscribe_property_changed`] in
/// addition to member names.
pub mod property {
    pub const ENTITY_STATE: &str = "entity_state";
    pub const ENTITY_ACTIONS: &str = "entity_actions";
    pub const ENTITY_CONFLICT: &str = "entity_conflict";
    pub const IS_SUBMITTING: &str = "is_submitting";
    pub const VALIDATION_ERRORS: &str = "validation_errors";
}

static NULL: serde_json::Value = serde_json::Value::Null;

/// A recorded invocation of a custom update method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAction {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<serde_json::Value>,
}

impl EntityAction {
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// A change-tracked business object.
#[derive(Debug)]
pub struct Entity {
    entity_type: Arc<EntityType>,
    values: BTreeMap<String, Value>,
    state: EntityState,
    original: Option<StateMap>,
    actions: Vec<EntityAction>,
    validation_errors: Vec<ValidationResult>,
    conflict: Option<EntityConflict>,
    is_submitting: bool,
    is_merging_state: bool,
    has_child_changes: bool,
    property_changed: Subscribers<PropertyChanged>,
}

impl Entity {
    /// Creates a detached entity with every member empty.
    #[must_use]
    pub fn new(entity_type: Arc<EntityType>) -> Self {
        let values = entity_type
            .members
            .iter()
            .map(|m| (m.name.clone(), Value::empty(m.kind)))
            .collect();
        Self {
            entity_type,
            values,
            state: EntityState::Detached,
            original: None,
            actions: Vec::new(),
            validation_errors: Vec::new(),
            conflict: None,
            is_submitting: false,
            is_merging_state: false,
            has_child_changes: false,
            property_changed: Subscribers::new(),
        }
    }

    /// Creates a detached entity from serialized state. Members the type does
    /// not declare are ignored.
    pub fn from_state(entity_type: Arc<EntityType>, state: &StateMap) -> ModelResult<Self> {
        let mut entity = Self::new(entity_type);
        for (name, value) in state {
            match entity.entity_type.member(name) {
                Some(meta) => {
                    let value = Value::from_state(name, meta.kind, value)?;
                    entity.values.insert(name.clone(), value);
                }
                None => debug!(
                    entity_type = %entity.entity_type.name,
                    member = %name,
                    "ignoring undeclared member"
                ),
            }
        }
        Ok(entity)
    }

    /// Builder-style member assignment for detached entities.
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> ModelResult<Self> {
        self.set_value(name, value)?;
        Ok(self)
    }

    // ── Accessors ────────────────────────────────────────────────

    #[must_use]
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.entity_type.name
    }

    #[must_use]
    pub fn state(&self) -> EntityState {
        self.state
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Scalar value of a member; null for unknown or non-scalar members.
    #[must_use]
    pub fn scalar(&self, name: &str) -> &serde_json::Value {
        self.values
            .get(name)
            .and_then(Value::as_scalar)
            .unwrap_or(&NULL)
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The identity key built from the key members in declaration order.
    pub fn key(&self) -> ModelResult<EntityKey> {
        if self.entity_type.key_members.is_empty() {
            return Err(ModelError::InvalidOperation(format!(
                "entity type '{}' declares no key members",
                self.entity_type.name
            )));
        }
        let parts = self
            .entity_type
            .key_members
            .iter()
            .map(|member| (member.as_str(), self.scalar(member)));
        Ok(EntityKey::from_json(parts)?)
    }

    /// Serialized current values of every member.
    pub fn current_state(&self) -> ModelResult<StateMap> {
        extract_state(&self.values)
    }

    /// The original-value snapshot, present while edits are pending.
    #[must_use]
    pub fn original_state(&self) -> Option<&StateMap> {
        self.original.as_ref()
    }

    /// Original values of the members that round-trip them on update.
    #[must_use]
    pub fn round_trip_original(&self) -> Option<StateMap> {
        self.original.as_ref().map(|original| {
            original
                .iter()
                .filter(|(name, _)| {
                    self.entity_type
                        .member(name)
                        .is_some_and(|m| m.round_trip_original)
                })
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
    }

    /// Members whose current value differs from the original snapshot.
    pub fn modified_members(&self) -> ModelResult<Vec<String>> {
        let Some(original) = &self.original else {
            return Ok(Vec::new());
        };
        let current = self.current_state()?;
        Ok(original
            .iter()
            .filter(|(name, value)| current.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// True when members, actions or composed children carry pending changes.
    pub fn has_changes(&self) -> ModelResult<bool> {
        Ok(!self.actions.is_empty() || self.has_child_changes || !self.modified_members()?.is_empty())
    }

    #[must_use]
    pub fn actions(&self) -> &[EntityAction] {
        &self.actions
    }

    #[must_use]
    pub fn validation_errors(&self) -> &[ValidationResult] {
        &self.validation_errors
    }

    #[must_use]
    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    #[must_use]
    pub fn conflict(&self) -> Option<&EntityConflict> {
        self.conflict.as_ref()
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    #[must_use]
    pub fn is_merging_state(&self) -> bool {
        self.is_merging_state
    }

    #[must_use]
    pub fn has_child_changes(&self) -> bool {
        self.has_child_changes
    }

    // ── Editing ──────────────────────────────────────────────────

    /// Sets a member value. Returns false if the value was unchanged.
    ///
    /// The first edit of an attached entity snapshots every member, and the
    /// state is recomputed afterwards, so restoring all originals returns the
    /// entity to `Unmodified`.
    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<bool> {
        let value = value.into();
        let meta = self.member_meta(name)?;
        if !value.fits(meta.kind) {
            return Err(ModelError::KindMismatch {
                member: name.to_string(),
                expected: meta.kind.as_str(),
            });
        }
        match self.state {
            EntityState::Deleted => {
                return Err(ModelError::InvalidOperation(format!(
                    "cannot edit deleted '{}' entity",
                    self.entity_type.name
                )));
            }
            EntityState::Unmodified | EntityState::Modified
                if self.entity_type.is_key_member(name) =>
            {
                return Err(ModelError::KeyMemberImmutable {
                    entity_type: self.entity_type.name.clone(),
                    member: name.to_string(),
                });
            }
            _ => {}
        }

        let current = self.values.get(name).map(value_state).transpose()?;
        if current.as_ref() == Some(&value_state(&value)?) {
            return Ok(false);
        }
        self.ensure_snapshot()?;
        self.values.insert(name.to_string(), value);

        let mut changed = vec![name.to_string()];
        if !self.is_merging_state && self.update_change_state()? {
            changed.push(property::ENTITY_STATE.to_string());
        }
        self.notify_all(&changed)?;
        Ok(true)
    }

    /// Edits a nested object in place, tracking the change like
    /// [`set_value`](Self::set_value). Returns false if nothing changed.
    pub fn update_complex<F>(&mut self, name: &str, edit: F) -> ModelResult<bool>
    where
        F: FnOnce(&mut ComplexObject),
    {
        self.member_meta(name)?;
        if self.state == EntityState::Deleted {
            return Err(ModelError::InvalidOperation(format!(
                "cannot edit deleted '{}' entity",
                self.entity_type.name
            )));
        }
        let Some(object) = self.values.get(name).and_then(Value::as_complex).cloned() else {
            return Err(ModelError::KindMismatch {
                member: name.to_string(),
                expected: "complex",
            });
        };
        let before = value_state(&Value::Complex(object.clone()))?;
        self.ensure_snapshot()?;
        edit(&mut *object.write());
        if value_state(&Value::Complex(object))? == before {
            // drops the snapshot if it was taken for nothing
            self.update_change_state()?;
            return Ok(false);
        }

        let mut changed = vec![name.to_string()];
        if !self.is_merging_state && self.update_change_state()? {
            changed.push(property::ENTITY_STATE.to_string());
        }
        self.notify_all(&changed)?;
        Ok(true)
    }

    /// Records a custom update method invocation.
    pub fn invoke_action(
        &mut self,
        name: &str,
        parameters: Vec<serde_json::Value>,
    ) -> ModelResult<()> {
        if matches!(self.state, EntityState::Detached | EntityState::Deleted) {
            return Err(ModelError::InvalidOperation(format!(
                "cannot invoke '{name}' on a {} entity",
                self.state
            )));
        }
        if self.actions.iter().any(|a| a.name == name) {
            return Err(ModelError::InvalidOperation(format!(
                "'{name}' has already been invoked on this entity"
            )));
        }
        self.ensure_snapshot()?;
        self.actions.push(EntityAction::new(name, parameters));
        let mut changed = vec![property::ENTITY_ACTIONS.to_string()];
        if self.update_change_state()? {
            changed.push(property::ENTITY_STATE.to_string());
        }
        self.notify_all(&changed)
    }

    /// Drops a recorded custom method invocation. Returns false if none was
    /// recorded under `name`.
    pub fn cancel_action(&mut self, name: &str) -> ModelResult<bool> {
        let before = self.actions.len();
        self.actions.retain(|a| a.name != name);
        if self.actions.len() == before {
            return Ok(false);
        }
        let mut changed = vec![property::ENTITY_ACTIONS.to_string()];
        if self.update_change_state()? {
            changed.push(property::ENTITY_STATE.to_string());
        }
        self.notify_all(&changed)?;
        Ok(true)
    }

    // ── State machine ────────────────────────────────────────────

    /// Moves to `to`, failing for transitions the state machine forbids.
    pub fn transition(&mut self, to: EntityState) -> ModelResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(ModelError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(entity_type = %self.entity_type.name, from = %self.state, to = %to, "state transition");
        self.state = to;
        self.notify(property::ENTITY_STATE)
    }

    /// Recomputes `Unmodified` / `Modified` from the pending changes. Other
    /// states are left alone. Returns true if the state changed.
    pub fn update_change_state(&mut self) -> ModelResult<bool> {
        if !matches!(self.state, EntityState::Unmodified | EntityState::Modified) {
            return Ok(false);
        }
        let next = if self.has_changes()? {
            EntityState::Modified
        } else {
            self.original = None;
            EntityState::Unmodified
        };
        if next == self.state {
            return Ok(false);
        }
        debug!(entity_type = %self.entity_type.name, from = %self.state, to = %next, "change state recomputed");
        self.state = next;
        Ok(true)
    }

    /// Flags pending changes in composed children. Returns true if the
    /// entity's state changed as a result.
    pub fn set_has_child_changes(&mut self, value: bool) -> ModelResult<bool> {
        if self.has_child_changes == value {
            return Ok(false);
        }
        self.has_child_changes = value;
        let changed = self.update_change_state()?;
        if changed {
            self.notify(property::ENTITY_STATE)?;
        }
        Ok(changed)
    }

    /// Commits pending changes: `New`/`Modified` become `Unmodified`,
    /// `Deleted` becomes `Detached`.
    pub fn accept_changes(&mut self) -> ModelResult<()> {
        let next = match self.state {
            EntityState::New | EntityState::Modified | EntityState::Unmodified => {
                EntityState::Unmodified
            }
            EntityState::Deleted => EntityState::Detached,
            EntityState::Detached => {
                return Err(ModelError::InvalidOperation(
                    "cannot accept changes of a detached entity".to_string(),
                ));
            }
        };
        self.clear_pending();
        if next != self.state {
            self.transition(next)?;
        }
        Ok(())
    }

    /// Reverts pending changes locally: values return to the snapshot,
    /// `Modified`/`Deleted` become `Unmodified` and `New` becomes `Detached`.
    pub fn reject_changes(&mut self) -> ModelResult<()> {
        if let Some(original) = self.original.take() {
            for (name, state) in &original {
                if let Some(meta) = self.entity_type.member(name) {
                    let value = Value::from_state(name, meta.kind, state)?;
                    self.values.insert(name.clone(), value);
                }
            }
        }
        self.clear_pending();
        let next = match self.state {
            EntityState::New => EntityState::Detached,
            EntityState::Modified | EntityState::Deleted => EntityState::Unmodified,
            other => other,
        };
        if next != self.state {
            self.transition(next)?;
        }
        Ok(())
    }

    fn clear_pending(&mut self) {
        self.original = None;
        self.actions.clear();
        self.validation_errors.clear();
        self.conflict = None;
        self.has_child_changes = false;
    }

    // ── Submit bookkeeping ───────────────────────────────────────

    pub fn set_submitting(&mut self, value: bool) -> ModelResult<()> {
        if self.is_submitting == value {
            return Ok(());
        }
        self.is_submitting = value;
        self.notify(property::IS_SUBMITTING)
    }

    /// Adds validation errors, skipping any already present.
    pub fn add_validation_errors(
        &mut self,
        errors: impl IntoIterator<Item = ValidationResult>,
    ) -> ModelResult<()> {
        let before = self.validation_errors.len();
        for error in errors {
            if !self.validation_errors.contains(&error) {
                self.validation_errors.push(error);
            }
        }
        if self.validation_errors.len() == before {
            return Ok(());
        }
        self.notify(property::VALIDATION_ERRORS)
    }

    pub fn clear_validation_errors(&mut self) -> ModelResult<()> {
        if self.validation_errors.is_empty() {
            return Ok(());
        }
        self.validation_errors.clear();
        self.notify(property::VALIDATION_ERRORS)
    }

    pub fn set_conflict(&mut self, conflict: EntityConflict) -> ModelResult<()> {
        self.conflict = Some(conflict);
        self.notify(property::ENTITY_CONFLICT)
    }

    /// Resolves an update conflict: store values become the new originals,
    /// are merged into current values the client has not edited, and the
    /// conflict is cleared so the entity can be resubmitted.
    pub fn resolve_conflict(&mut self) -> ModelResult<()> {
        let Some(conflict) = &self.conflict else {
            return Err(ModelError::InvalidOperation(
                "entity has no conflict to resolve".to_string(),
            ));
        };
        let Some(store) = conflict.store_state().cloned() else {
            return Err(ModelError::ConflictNotResolvable);
        };
        self.merge(&store, LoadBehavior::MergeIntoCurrent)?;
        self.conflict = None;
        self.notify(property::ENTITY_CONFLICT)
    }

    // ── Merging ──────────────────────────────────────────────────

    /// Applies server state under `behavior`. Returns the names of members
    /// whose value changed.
    ///
    /// Non-mergeable members are skipped. `RefreshCurrent` discards the
    /// original snapshot; `MergeIntoCurrent` replaces the originals of a
    /// pending entity with the server values. The state is recomputed once,
    /// after the merge.
    pub fn merge(&mut self, server: &StateMap, behavior: LoadBehavior) -> ModelResult<Vec<String>> {
        if behavior == LoadBehavior::KeepCurrent {
            return Ok(Vec::new());
        }
        // Rejects cyclic graphs before any nested object is write-locked.
        self.current_state()?;

        self.is_merging_state = true;
        let applied = self.apply_state(server, behavior);
        self.is_merging_state = false;
        let changed = applied?;

        match behavior {
            LoadBehavior::RefreshCurrent => self.original = None,
            LoadBehavior::MergeIntoCurrent
                if matches!(self.state, EntityState::Modified | EntityState::Deleted) =>
            {
                let mut original = self.original.take().unwrap_or_default();
                for (name, value) in server {
                    if self.entity_type.member(name).is_some_and(|m| m.mergeable) {
                        original.insert(name.clone(), value.clone());
                    }
                }
                self.original = Some(original);
            }
            _ => {}
        }
        let mut properties = changed.clone();
        if self.update_change_state()? {
            properties.push(property::ENTITY_STATE.to_string());
        }
        debug!(
            entity_type = %self.entity_type.name,
            behavior = ?behavior,
            changed = changed.len(),
            "merged server state"
        );
        self.notify_all(&properties)?;
        Ok(changed)
    }

    /// Synchronizes with the server's post-submit values.
    pub fn apply_server_state(&mut self, server: &StateMap) -> ModelResult<Vec<String>> {
        self.merge(server, LoadBehavior::RefreshCurrent)
    }

    fn apply_state(&mut self, server: &StateMap, behavior: LoadBehavior) -> ModelResult<Vec<String>> {
        let entity_type = Arc::clone(&self.entity_type);
        let merger = Merger::new(behavior);
        let mut changed = Vec::new();
        for (name, incoming) in server {
            let Some(meta) = entity_type.member(name) else {
                continue;
            };
            if self.is_merging_state && !meta.mergeable {
                continue;
            }
            let original = self.original.as_ref().and_then(|o| o.get(name));
            let current = self
                .values
                .entry(name.clone())
                .or_insert_with(|| Value::empty(meta.kind));
            if merger.member(name, meta.kind, current, incoming, original)? {
                changed.push(name.clone());
            }
        }
        Ok(changed)
    }

    // ── Notifications ────────────────────────────────────────────

    /// Registers a property-changed callback.
    pub fn subscribe_property_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&PropertyChanged) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.property_changed.subscribe(handler)
    }

    pub fn unsubscribe_property_changed(&mut self, id: SubscriptionId) -> bool {
        self.property_changed.unsubscribe(id)
    }

    fn notify(&self, property: &str) -> ModelResult<()> {
        Ok(self.property_changed.notify(&PropertyChanged::new(property))?)
    }

    fn notify_all(&self, properties: &[String]) -> ModelResult<()> {
        let failures = properties
            .iter()
            .filter_map(|p| self.property_changed.notify(&PropertyChanged::new(p.as_str())).err());
        match AggregateError::combine(failures) {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    // ── Internals ────────────────────────────────────────────────

    fn member_meta(&self, name: &str) -> ModelResult<MemberMetadata> {
        self.entity_type
            .member(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownMember {
                entity_type: self.entity_type.name.clone(),
                member: name.to_string(),
            })
    }

    // Takes the original-value snapshot on the first change of an attached entity.
    fn ensure_snapshot(&mut self) -> ModelResult<()> {
        if self.original.is_none()
            && !self.is_merging_state
            && matches!(self.state, EntityState::Unmodified | EntityState::Modified)
        {
            self.original = Some(self.current_state()?);
        }
        Ok(())
    }
}
