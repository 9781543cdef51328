//! Client-side validation of a change set before it is submitted.

use rialto_client::EntityChangeSet;
use rialto_model::{EntityValidator, ValidationResult};
use rialto_types::{EntityHandle, EntityState};
use tracing::debug;

use crate::container::EntityContainer;
use crate::error::{Failures, TrackingResult};

impl EntityContainer {
    /// Validates every added and modified entity of `change_set`, plus every
    /// recorded custom method call. Errors replace the entity's previous
    /// validation errors.
    ///
    /// Returns the handles of the entities that failed, in change set order.
    pub fn validate_change_set(
        &mut self,
        change_set: &EntityChangeSet,
        validator: &dyn EntityValidator,
    ) -> TrackingResult<Vec<EntityHandle>> {
        let mut failures = Failures::default();
        let mut invalid = Vec::new();

        for item in change_set.items() {
            let entity = self.entity(item.handle)?;
            let mut errors = Vec::new();
            if item.state != EntityState::Deleted {
                errors.extend(validator.validate_entity(entity));
            }

            let entity_type = entity.entity_type();
            for action in &item.actions {
                match entity_type.custom_method(&action.name) {
                    Some(method) if method.matches(&action.parameters) => {
                        errors.extend(validator.validate_method(
                            Some(entity_type.as_ref()),
                            &action.name,
                            &action.parameters,
                        ));
                    }
                    Some(_) => errors.push(ValidationResult::new(
                        format!("invalid parameters for custom method '{}'", action.name),
                        &[],
                    )),
                    None => errors.push(ValidationResult::new(
                        format!(
                            "'{}' is not a custom method of '{}'",
                            action.name, entity_type.name
                        ),
                        &[],
                    )),
                }
            }

            let entity = self.entity_mut(item.handle)?;
            failures.absorb(entity.clear_validation_errors(), ())?;
            if !errors.is_empty() {
                debug!(handle = %item.handle, errors = errors.len(), "entity failed validation");
                failures.absorb(entity.add_validation_errors(errors), ())?;
                invalid.push(item.handle);
            }
        }

        failures.into_result()?;
        Ok(invalid)
    }
}
