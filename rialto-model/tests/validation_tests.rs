use rialto_model::{
    Entity, EntityType, EntityValidator, PermissiveValidator, RequiredMembersValidator,
    ValidationResult,
};
use serde_json::json;
use std::sync::Arc;

fn make_entity(name: serde_json::Value) -> Entity {
    let ty = Arc::new(EntityType::new("Customer").with_key(&["Id"]).with_scalars(&["Name"]));
    let state = json!({"Id": 1, "Name": name});
    Entity::from_state(ty, state.as_object().unwrap()).unwrap()
}

#[test]
fn permissive_validator_accepts_everything() {
    let entity = make_entity(json!(null));
    assert!(PermissiveValidator.validate_entity(&entity).is_empty());
    assert!(PermissiveValidator.validate_method(None, "Anything", &[]).is_empty());
}

#[test]
fn required_members_rejects_null_and_empty() {
    let validator = RequiredMembersValidator::new().require("Customer", "Name");
    let expected = vec![ValidationResult::new("Name is required", &["Name"])];

    assert_eq!(validator.validate_entity(&make_entity(json!(null))), expected);
    assert_eq!(validator.validate_entity(&make_entity(json!(""))), expected);
    assert!(validator.validate_entity(&make_entity(json!("Alice"))).is_empty());
}

#[test]
fn required_members_ignores_other_types() {
    let validator = RequiredMembersValidator::new().require("Order", "Total");
    assert!(validator.validate_entity(&make_entity(json!(null))).is_empty());
}

#[test]
fn validation_result_display_lists_members() {
    let result = ValidationResult::new("out of range", &["Start", "End"]);
    assert_eq!(result.to_string(), "out of range (Start, End)");
    assert_eq!(ValidationResult::new("bad", &[]).to_string(), "bad");
}
