use pretty_assertions::assert_eq;
use rialto_client::{ChangeSetEntry, EntityChangeSet, EntityOperationType};
use rialto_model::{
    AssociationMetadata, CustomMethod, Entity, EntityConflict, EntityType, ParameterType,
    PermissiveValidator, RequiredMembersValidator, StateMap, ValidationResult,
};
use rialto_tracking::{EntityContainer, SubmitOutcome};
use rialto_types::{EntityHandle, EntityState, EntryId};
use serde_json::{Value as J, json};
use std::sync::Arc;

fn customer_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("Customer")
            .with_key(&["Id"])
            .with_scalars(&["Name"])
            .with_custom_method(CustomMethod::new("Promote", vec![ParameterType::Integer])),
    )
}

fn order_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("Order")
            .with_key(&["Id"])
            .with_scalars(&["Total"])
            .with_association(
                AssociationMetadata::collection("Lines", "OrderLine", &["Id"], &["OrderId"])
                    .composition(),
            ),
    )
}

fn line_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("OrderLine")
            .with_key(&["Id"])
            .with_scalars(&["OrderId", "Qty"]),
    )
}

fn make_container() -> EntityContainer {
    EntityContainer::with_types([customer_type(), order_type(), line_type()]).unwrap()
}

fn make_entity(entity_type: Arc<EntityType>, state: J) -> Entity {
    Entity::from_state(entity_type, state.as_object().unwrap()).unwrap()
}

fn make_customer(id: i64, name: &str) -> Entity {
    make_entity(customer_type(), json!({"Id": id, "Name": name}))
}

fn state(value: J) -> StateMap {
    value.as_object().cloned().unwrap()
}

/// Echoes every entry's current state back, as a server accepting the
/// batch unchanged would.
fn accept_all(change_set: &EntityChangeSet) -> Vec<ChangeSetEntry> {
    change_set
        .entries()
        .iter()
        .map(|entry| entry.clone().with_server_state(entry.current.clone()))
        .collect()
}

fn handles(items: &[rialto_client::ChangeSetItem]) -> Vec<EntityHandle> {
    items.iter().map(|item| item.handle).collect()
}

/// One modified, one added and one deleted customer.
fn make_pending(container: &mut EntityContainer) -> (EntityHandle, EntityHandle, EntityHandle) {
    let edited = container.attach(make_customer(1, "Alice")).unwrap();
    container.set_value(edited, "Name", "Alicia").unwrap();
    let added = container.add(make_customer(2, "bob")).unwrap();
    let deleted = container.attach(make_customer(3, "Carol")).unwrap();
    container.remove(deleted).unwrap();
    (edited, added, deleted)
}

// ── Change sets ──────────────────────────────────────────────────

#[test]
fn change_set_partitions_pending_entities() {
    let mut container = make_container();
    let (edited, added, deleted) = make_pending(&mut container);
    container.attach(make_customer(4, "Dave")).unwrap();

    let change_set = container.get_changes().unwrap();
    assert_eq!(handles(change_set.added()), vec![added]);
    assert_eq!(handles(change_set.modified()), vec![edited]);
    assert_eq!(handles(change_set.removed()), vec![deleted]);

    let update = change_set.entry_for(edited).unwrap();
    assert_eq!(update.operation, EntityOperationType::Update);
    assert_eq!(update.original, Some(state(json!({"Id": 1, "Name": "Alice"}))));
    assert_eq!(update.current, state(json!({"Id": 1, "Name": "Alicia"})));

    let delete = change_set.entry_for(deleted).unwrap();
    assert_eq!(delete.original, Some(state(json!({"Id": 3, "Name": "Carol"}))));
    assert_eq!(change_set.entry_for(added).unwrap().original, None);
}

#[test]
fn inserts_are_ordered_parent_first() {
    let mut container = make_container();
    let line = container
        .add(make_entity(line_type(), json!({"Id": 10, "OrderId": 5, "Qty": 1})))
        .unwrap();
    let order = container
        .add(make_entity(order_type(), json!({"Id": 5, "Total": 1})))
        .unwrap();

    let change_set = container.get_changes().unwrap();
    assert_eq!(handles(change_set.added()), vec![order, line]);
    assert_eq!(change_set.added()[1].parent, Some(order));
    assert_eq!(
        change_set.entry_for(line).unwrap().parent,
        Some(EntryId::new(0))
    );
}

#[test]
fn deletes_are_ordered_children_first() {
    let mut container = make_container();
    let order = container
        .attach(make_entity(order_type(), json!({"Id": 1, "Total": 1})))
        .unwrap();
    let first = container
        .attach(make_entity(line_type(), json!({"Id": 10, "OrderId": 1, "Qty": 1})))
        .unwrap();
    let second = container
        .attach(make_entity(line_type(), json!({"Id": 11, "OrderId": 1, "Qty": 1})))
        .unwrap();

    container.remove(order).unwrap();
    let change_set = container.get_changes().unwrap();
    assert_eq!(handles(change_set.removed()), vec![first, second, order]);
    assert!(
        change_set
            .entries()
            .iter()
            .all(|entry| entry.operation == EntityOperationType::Delete)
    );
}

// ── Validation ───────────────────────────────────────────────────

#[test]
fn object_validation_attaches_errors() {
    let mut container = make_container();
    let entity = Entity::new(customer_type()).with_value("Id", 1).unwrap();
    let handle = container.add(entity).unwrap();
    let validator = RequiredMembersValidator::new().require("Customer", "Name");

    let change_set = container.get_changes().unwrap();
    let invalid = container.validate_change_set(&change_set, &validator).unwrap();
    assert_eq!(invalid, vec![handle]);
    assert_eq!(
        container.entity(handle).unwrap().validation_errors(),
        &[ValidationResult::new("Name is required", &["Name"])]
    );

    container.set_value(handle, "Name", "Zoe").unwrap();
    let change_set = container.get_changes().unwrap();
    assert!(container.validate_change_set(&change_set, &validator).unwrap().is_empty());
    assert!(!container.entity(handle).unwrap().has_validation_errors());
}

#[test]
fn recorded_actions_must_match_a_custom_method() {
    let mut container = make_container();
    let promoted = container.attach(make_customer(1, "Alice")).unwrap();
    let mistyped = container.attach(make_customer(2, "Bob")).unwrap();
    let unknown = container.attach(make_customer(3, "Carol")).unwrap();
    container.invoke_action(promoted, "Promote", vec![json!(2)]).unwrap();
    container.invoke_action(mistyped, "Promote", vec![json!("two")]).unwrap();
    container.invoke_action(unknown, "Demote", vec![]).unwrap();

    let change_set = container.get_changes().unwrap();
    let invalid = container
        .validate_change_set(&change_set, &PermissiveValidator)
        .unwrap();
    assert_eq!(invalid, vec![mistyped, unknown]);
}

// ── Submit results ───────────────────────────────────────────────

#[test]
fn accepted_submit_synchronizes_and_accepts() {
    let mut container = make_container();
    let (edited, added, deleted) = make_pending(&mut container);
    let change_set = container.get_changes().unwrap();

    let results: Vec<ChangeSetEntry> = accept_all(&change_set)
        .into_iter()
        .map(|entry| {
            if entry.handle == added {
                entry.with_server_state(state(json!({"Id": 2, "Name": "BOB"})))
            } else {
                entry
            }
        })
        .collect();

    let outcome = container.apply_submit_results(&change_set, &results).unwrap();
    assert_eq!(outcome, SubmitOutcome::Accepted);

    let entity = container.entity(added).unwrap();
    assert_eq!(entity.state(), EntityState::Unmodified);
    assert_eq!(entity.scalar("Name"), &json!("BOB"));
    assert_eq!(container.entity(edited).unwrap().state(), EntityState::Unmodified);
    assert!(!container.contains(deleted));
    assert!(!container.has_changes());
}

#[test]
fn validation_errors_abort_without_accepting() {
    let mut container = make_container();
    let (edited, added, _) = make_pending(&mut container);
    let change_set = container.get_changes().unwrap();
    let error = ValidationResult::new("name is taken", &["Name"]);
    let results: Vec<ChangeSetEntry> = change_set
        .entries()
        .iter()
        .map(|entry| {
            if entry.handle == edited {
                entry.clone().with_validation_errors(vec![error.clone()])
            } else {
                entry.clone()
            }
        })
        .collect();

    let outcome = container.apply_submit_results(&change_set, &results).unwrap();
    assert_eq!(outcome, SubmitOutcome::ValidationFailed(vec![edited]));

    // applying the same errors again does not duplicate them
    container.apply_submit_results(&change_set, &results).unwrap();
    let entity = container.entity(edited).unwrap();
    assert_eq!(entity.validation_errors(), &[error]);
    assert_eq!(entity.state(), EntityState::Modified);
    assert_eq!(container.entity(added).unwrap().state(), EntityState::New);
}

#[test]
fn conflicts_abort_and_can_be_resolved() {
    let mut container = make_container();
    let (edited, _, _) = make_pending(&mut container);
    let change_set = container.get_changes().unwrap();
    let store = state(json!({"Id": 1, "Name": "Server"}));
    let results: Vec<ChangeSetEntry> = change_set
        .entries()
        .iter()
        .map(|entry| {
            if entry.handle == edited {
                let conflict = EntityConflict::new(
                    store.clone(),
                    entry.current.clone(),
                    vec!["Name".to_string()],
                );
                entry.clone().with_conflict(conflict)
            } else {
                entry.clone()
            }
        })
        .collect();

    let outcome = container.apply_submit_results(&change_set, &results).unwrap();
    assert_eq!(outcome.entities_in_error(), &[edited]);
    assert!(matches!(outcome, SubmitOutcome::Conflicts(_)));
    assert_eq!(container.entity(edited).unwrap().state(), EntityState::Modified);

    container.resolve_conflict(edited).unwrap();
    let entity = container.entity(edited).unwrap();
    assert!(entity.conflict().is_none());
    assert_eq!(entity.scalar("Name"), &json!("Alicia"));
    assert_eq!(entity.original_state(), Some(&store));
    assert_eq!(entity.state(), EntityState::Modified);
}

#[test]
fn validation_failures_take_precedence_over_conflicts() {
    let mut container = make_container();
    let (edited, added, _) = make_pending(&mut container);
    let change_set = container.get_changes().unwrap();
    let results: Vec<ChangeSetEntry> = change_set
        .entries()
        .iter()
        .map(|entry| {
            if entry.handle == edited {
                entry
                    .clone()
                    .with_conflict(EntityConflict::deleted(entry.current.clone()))
            } else if entry.handle == added {
                entry
                    .clone()
                    .with_validation_errors(vec![ValidationResult::new("invalid", &[])])
            } else {
                entry.clone()
            }
        })
        .collect();

    let outcome = container.apply_submit_results(&change_set, &results).unwrap();
    assert_eq!(outcome, SubmitOutcome::ValidationFailed(vec![added]));
    assert!(container.entity(edited).unwrap().conflict().is_some());
}

#[test]
fn composed_children_are_accepted_with_their_parent() {
    let mut container = make_container();
    let order = container
        .attach(make_entity(order_type(), json!({"Id": 1, "Total": 1})))
        .unwrap();
    let line = Entity::new(line_type()).with_value("Id", 10).unwrap();
    let line = container.add_new_to_collection(order, "Lines", line).unwrap();

    let change_set = container.get_changes().unwrap();
    assert_eq!(handles(change_set.added()), vec![line]);
    assert_eq!(handles(change_set.modified()), vec![order]);

    let results = accept_all(&change_set);
    let outcome = container.apply_submit_results(&change_set, &results).unwrap();
    assert_eq!(outcome, SubmitOutcome::Accepted);
    assert_eq!(container.entity(line).unwrap().state(), EntityState::Unmodified);
    let parent = container.entity(order).unwrap();
    assert_eq!(parent.state(), EntityState::Unmodified);
    assert!(!parent.has_child_changes());
}

#[test]
fn submitting_flag_is_set_and_cleared() {
    let mut container = make_container();
    let (edited, added, deleted) = make_pending(&mut container);
    let change_set = container.get_changes().unwrap();

    container.set_submitting(&change_set, true).unwrap();
    for handle in [edited, added, deleted] {
        assert!(container.entity(handle).unwrap().is_submitting());
    }
    container.set_submitting(&change_set, false).unwrap();
    for handle in [edited, added, deleted] {
        assert!(!container.entity(handle).unwrap().is_submitting());
    }
}

#[test]
fn errors_for_detached_entities_still_abort_the_submit() {
    let mut container = make_container();
    let gone = container.attach(make_customer(1, "Alice")).unwrap();
    let kept = container.attach(make_customer(2, "Bob")).unwrap();
    container.set_value(gone, "Name", "Alicia").unwrap();
    container.set_value(kept, "Name", "Bobby").unwrap();
    let change_set = container.get_changes().unwrap();
    container.detach(gone).unwrap();

    let results: Vec<ChangeSetEntry> = change_set
        .entries()
        .iter()
        .map(|entry| {
            if entry.handle == gone {
                entry
                    .clone()
                    .with_conflict(EntityConflict::deleted(entry.current.clone()))
            } else {
                entry.clone().with_server_state(entry.current.clone())
            }
        })
        .collect();

    let outcome = container.apply_submit_results(&change_set, &results).unwrap();
    assert_eq!(outcome, SubmitOutcome::Conflicts(vec![gone]));
    let entity = container.entity(kept).unwrap();
    assert_eq!(entity.state(), EntityState::Modified);
    assert_eq!(entity.scalar("Name"), &json!("Bobby"));
}

#[test]
fn validation_errors_for_detached_entities_still_abort_the_submit() {
    let mut container = make_container();
    let (edited, added, _) = make_pending(&mut container);
    let change_set = container.get_changes().unwrap();
    container.detach(added).unwrap();

    let results: Vec<ChangeSetEntry> = change_set
        .entries()
        .iter()
        .map(|entry| {
            if entry.handle == added {
                entry
                    .clone()
                    .with_validation_errors(vec![ValidationResult::new("invalid", &[])])
            } else {
                entry.clone()
            }
        })
        .collect();

    let outcome = container.apply_submit_results(&change_set, &results).unwrap();
    assert_eq!(outcome, SubmitOutcome::ValidationFailed(vec![added]));
    assert_eq!(container.entity(edited).unwrap().state(), EntityState::Modified);
}

#[test]
fn a_key_moved_between_composition_parents_is_accepted() {
    let mut container = make_container();
    let target = container
        .attach(make_entity(order_type(), json!({"Id": 2, "Total": 1})))
        .unwrap();
    let source = container
        .attach(make_entity(order_type(), json!({"Id": 1, "Total": 1})))
        .unwrap();
    let old_line = container
        .attach(make_entity(line_type(), json!({"Id": 10, "OrderId": 1, "Qty": 1})))
        .unwrap();

    container.remove_from_collection(source, "Lines", old_line).unwrap();
    let replacement = Entity::new(line_type())
        .with_value("Id", 10)
        .unwrap()
        .with_value("Qty", 2)
        .unwrap();
    let new_line = container
        .add_new_to_collection(target, "Lines", replacement)
        .unwrap();

    let change_set = container.get_changes().unwrap();
    let outcome = container
        .apply_submit_results(&change_set, &accept_all(&change_set))
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::Accepted);
    assert!(!container.contains(old_line));
    let line = container.entity(new_line).unwrap();
    assert_eq!(line.state(), EntityState::Unmodified);
    assert_eq!(line.scalar("OrderId"), &json!(2));
    assert_eq!(container.entity_set("OrderLine").unwrap().len(), 1);
    assert!(!container.has_changes());
}
