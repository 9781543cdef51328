use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rialto_model::{AssociationMetadata, Entity, EntityType};
use rialto_tracking::{EntityContainer, EntitySetOperations, HAS_CHANGES, TrackingError};
use rialto_types::{CollectionChangeAction, EntityState};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn customer_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("Customer")
            .with_key(&["Id"])
            .with_scalars(&["Name"]),
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

fn make_customer(id: i64, name: &str) -> Entity {
    let state = json!({"Id": id, "Name": name});
    Entity::from_state(customer_type(), state.as_object().unwrap()).unwrap()
}

fn make_order(id: i64) -> Entity {
    let state = json!({"Id": id, "Total": 10});
    Entity::from_state(order_type(), state.as_object().unwrap()).unwrap()
}

fn make_line(id: i64, order_id: i64) -> Entity {
    let state = json!({"Id": id, "OrderId": order_id, "Qty": 1});
    Entity::from_state(line_type(), state.as_object().unwrap()).unwrap()
}

// ── Registration ─────────────────────────────────────────────────

#[test]
fn registering_a_type_twice_fails() {
    let mut container = make_container();
    assert!(matches!(
        container.register(customer_type()),
        Err(TrackingError::InvalidOperation(_))
    ));
}

#[test]
fn unknown_entity_type_is_rejected() {
    let mut container = EntityContainer::with_types([order_type()]).unwrap();
    assert!(matches!(
        container.attach(make_customer(1, "Alice")),
        Err(TrackingError::EntitySetNotFound(name)) if name == "Customer"
    ));
}

// ── Identity ─────────────────────────────────────────────────────

#[test]
fn attach_indexes_by_key() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();

    let set = container.entity_set("Customer").unwrap();
    let key = container.entity(handle).unwrap().key().unwrap();
    assert_eq!(set.find(&key), Some(handle));
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Unmodified);
}

#[test]
fn attaching_a_duplicate_key_fails() {
    let mut container = make_container();
    container.attach(make_customer(1, "Alice")).unwrap();
    let err = container.attach(make_customer(1, "Bob")).unwrap_err();
    assert!(matches!(err, TrackingError::DuplicateKey { .. }));
    assert_eq!(container.entity_set("Customer").unwrap().len(), 1);
}

#[test]
fn attaching_a_non_detached_entity_fails() {
    let mut entity = make_customer(1, "Alice");
    entity.transition(EntityState::New).unwrap();
    let mut container = make_container();
    assert!(matches!(
        container.attach(entity),
        Err(TrackingError::InvalidOperation(_))
    ));
}

#[test]
fn new_entities_with_equal_keys_collide_on_accept() {
    let mut container = make_container();
    container.add(make_customer(1, "Alice")).unwrap();
    container.add(make_customer(1, "Bob")).unwrap();
    assert!(matches!(
        container.accept_changes(),
        Err(TrackingError::DuplicateKey { .. })
    ));
}

proptest! {
    #[test]
    fn attached_keys_stay_unique(ids in proptest::collection::vec(0i64..20, 0..40)) {
        let mut container = make_container();
        let mut distinct = std::collections::HashSet::new();
        for id in ids {
            let result = container.attach(make_customer(id, "c"));
            if distinct.insert(id) {
                prop_assert!(result.is_ok());
            } else {
                let duplicate = matches!(result, Err(TrackingError::DuplicateKey { .. }));
                prop_assert!(duplicate);
            }
        }
        prop_assert_eq!(container.entity_set("Customer").unwrap().len(), distinct.len());
    }
}

// ── Membership ───────────────────────────────────────────────────

#[test]
fn add_makes_entity_new() {
    let mut container = make_container();
    let handle = container.add(make_customer(1, "Alice")).unwrap();
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::New);
    assert_eq!(container.entity_set("Customer").unwrap().added(), vec![handle]);
    assert!(container.has_changes());
}

#[test]
fn removing_a_new_entity_drops_it() {
    let mut container = make_container();
    let handle = container.add(make_customer(1, "Alice")).unwrap();
    container.remove(handle).unwrap();

    assert!(!container.contains(handle));
    assert!(container.entity_set("Customer").unwrap().is_empty());
    assert!(!container.has_changes());
    assert!(container.get_changes().unwrap().is_empty());
}

#[test]
fn removing_an_attached_entity_marks_it_deleted() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    container.remove(handle).unwrap();

    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Deleted);
    assert_eq!(container.entity_set("Customer").unwrap().removed(), vec![handle]);
    // removing twice is a no-op
    container.remove(handle).unwrap();
}

#[test]
fn readd_restores_deleted_entity() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    container.remove(handle).unwrap();
    container.readd(handle).unwrap();
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Unmodified);

    container.set_value(handle, "Name", "Bob").unwrap();
    container.remove(handle).unwrap();
    container.readd(handle).unwrap();
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Modified);
}

#[test]
fn readd_requires_deleted_state() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    assert!(matches!(
        container.readd(handle),
        Err(TrackingError::InvalidOperation(_))
    ));
}

#[test]
fn detach_hands_the_entity_back() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    let entity = container.detach(handle).unwrap();

    assert_eq!(entity.state(), EntityState::Detached);
    assert!(!container.contains(handle));
    // the key is free again
    container.attach(entity).unwrap();
}

#[test]
fn handles_are_never_reused() {
    let mut container = make_container();
    let first = container.attach(make_customer(1, "Alice")).unwrap();
    container.detach(first).unwrap();
    let second = container.attach(make_customer(1, "Alice")).unwrap();

    assert_ne!(first, second);
    assert!(matches!(
        container.entity(first),
        Err(TrackingError::UnknownEntity(_))
    ));
}

#[test]
fn foreign_handles_are_unknown() {
    let mut other = make_container();
    let foreign = other.attach(make_customer(1, "Alice")).unwrap();
    let mut container = make_container();

    assert!(matches!(
        container.set_value(foreign, "Name", "Bob"),
        Err(TrackingError::UnknownEntity(_))
    ));
    assert!(matches!(
        container.check_cross_container(foreign),
        Err(TrackingError::CrossContainer { .. })
    ));
}

#[test]
fn clear_detaches_everything() {
    let mut container = make_container();
    container.attach(make_customer(1, "Alice")).unwrap();
    container.add(make_customer(2, "Bob")).unwrap();
    container.clear().unwrap();

    assert!(container.handles().is_empty());
    assert!(!container.has_changes());
}

// ── Editing ──────────────────────────────────────────────────────

#[test]
fn edits_and_restores_track_state() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();

    assert!(container.set_value(handle, "Name", "Bob").unwrap());
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Modified);
    assert!(!container.set_value(handle, "Name", "Bob").unwrap());

    container.set_value(handle, "Name", "Alice").unwrap();
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Unmodified);
}

#[test]
fn key_members_of_attached_entities_are_immutable() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    assert!(matches!(
        container.set_value(handle, "Id", 2),
        Err(TrackingError::Model(rialto_model::ModelError::KeyMemberImmutable { .. }))
    ));

    let new = container.add(make_customer(5, "Bob")).unwrap();
    assert!(container.set_value(new, "Id", 6).unwrap());
}

#[test]
fn composed_child_edit_marks_parent_modified() {
    let mut container = make_container();
    let order = container.attach(make_order(1)).unwrap();
    let line = container.attach(make_line(10, 1)).unwrap();

    container.set_value(line, "Qty", 5).unwrap();
    let parent = container.entity(order).unwrap();
    assert!(parent.has_child_changes());
    assert_eq!(parent.state(), EntityState::Modified);

    container.set_value(line, "Qty", 1).unwrap();
    let parent = container.entity(order).unwrap();
    assert!(!parent.has_child_changes());
    assert_eq!(parent.state(), EntityState::Unmodified);
}

#[test]
fn removing_a_parent_cascades_to_children() {
    let mut container = make_container();
    let order = container.attach(make_order(1)).unwrap();
    let first = container.attach(make_line(10, 1)).unwrap();
    let second = container.attach(make_line(11, 1)).unwrap();
    let unrelated = container.attach(make_line(12, 2)).unwrap();

    container.remove(order).unwrap();
    for handle in [order, first, second] {
        assert_eq!(container.entity(handle).unwrap().state(), EntityState::Deleted);
    }
    assert_eq!(container.entity(unrelated).unwrap().state(), EntityState::Unmodified);
}

#[test]
fn actions_are_tracked_through_the_container() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    container.invoke_action(handle, "Promote", vec![json!(1)]).unwrap();
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Modified);

    assert!(container.cancel_action(handle, "Promote").unwrap());
    assert_eq!(container.entity(handle).unwrap().state(), EntityState::Unmodified);
}

// ── Permissions ──────────────────────────────────────────────────

#[test]
fn read_only_sets_reject_local_changes() {
    let mut container = EntityContainer::new();
    container
        .register_with_operations(customer_type(), EntitySetOperations::read_only())
        .unwrap();

    assert!(matches!(
        container.add(make_customer(1, "Alice")),
        Err(TrackingError::OperationNotSupported { operation: "add", .. })
    ));

    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    assert!(matches!(
        container.set_value(handle, "Name", "Bob"),
        Err(TrackingError::OperationNotSupported { operation: "edit", .. })
    ));
    assert!(matches!(
        container.remove(handle),
        Err(TrackingError::OperationNotSupported { operation: "remove", .. })
    ));
}

// ── Accept / reject ──────────────────────────────────────────────

#[test]
fn reject_changes_reverts_everything_locally() {
    let mut container = make_container();
    let edited = container.attach(make_customer(1, "Alice")).unwrap();
    let deleted = container.attach(make_customer(2, "Bob")).unwrap();
    let added = container.add(make_customer(3, "Carol")).unwrap();

    container.set_value(edited, "Name", "Alicia").unwrap();
    container.remove(deleted).unwrap();
    container.reject_changes().unwrap();

    let entity = container.entity(edited).unwrap();
    assert_eq!(entity.scalar("Name"), &json!("Alice"));
    assert_eq!(entity.state(), EntityState::Unmodified);
    assert_eq!(container.entity(deleted).unwrap().state(), EntityState::Unmodified);
    assert!(!container.contains(added));
    assert!(!container.has_changes());
}

#[test]
fn accept_changes_commits_everything_locally() {
    let mut container = make_container();
    let edited = container.attach(make_customer(1, "Alice")).unwrap();
    let deleted = container.attach(make_customer(2, "Bob")).unwrap();
    let added = container.add(make_customer(3, "Carol")).unwrap();

    container.set_value(edited, "Name", "Alicia").unwrap();
    container.remove(deleted).unwrap();
    container.accept_changes().unwrap();

    let entity = container.entity(edited).unwrap();
    assert_eq!(entity.scalar("Name"), &json!("Alicia"));
    assert!(entity.original_state().is_none());
    assert!(!container.contains(deleted));
    assert_eq!(container.entity(added).unwrap().state(), EntityState::Unmodified);

    let key = container.entity(added).unwrap().key().unwrap();
    assert_eq!(container.entity_set("Customer").unwrap().find(&key), Some(added));
    assert!(!container.has_changes());
}

// ── Notifications ────────────────────────────────────────────────

#[test]
fn has_changes_is_raised_when_it_flips() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    let raised = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&raised);
    container.subscribe_property_changed(move |event| {
        assert_eq!(event.property, HAS_CHANGES);
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    container.set_value(handle, "Name", "Bob").unwrap();
    container.set_value(handle, "Name", "Carol").unwrap();
    assert_eq!(raised.load(Ordering::SeqCst), 1);

    container.reject_changes().unwrap();
    assert_eq!(raised.load(Ordering::SeqCst), 2);
}

#[test]
fn collection_changed_reports_membership() {
    let mut container = make_container();
    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    container
        .subscribe_collection_changed("Customer", move |event| {
            sink.lock().push(event.action);
            Ok(())
        })
        .unwrap();

    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    container.remove(handle).unwrap();
    container.clear().unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            CollectionChangeAction::Add,
            CollectionChangeAction::Remove,
            CollectionChangeAction::Reset,
        ]
    );
}

#[test]
fn failing_subscriber_does_not_undo_the_operation() {
    let mut container = make_container();
    container
        .subscribe_collection_changed("Customer", |_| Err("observer failed".into()))
        .unwrap();

    let err = container.attach(make_customer(1, "Alice")).unwrap_err();
    assert!(matches!(err, TrackingError::Notification(_)));
    assert_eq!(container.entity_set("Customer").unwrap().len(), 1);
}

#[test]
fn entity_subscribers_see_container_edits() {
    let mut container = make_container();
    let handle = container.attach(make_customer(1, "Alice")).unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    container
        .subscribe_entity_property_changed(handle, move |event| {
            sink.lock().push(event.property.clone());
            Ok(())
        })
        .unwrap();

    container.set_value(handle, "Name", "Bob").unwrap();
    assert!(seen.lock().contains(&"Name".to_string()));
}
