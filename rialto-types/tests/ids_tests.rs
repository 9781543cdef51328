use pretty_assertions::assert_eq;
use rialto_types::{ContainerId, EntityHandle, EntryId};

#[test]
fn entry_ids_keep_indexes_past_u32() {
    let index = u32::MAX as usize + 5;
    let id = EntryId::from_index(index);
    assert_eq!(id.as_u64(), u64::from(u32::MAX) + 5);
    assert_ne!(id, EntryId::from_index(4));
}

#[test]
fn entry_ids_serialize_as_plain_numbers() {
    let id = EntryId::new(u64::from(u32::MAX) + 1);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "4294967296");
    assert_eq!(serde_json::from_str::<EntryId>(&json).unwrap(), id);
}

#[test]
fn handles_compare_by_container_and_slot() {
    let container = ContainerId::new();
    let handle = EntityHandle::new(container, 3);
    assert_eq!(handle.container(), container);
    assert_eq!(handle.slot(), 3);
    assert_ne!(handle, EntityHandle::new(ContainerId::new(), 3));
}
