use super::*;
use crate::mock_tree::MockAdapter;
use recompose_core::ApplierAdapter;

// key, group(key, node(text))
fn table_with_node(node: &MockNode) -> SlotTable {
    let mut slots = SlotTable::new();
    slots.begin_insert();
    slots.update(Slot::Key(1));
    slots.start_group();
    slots.update(Slot::Key(2));
    slots.start_node();
    slots.update(Slot::value(node.clone()));
    slots.end_node();
    slots.end_group();
    slots.end_insert();
    slots
}

#[test]
fn well_formed_table_passes() {
    let node = MockNode::new("text");
    let slots = table_with_node(&node);
    assert_eq!(validate_slots(&slots), Ok(()));
    assert_eq!(slots.group_start_at(1).nodes, 1);
}

#[test]
fn key_without_group_is_reported() {
    let mut slots = SlotTable::new();
    slots.begin_insert();
    slots.update(Slot::Key(1));
    slots.update(Slot::value(3u32));
    slots.end_insert();

    let error = validate_slots(&slots).unwrap_err();
    assert_eq!(error.location, 0);
    assert_eq!(error.to_string(), "slot 0: key is not followed by a group");
}

#[test]
fn composition_matches_tree_by_identity() {
    let node = MockNode::new("text");
    let slots = table_with_node(&node);
    let mut root = MockNode::new("root");
    let mut adapter = MockAdapter::new();

    let error = validate_composition(&slots, &root).unwrap_err();
    assert_eq!(error.message, "root has 0 children but the table holds 1");

    adapter.insert_at(&mut root, 0, MockNode::new("text")).unwrap();
    let error = validate_composition(&slots, &root).unwrap_err();
    assert!(error.message.starts_with("child 0 of root"), "{error}");

    adapter.remove_at(&mut root, 0, 1).unwrap();
    adapter.insert_at(&mut root, 0, node).unwrap();
    assert_eq!(validate_composition(&slots, &root), Ok(()));
}
