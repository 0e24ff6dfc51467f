use super::*;
use crate::test_tree::{names, node, TestAdapter, TestNode};

#[test]
fn consecutive_slot_skips_coalesce() {
    let mut actions = SlotActions::default();
    actions.record_slot_next(1);
    actions.record_slot_next(2);
    assert_eq!(actions.take(), Some(vec![SlotAction::SkipSlots(3)]));
    assert_eq!(actions.take(), None);
}

#[test]
fn untouched_group_collapses_to_a_skip() {
    let mut actions = SlotActions::default();
    actions.record_slot_next(1);
    actions.record_start(GroupKind::Group);
    actions.record_slot_next(1);
    actions.record_start(GroupKind::Node);
    actions.record_down();
    actions.record_up();
    actions.record_end(GroupKind::Node);
    actions.record_end(GroupKind::Group);
    assert_eq!(
        actions.take(),
        Some(vec![SlotAction::SkipSlots(1), SlotAction::SkipGroup])
    );
}

#[test]
fn group_started_before_a_flush_ends_explicitly() {
    let mut actions = SlotActions::default();
    actions.record_start(GroupKind::Node);
    assert_eq!(actions.take(), Some(vec![SlotAction::StartNode]));
    actions.record_up();
    actions.record_end(GroupKind::Node);
    assert_eq!(
        actions.take(),
        Some(vec![SlotAction::Up, SlotAction::EndNode])
    );
}

#[test]
fn trailing_navigation_is_dropped() {
    let mut actions = SlotActions::default();
    actions.record_slot_next(1);
    actions.record_skip(GroupKind::Group);
    assert_eq!(actions.take_final(), None);
    assert_eq!(actions.len(), 0);

    actions.record_skip_to_group_end();
    assert_eq!(actions.take_final(), Some(vec![SlotAction::SkipToGroupEnd]));
}

#[test]
#[should_panic(expected = "Memo groups")]
fn memo_groups_cannot_be_started() {
    SlotActions::default().record_start(GroupKind::Memo);
}

fn apply_all(
    changes: Vec<Change<TestNode>>,
    applier: &mut Applier<TestNode>,
    slots: &mut SlotTable,
) -> Result<(), ApplierError> {
    let queue = InvalidationQueue::default();
    for change in changes {
        change.apply(applier, slots, &queue)?;
    }
    Ok(())
}

#[test]
fn inserted_item_writes_slots_and_nodes() {
    let root = node("root");
    let mut applier = Applier::new(root.clone(), TestAdapter::default());
    let mut slots = SlotTable::new();
    let changes = vec![
        Change::BeginInsert,
        Change::StartItem {
            key: 7,
            kind: GroupKind::Node,
        },
        Change::InsertNode {
            index: 0,
            node: node("a"),
        },
        Change::ApplyToCurrent(Box::new(|node: &mut TestNode| {
            node.borrow_mut().name.push('!')
        })),
        Change::Slots(vec![SlotAction::Up, SlotAction::EndNode]),
        Change::EndInsert,
    ];
    apply_all(changes, &mut applier, &mut slots).unwrap();

    assert_eq!(names(&root), vec!["a!"]);
    assert_eq!(applier.depth(), 0);
    assert_eq!(slots.size(), 4);
    assert_eq!(slots.group_start_at(1).kind, GroupKind::Node);
    assert!(slots.get(2).and_then(|slot| slot.as_value::<TestNode>()).is_some());
}

#[test]
fn remove_item_and_nodes() {
    let root = node("root");
    let mut applier = Applier::new(root.clone(), TestAdapter::default());
    let mut slots = SlotTable::new();
    let mut insert = vec![Change::BeginInsert];
    for (index, name) in ["a", "b"].into_iter().enumerate() {
        insert.push(Change::StartItem {
            key: index as Key,
            kind: GroupKind::Node,
        });
        insert.push(Change::InsertNode {
            index,
            node: node(name),
        });
        insert.push(Change::Slots(vec![SlotAction::Up, SlotAction::EndNode]));
    }
    insert.push(Change::EndInsert);
    apply_all(insert, &mut applier, &mut slots).unwrap();

    slots.reset();
    let remove = vec![
        Change::RemoveItem,
        Change::RemoveNodes { index: 0, count: 1 },
    ];
    apply_all(remove, &mut applier, &mut slots).unwrap();

    assert_eq!(names(&root), vec!["b"]);
    assert_eq!(slots.size(), 4);
    assert_eq!(slots.get(0).and_then(Slot::as_key), Some(1));
}

#[test]
fn adapter_errors_propagate() {
    let mut applier = Applier::new(node("root"), TestAdapter::default());
    let mut slots = SlotTable::new();
    let result = apply_all(
        vec![Change::RemoveNodes { index: 0, count: 2 }],
        &mut applier,
        &mut slots,
    );
    assert_eq!(
        result,
        Err(ApplierError::RangeOutOfBounds {
            start: 0,
            count: 2,
            len: 0
        })
    );
}

#[test]
fn debug_output_names_the_change() {
    let change: Change<TestNode> = Change::MoveNodes {
        from: 3,
        to: 1,
        count: 2,
    };
    assert_eq!(format!("{change:?}"), "MoveNodes(3 -> 1, 2)");
}
