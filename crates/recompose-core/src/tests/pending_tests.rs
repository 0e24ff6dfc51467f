use super::*;

const A: Key = 0xa;
const B: Key = 0xb;
const C: Key = 0xc;
const D: Key = 0xd;
const X: Key = 0x10;

fn pending(keys: &[Key]) -> Pending {
    let infos = keys
        .iter()
        .enumerate()
        .map(|(index, key)| KeyInfo::previous(*key, index * 4, 1, index))
        .collect();
    Pending::new(infos, 0, false)
}

fn visit(pending: &mut Pending, key: Key) -> usize {
    let id = match pending.get_next(key) {
        Some(id) => id,
        None => panic!("{key:#x} not found"),
    };
    pending.record_used(id);
    pending.place_slot(id)
}

#[test]
fn get_next_claims_each_previous_item_once() {
    let mut pending = pending(&[A, B, C]);
    assert_eq!(pending.get_next(B), Some(1));
    assert_eq!(pending.get_next(B), None);
    assert_eq!(pending.get_next(X), None);
}

#[test]
fn duplicate_keys_match_in_previous_order() {
    let mut pending = pending(&[A, B, A]);
    assert_eq!(pending.get_next(A), Some(0));
    assert_eq!(pending.get_next(A), Some(2));
    assert_eq!(pending.get_next(A), None);
}

#[test]
#[should_panic(expected = "Duplicate key 0xa")]
fn duplicate_keys_are_rejected_when_asked() {
    let infos = vec![KeyInfo::previous(A, 0, 1, 0), KeyInfo::previous(A, 4, 1, 1)];
    Pending::new(infos, 0, true);
}

#[test]
fn unchanged_order_needs_no_edits() {
    let mut pending = pending(&[A, B, C]);
    assert_eq!(visit(&mut pending, A), 0);
    assert_eq!(visit(&mut pending, B), 0);
    assert_eq!(visit(&mut pending, C), 0);
    assert!(pending.reconcile().is_empty());
}

#[test]
fn rotation_is_a_single_move() {
    let mut pending = pending(&[A, B, C]);
    assert_eq!(visit(&mut pending, C), 2);
    assert_eq!(visit(&mut pending, A), 0);
    assert_eq!(visit(&mut pending, B), 0);
    assert_eq!(
        pending.reconcile(),
        vec![NodeEdit::Move {
            from: 2,
            to: 0,
            count: 1
        }]
    );
}

#[test]
fn unused_items_are_removed_in_previous_order() {
    let mut pending = pending(&[A, B, C, D]);
    visit(&mut pending, B);
    visit(&mut pending, D);
    assert_eq!(
        pending.reconcile(),
        vec![
            NodeEdit::Remove { at: 0, count: 1 },
            NodeEdit::Remove { at: 1, count: 1 },
        ]
    );
}

#[test]
fn inserted_items_shift_node_positions() {
    let mut pending = pending(&[A, B]);
    visit(&mut pending, A);
    let inserted = pending.register_insert(X);
    pending.record_used(inserted);
    assert_eq!(pending.node_position_of(inserted), 1);
    pending.update_node_count(inserted, 2);
    assert_eq!(pending.node_position_of(1), 3);
    assert_eq!(visit(&mut pending, B), 0);
    assert!(pending.reconcile().is_empty());
}

#[test]
fn insert_before_any_used_item_goes_first() {
    let mut pending = pending(&[A]);
    let inserted = pending.register_insert(X);
    pending.record_used(inserted);
    pending.update_node_count(inserted, 1);
    assert_eq!(pending.node_position_of(inserted), 0);
    assert_eq!(pending.node_position_of(0), 1);
    visit(&mut pending, A);
    assert!(pending.reconcile().is_empty());
}

#[test]
fn removal_insertion_and_moves_combine() {
    // [A, B, C, D] becomes [D, X, B].
    let mut pending = pending(&[A, B, C, D]);
    assert_eq!(visit(&mut pending, D), 3);
    let inserted = pending.register_insert(X);
    pending.record_used(inserted);
    pending.update_node_count(inserted, 1);
    assert_eq!(pending.node_position_of(inserted), 4);
    assert_eq!(visit(&mut pending, B), 1);

    assert_eq!(
        pending.reconcile(),
        vec![
            NodeEdit::Remove { at: 0, count: 1 },
            NodeEdit::Remove { at: 1, count: 1 },
            NodeEdit::Move {
                from: 1,
                to: 0,
                count: 1
            },
            NodeEdit::Move {
                from: 2,
                to: 1,
                count: 1
            },
        ]
    );
}

#[test]
fn items_without_nodes_are_not_moved() {
    let infos = vec![KeyInfo::previous(A, 0, 0, 0), KeyInfo::previous(B, 3, 1, 1)];
    let mut pending = Pending::new(infos, 0, false);
    visit(&mut pending, B);
    visit(&mut pending, A);
    assert!(pending.reconcile().is_empty());
}
