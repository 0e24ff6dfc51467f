use super::*;
use crate::test_tree::{names, node, TestAdapter};
use std::rc::Rc;

#[test]
fn edits_target_the_current_node() {
    let root = node("root");
    let mut applier = Applier::new(Rc::clone(&root), TestAdapter::default());
    let column = node("column");
    applier.insert(0, Rc::clone(&column)).unwrap();
    applier.down(Rc::clone(&column));
    applier.insert(0, node("a")).unwrap();
    applier.insert(1, node("b")).unwrap();
    assert_eq!(applier.depth(), 1);
    applier.up();

    assert_eq!(names(&root), vec!["column"]);
    assert_eq!(names(&column), vec!["a", "b"]);
    assert!(Rc::ptr_eq(applier.current(), &root));
}

#[test]
fn move_destination_is_taken_before_removal() {
    let root = node("root");
    let mut applier = Applier::new(Rc::clone(&root), TestAdapter::default());
    for (index, name) in ["a", "b", "c", "d"].into_iter().enumerate() {
        applier.insert(index, node(name)).unwrap();
    }

    applier.move_children(2, 0, 2).unwrap();
    assert_eq!(names(&root), vec!["c", "d", "a", "b"]);

    applier.move_children(0, 3, 1).unwrap();
    assert_eq!(names(&root), vec!["d", "a", "c", "b"]);
}

#[test]
fn reset_returns_to_the_root() {
    let root = node("root");
    let mut applier = Applier::new(Rc::clone(&root), TestAdapter::default());
    applier.down(node("a"));
    applier.down(node("b"));
    applier.reset();
    assert_eq!(applier.depth(), 0);
    assert!(Rc::ptr_eq(applier.current(), applier.root()));
}

#[test]
#[should_panic(expected = "at the root")]
fn up_from_the_root_panics() {
    let mut applier = Applier::new(node("root"), TestAdapter::default());
    applier.up();
}

#[test]
fn out_of_bounds_insert_is_an_error() {
    let mut applier = Applier::new(node("root"), TestAdapter::default());
    let error = applier.insert(3, node("a")).unwrap_err();
    assert_eq!(error, ApplierError::IndexOutOfBounds { index: 3, len: 0 });
    assert_eq!(
        error.to_string(),
        "child index 3 out of bounds for 0 children"
    );
}
