//! Minimal shared node tree for unit tests.

use crate::{Applier, ApplierAdapter, ApplierError, Composer, ComposerOptions, Key, SlotTable};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
pub(crate) struct TestNodeData {
    pub(crate) name: String,
    pub(crate) children: Vec<TestNode>,
}

pub(crate) type TestNode = Rc<RefCell<TestNodeData>>;

pub(crate) fn node(name: &str) -> TestNode {
    Rc::new(RefCell::new(TestNodeData {
        name: name.to_string(),
        children: Vec::new(),
    }))
}

pub(crate) fn names(node: &TestNode) -> Vec<String> {
    node.borrow()
        .children
        .iter()
        .map(|child| child.borrow().name.clone())
        .collect()
}

pub(crate) fn child(node: &TestNode, index: usize) -> TestNode {
    Rc::clone(&node.borrow().children[index])
}

/// Adapter over [`TestNode`] that logs every edit it performs.
#[derive(Default)]
pub(crate) struct TestAdapter {
    pub(crate) log: Rc<RefCell<Vec<String>>>,
}

impl ApplierAdapter<TestNode> for TestAdapter {
    fn insert_at(
        &mut self,
        parent: &mut TestNode,
        index: usize,
        child: TestNode,
    ) -> Result<(), ApplierError> {
        let mut parent = parent.borrow_mut();
        let len = parent.children.len();
        if index > len {
            return Err(ApplierError::IndexOutOfBounds { index, len });
        }
        self.log
            .borrow_mut()
            .push(format!("insert {} at {index}", child.borrow().name));
        parent.children.insert(index, child);
        Ok(())
    }

    fn remove_at(
        &mut self,
        parent: &mut TestNode,
        index: usize,
        count: usize,
    ) -> Result<(), ApplierError> {
        let mut parent = parent.borrow_mut();
        let len = parent.children.len();
        if index + count > len {
            return Err(ApplierError::RangeOutOfBounds {
                start: index,
                count,
                len,
            });
        }
        self.log
            .borrow_mut()
            .push(format!("remove {count} at {index}"));
        parent.children.drain(index..index + count);
        Ok(())
    }

    fn move_range(
        &mut self,
        parent: &mut TestNode,
        from: usize,
        to: usize,
        count: usize,
    ) -> Result<(), ApplierError> {
        let mut parent = parent.borrow_mut();
        let len = parent.children.len();
        if from + count > len || to > len {
            return Err(ApplierError::RangeOutOfBounds {
                start: from,
                count,
                len,
            });
        }
        self.log
            .borrow_mut()
            .push(format!("move {count} from {from} to {to}"));
        let moved: Vec<TestNode> = parent.children.drain(from..from + count).collect();
        let dest = if from > to { to } else { to - count };
        parent.children.splice(dest..dest, moved);
        Ok(())
    }
}

pub(crate) fn test_composer() -> (Composer<TestNode>, Rc<RefCell<Vec<String>>>) {
    test_composer_with(ComposerOptions::default())
}

pub(crate) fn test_composer_with(
    options: ComposerOptions,
) -> (Composer<TestNode>, Rc<RefCell<Vec<String>>>) {
    let adapter = TestAdapter::default();
    let log = Rc::clone(&adapter.log);
    let applier = Applier::new(node("root"), adapter);
    (Composer::new(SlotTable::new(), applier, options), log)
}

/// Emit a childless node named `name` under `key`.
pub(crate) fn leaf(composer: &mut Composer<TestNode>, key: Key, name: &str) -> TestNode {
    composer.start_node(key);
    let created = composer.emit_node(|| node(name));
    composer.end_node();
    created
}

/// Emit a node whose name is kept in sync with `text`.
pub(crate) fn text(composer: &mut Composer<TestNode>, key: Key, text: &str) {
    composer.start_node(key);
    composer.emit_node(|| node(""));
    if composer.changed(text.to_string()) {
        composer.apply(text.to_string(), |node: &mut TestNode, text: String| {
            node.borrow_mut().name = text
        });
    }
    composer.end_node();
}
