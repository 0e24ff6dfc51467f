//! In-memory node tree driven by the engine in tests.

use recompose_core::{ApplierAdapter, ApplierError};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
struct MockData {
    kind: &'static str,
    text: String,
    children: Vec<MockNode>,
}

/// Shared handle to a node. Clones refer to the same node.
#[derive(Clone)]
pub struct MockNode(Rc<RefCell<MockData>>);

impl MockNode {
    pub fn new(kind: &'static str) -> Self {
        Self::with_text(kind, "")
    }

    pub fn with_text(kind: &'static str, text: impl Into<String>) -> Self {
        MockNode(Rc::new(RefCell::new(MockData {
            kind,
            text: text.into(),
            children: Vec::new(),
        })))
    }

    pub fn kind(&self) -> &'static str {
        self.0.borrow().kind
    }

    pub fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.0.borrow_mut().text = text.into();
    }

    pub fn children(&self) -> Vec<MockNode> {
        self.0.borrow().children.clone()
    }

    pub fn child(&self, index: usize) -> Option<MockNode> {
        self.0.borrow().children.get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &MockNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Render the subtree as `kind(child, ...)`, with `kind:'text'` for nodes
    /// carrying text.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(&mut out);
        out
    }

    fn write_dump(&self, out: &mut String) {
        let data = self.0.borrow();
        out.push_str(data.kind);
        if !data.text.is_empty() {
            out.push_str(":'");
            out.push_str(&data.text);
            out.push('\'');
        }
        if !data.children.is_empty() {
            out.push('(');
            for (index, child) in data.children.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                child.write_dump(out);
            }
            out.push(')');
        }
    }
}

impl fmt::Debug for MockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

/// Edits performed by a [`MockAdapter`] since the last reset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EditStats {
    pub inserts: usize,
    pub removes: usize,
    pub moves: usize,
}

impl EditStats {
    pub fn total(&self) -> usize {
        self.inserts + self.removes + self.moves
    }
}

/// Applies edits to [`MockNode`]s, counting them and rejecting any index that
/// falls outside the parent's children.
#[derive(Default)]
pub struct MockAdapter {
    stats: Rc<RefCell<EditStats>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the edit counters, valid after the adapter is moved into
    /// an applier.
    pub fn stats(&self) -> Rc<RefCell<EditStats>> {
        Rc::clone(&self.stats)
    }
}

impl ApplierAdapter<MockNode> for MockAdapter {
    fn insert_at(
        &mut self,
        parent: &mut MockNode,
        index: usize,
        child: MockNode,
    ) -> Result<(), ApplierError> {
        let mut data = parent.0.borrow_mut();
        let len = data.children.len();
        if index > len {
            return Err(ApplierError::IndexOutOfBounds { index, len });
        }
        log::trace!("insert {} into {} at {index}", child.kind(), data.kind);
        data.children.insert(index, child);
        self.stats.borrow_mut().inserts += 1;
        Ok(())
    }

    fn remove_at(
        &mut self,
        parent: &mut MockNode,
        index: usize,
        count: usize,
    ) -> Result<(), ApplierError> {
        let mut data = parent.0.borrow_mut();
        let len = data.children.len();
        if index + count > len {
            return Err(ApplierError::RangeOutOfBounds {
                start: index,
                count,
                len,
            });
        }
        log::trace!("remove {count} from {} at {index}", data.kind);
        data.children.drain(index..index + count);
        self.stats.borrow_mut().removes += count;
        Ok(())
    }

    fn move_range(
        &mut self,
        parent: &mut MockNode,
        from: usize,
        to: usize,
        count: usize,
    ) -> Result<(), ApplierError> {
        let mut data = parent.0.borrow_mut();
        let len = data.children.len();
        if from + count > len || to > len {
            return Err(ApplierError::RangeOutOfBounds {
                start: from,
                count,
                len,
            });
        }
        if from < to && to < from + count {
            return Err(ApplierError::rejected(format!(
                "move destination {to} lies inside the moved range {from}..{}",
                from + count
            )));
        }
        if from == to {
            return Ok(());
        }
        log::trace!("move {count} in {} from {from} to {to}", data.kind);
        let moved: Vec<MockNode> = data.children.drain(from..from + count).collect();
        let dest = if from > to { to } else { to - count };
        data.children.splice(dest..dest, moved);
        self.stats.borrow_mut().moves += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/mock_tree_tests.rs"]
mod tests;
