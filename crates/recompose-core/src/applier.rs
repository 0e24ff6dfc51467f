//! Dispatch layer between recorded edits and a concrete node tree.

use crate::ApplierError;

/// Tree primitives supplied by the embedding toolkit.
///
/// `parent` is always the applier's current node. Indices are positions in the
/// parent's child list. For [`move_range`](ApplierAdapter::move_range), `to` is
/// the destination index computed before the moved children are removed, so a
/// forward move lands at `to - count`.
pub trait ApplierAdapter<N> {
    fn insert_at(&mut self, parent: &mut N, index: usize, child: N) -> Result<(), ApplierError>;
    fn remove_at(&mut self, parent: &mut N, index: usize, count: usize)
        -> Result<(), ApplierError>;
    fn move_range(
        &mut self,
        parent: &mut N,
        from: usize,
        to: usize,
        count: usize,
    ) -> Result<(), ApplierError>;
}

/// Cursor over the external tree.
///
/// `down`/`up` maintain the stack of parents; edits always target the current
/// node. The applier holds no knowledge of the tree shape itself.
pub struct Applier<N> {
    adapter: Box<dyn ApplierAdapter<N>>,
    root: N,
    current: N,
    stack: Vec<N>,
}

impl<N: Clone> Applier<N> {
    pub fn new(root: N, adapter: impl ApplierAdapter<N> + 'static) -> Self {
        Self {
            adapter: Box::new(adapter),
            current: root.clone(),
            root,
            stack: Vec::new(),
        }
    }

    pub fn root(&self) -> &N {
        &self.root
    }

    pub fn current(&self) -> &N {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut N {
        &mut self.current
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn down(&mut self, node: N) {
        let parent = std::mem::replace(&mut self.current, node);
        self.stack.push(parent);
    }

    pub fn up(&mut self) {
        match self.stack.pop() {
            Some(parent) => self.current = parent,
            None => panic!("Applier::up() called at the root"),
        }
    }

    pub fn insert(&mut self, index: usize, node: N) -> Result<(), ApplierError> {
        self.adapter.insert_at(&mut self.current, index, node)
    }

    pub fn remove(&mut self, index: usize, count: usize) -> Result<(), ApplierError> {
        self.adapter.remove_at(&mut self.current, index, count)
    }

    pub fn move_children(
        &mut self,
        from: usize,
        to: usize,
        count: usize,
    ) -> Result<(), ApplierError> {
        self.adapter.move_range(&mut self.current, from, to, count)
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.current = self.root.clone();
    }
}

#[cfg(test)]
#[path = "tests/applier_tests.rs"]
mod tests;
