use crate::mock_tree::{EditStats, MockAdapter, MockNode};
use crate::validator::{validate_composition, ValidationError};
use crate::view_dsl::MockComposer;
use recompose_core::{ApplierError, ComposerOptions, Composition};
use std::cell::RefCell;
use std::rc::Rc;

/// Headless harness for exercising compositions in tests.
///
/// `ComposeTestRule` owns a composition over a [`MockNode`] tree rooted at a
/// `root` node and keeps the installed content so it can be re-run. Every edit
/// the composition makes to the tree is counted in [`EditStats`].
pub struct ComposeTestRule {
    composition: Composition<MockNode>,
    stats: Rc<RefCell<EditStats>>,
    content: Option<Box<dyn FnMut(&mut MockComposer)>>, // Re-run by every full pass.
    last_change_count: usize,
}

impl ComposeTestRule {
    pub fn new() -> Self {
        Self::with_options(ComposerOptions::default())
    }

    pub fn with_options(options: ComposerOptions) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let adapter = MockAdapter::new();
        let stats = adapter.stats();
        Self {
            composition: Composition::with_options(MockNode::new("root"), adapter, options),
            stats,
            content: None,
            last_change_count: 0,
        }
    }

    /// Install the provided content and perform the initial composition.
    pub fn set_content(
        &mut self,
        content: impl FnMut(&mut MockComposer) + 'static,
    ) -> Result<(), ApplierError> {
        self.content = Some(Box::new(content));
        self.recomposition()
    }

    /// Run a full pass over the installed content and apply its edits.
    pub fn recomposition(&mut self) -> Result<(), ApplierError> {
        if let Some(content) = self.content.as_mut() {
            let composer = self.composition.composer_mut();
            composer.compose_root(&mut **content);
            self.last_change_count = composer.change_count();
            composer.apply_changes()?;
        }
        Ok(())
    }

    /// Re-run invalidated components only. Returns whether anything was
    /// recomposed.
    pub fn recompose(&mut self) -> Result<bool, ApplierError> {
        let composer = self.composition.composer_mut();
        let recomposed = composer.recompose();
        self.last_change_count = composer.change_count();
        composer.apply_changes()?;
        Ok(recomposed)
    }

    /// Recompose until no invalidation is left.
    pub fn pump_until_idle(&mut self) -> Result<(), ApplierError> {
        let mut rounds = 0;
        while self.composition.has_invalidations() {
            rounds += 1;
            if rounds > 100 {
                panic!("pump_until_idle looped too many times!");
            }
            self.recompose()?;
        }
        Ok(())
    }

    pub fn root(&self) -> &MockNode {
        self.composition.root()
    }

    /// Dump the current node tree as text for debugging.
    pub fn dump_tree(&self) -> String {
        self.root().dump()
    }

    /// Edits applied to the tree since the rule was created or last reset.
    pub fn stats(&self) -> EditStats {
        *self.stats.borrow()
    }

    pub fn reset_stats(&mut self) {
        *self.stats.borrow_mut() = EditStats::default();
    }

    /// Number of changes recorded by the most recent pass.
    pub fn last_change_count(&self) -> usize {
        self.last_change_count
    }

    /// Returns whether user content has been installed in this rule.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Check the slot table against itself and against the node tree.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_composition(self.composition.slots(), self.root())
    }

    /// Gain mutable access to the raw composition for advanced scenarios.
    pub fn composition(&mut self) -> &mut Composition<MockNode> {
        &mut self.composition
    }
}

impl Default for ComposeTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `ComposeTestRule`.
pub fn run_test_composition<R>(f: impl FnOnce(&mut ComposeTestRule) -> R) -> R {
    let mut rule = ComposeTestRule::new();
    f(&mut rule)
}

#[cfg(test)]
#[path = "tests/testing_tests.rs"]
mod tests;
