use crate::applier::{Applier, ApplierAdapter};
use crate::composer::Composer;
use crate::invalidation::RecomposeTrigger;
use crate::slot_table::{SlotTable, MIN_GROWTH};
use crate::ApplierError;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// A component body that can be re-run on its own.
pub trait Recomposable<N> {
    fn compose(&mut self, composer: &mut Composer<N>);

    /// Receive the trigger bound to this component's group. Called once, when
    /// the component is first inserted.
    fn set_recompose(&mut self, trigger: RecomposeTrigger);
}

/// Component instance as stored in the slot preceding its compose group.
pub(crate) struct ComponentSlot<N> {
    pub(crate) handle: Rc<RefCell<dyn Recomposable<N>>>,
    pub(crate) typed: Rc<dyn Any>,
}

impl<N> Clone for ComponentSlot<N> {
    fn clone(&self) -> Self {
        Self {
            handle: Rc::clone(&self.handle),
            typed: Rc::clone(&self.typed),
        }
    }
}

/// How reconciliation treats siblings that share a key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DuplicateKeyPolicy {
    /// Match the first unclaimed previous sibling, in previous order.
    #[default]
    PreviousOrder,
    /// Panic when a changed group holds siblings with the same key.
    Reject,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ComposerOptions {
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Minimum number of slots the table grows by.
    pub min_growth: usize,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            duplicate_keys: DuplicateKeyPolicy::default(),
            min_growth: MIN_GROWTH,
        }
    }
}

/// Owns the retained slot table, the applier and the composer driving them.
pub struct Composition<N> {
    composer: Composer<N>,
}

impl<N: Clone + 'static> Composition<N> {
    pub fn new(root: N, adapter: impl ApplierAdapter<N> + 'static) -> Self {
        Self::with_options(root, adapter, ComposerOptions::default())
    }

    pub fn with_options(
        root: N,
        adapter: impl ApplierAdapter<N> + 'static,
        options: ComposerOptions,
    ) -> Self {
        let slots = SlotTable::with_min_growth(options.min_growth);
        Self {
            composer: Composer::new(slots, Applier::new(root, adapter), options),
        }
    }

    /// Run a full pass over `content` and apply the resulting edits.
    pub fn compose(&mut self, content: impl FnOnce(&mut Composer<N>)) -> Result<(), ApplierError> {
        self.composer.compose_root(content);
        self.composer.apply_changes()
    }

    /// Re-run invalidated components and apply the resulting edits. Returns
    /// whether anything was recomposed.
    pub fn recompose(&mut self) -> Result<bool, ApplierError> {
        let recomposed = self.composer.recompose();
        self.composer.apply_changes()?;
        Ok(recomposed)
    }

    pub fn has_invalidations(&self) -> bool {
        self.composer.has_invalidations()
    }

    pub fn root(&self) -> &N {
        self.composer.applier().root()
    }

    pub fn slots(&self) -> &SlotTable {
        self.composer.slots()
    }

    pub fn composer(&self) -> &Composer<N> {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer<N> {
        &mut self.composer
    }
}
