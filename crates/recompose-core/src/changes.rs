//! Deferred edit script recorded during a composition pass.
//!
//! Each [`Change`] is a tagged command interpreted against the applier and the
//! slot table by [`Change::apply`]. Navigation over unchanged regions is
//! batched as [`SlotAction`]s so an unchanged pass records nothing at all.

use crate::applier::Applier;
use crate::composition::Recomposable;
use crate::invalidation::InvalidationQueue;
use crate::slot_table::{GroupKind, Slot, SlotTable};
use crate::{ApplierError, Key};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SlotAction {
    StartGroup,
    EndGroup,
    SkipGroup,
    StartNode,
    EndNode,
    SkipNode,
    Down,
    Up,
    SkipSlots(usize),
    SkipToGroupEnd,
}

impl SlotAction {
    fn is_navigation(self) -> bool {
        matches!(
            self,
            SlotAction::SkipGroup
                | SlotAction::SkipNode
                | SlotAction::SkipSlots(_)
                | SlotAction::Down
                | SlotAction::Up
        )
    }

    fn apply<N: Clone + 'static>(self, applier: &mut Applier<N>, slots: &mut SlotTable) {
        match self {
            SlotAction::StartGroup => slots.start_group(),
            SlotAction::EndGroup => {
                slots.end_group();
            }
            SlotAction::SkipGroup => {
                slots.skip_group();
            }
            SlotAction::StartNode => slots.start_node(),
            SlotAction::EndNode => {
                slots.end_node();
            }
            SlotAction::SkipNode => {
                slots.skip_node();
            }
            SlotAction::Down => {
                let node = read_node::<N>(slots);
                applier.down(node);
            }
            SlotAction::Up => applier.up(),
            SlotAction::SkipSlots(count) => slots.set_current(slots.current() + count),
            SlotAction::SkipToGroupEnd => slots.skip_to_group_end(),
        }
    }
}

pub(crate) fn read_node<N: Clone + 'static>(slots: &mut SlotTable) -> N {
    let location = slots.current();
    match slots.next().and_then(|slot| slot.as_value::<N>()).cloned() {
        Some(node) => node,
        None => panic!("Expected a node in slot {location}"),
    }
}

/// Pending slot navigation, flushed into a single [`Change::Slots`] before the
/// next recorded operation.
#[derive(Default)]
pub(crate) struct SlotActions {
    actions: Vec<SlotAction>,
    // Index of the start action of every group opened since the last flush.
    starts: Vec<usize>,
}

impl SlotActions {
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }

    pub(crate) fn record_slot_next(&mut self, count: usize) {
        debug_assert!(count >= 1, "Invalid call to record_slot_next()");
        if let Some(SlotAction::SkipSlots(last)) = self.actions.last_mut() {
            *last += count;
            return;
        }
        self.actions.push(SlotAction::SkipSlots(count));
    }

    pub(crate) fn record_start(&mut self, kind: GroupKind) {
        self.starts.push(self.actions.len());
        self.actions.push(match kind {
            GroupKind::Node => SlotAction::StartNode,
            GroupKind::Group => SlotAction::StartGroup,
            GroupKind::Memo => panic!("Memo groups are never entered by the composer"),
        });
    }

    /// Close a group. If its start is still buffered nothing inside it was
    /// changed, and the whole group collapses into a skip.
    pub(crate) fn record_end(&mut self, kind: GroupKind) {
        match self.starts.pop() {
            Some(start) => {
                self.actions.truncate(start);
                self.record_skip(kind);
            }
            None => self.actions.push(match kind {
                GroupKind::Node => SlotAction::EndNode,
                _ => SlotAction::EndGroup,
            }),
        }
    }

    pub(crate) fn record_skip(&mut self, kind: GroupKind) {
        self.actions.push(match kind {
            GroupKind::Node => SlotAction::SkipNode,
            _ => SlotAction::SkipGroup,
        });
    }

    pub(crate) fn record_skip_to_group_end(&mut self) {
        self.actions.push(SlotAction::SkipToGroupEnd);
    }

    pub(crate) fn record_down(&mut self) {
        self.actions.push(SlotAction::Down);
    }

    pub(crate) fn record_up(&mut self) {
        self.actions.push(SlotAction::Up);
    }

    pub(crate) fn take(&mut self) -> Option<Vec<SlotAction>> {
        if self.actions.is_empty() {
            return None;
        }
        self.starts.clear();
        Some(std::mem::take(&mut self.actions))
    }

    /// Flush at the end of a pass. Trailing navigation never mutates the
    /// table and is dropped.
    pub(crate) fn take_final(&mut self) -> Option<Vec<SlotAction>> {
        if self.actions.iter().all(|action| action.is_navigation()) {
            self.actions.clear();
            self.starts.clear();
            return None;
        }
        self.take()
    }
}

impl fmt::Debug for SlotActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.actions.iter()).finish()
    }
}

pub(crate) enum Change<N> {
    Slots(Vec<SlotAction>),
    /// Store a new node in the next slot, insert it and descend into it.
    InsertNode {
        index: usize,
        node: N,
    },
    RemoveNodes {
        index: usize,
        count: usize,
    },
    MoveNodes {
        from: usize,
        to: usize,
        count: usize,
    },
    UpdateSlot(Slot),
    /// Write the key of an inserted item and open its group.
    StartItem {
        key: Key,
        kind: GroupKind,
    },
    /// Bring the `offset`th following item to the cursor and open its group.
    MoveItem {
        offset: usize,
        kind: GroupKind,
    },
    RemoveItem,
    BeginInsert,
    EndInsert,
    ApplyToCurrent(Box<dyn FnOnce(&mut N)>),
    /// Anchor the group just opened and hand its trigger to the component.
    InstallTrigger(Rc<RefCell<dyn Recomposable<N>>>),
}

impl<N: Clone + 'static> Change<N> {
    pub(crate) fn apply(
        self,
        applier: &mut Applier<N>,
        slots: &mut SlotTable,
        queue: &InvalidationQueue,
    ) -> Result<(), ApplierError> {
        match self {
            Change::Slots(actions) => {
                for action in actions {
                    action.apply(applier, slots);
                }
            }
            Change::InsertNode { index, node } => {
                slots.update(Slot::value(node.clone()));
                applier.insert(index, node.clone())?;
                applier.down(node);
            }
            Change::RemoveNodes { index, count } => applier.remove(index, count)?,
            Change::MoveNodes { from, to, count } => applier.move_children(from, to, count)?,
            Change::UpdateSlot(value) => slots.update(value),
            Change::StartItem { key, kind } => {
                slots.update(Slot::Key(key));
                slots.start(kind);
            }
            Change::MoveItem { offset, kind } => {
                slots.move_item(offset);
                slots.next();
                slots.start(kind);
            }
            Change::RemoveItem => slots.remove_item(),
            Change::BeginInsert => slots.begin_insert(),
            Change::EndInsert => slots.end_insert(),
            Change::ApplyToCurrent(block) => block(applier.current_mut()),
            Change::InstallTrigger(component) => {
                let anchor = slots.anchor(slots.current() - 1);
                component.borrow_mut().set_recompose(queue.trigger(anchor));
            }
        }
        Ok(())
    }
}

impl<N> fmt::Debug for Change<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Slots(actions) => f.debug_tuple("Slots").field(actions).finish(),
            Change::InsertNode { index, .. } => write!(f, "InsertNode({index})"),
            Change::RemoveNodes { index, count } => write!(f, "RemoveNodes({index}, {count})"),
            Change::MoveNodes { from, to, count } => {
                write!(f, "MoveNodes({from} -> {to}, {count})")
            }
            Change::UpdateSlot(value) => write!(f, "UpdateSlot({value:?})"),
            Change::StartItem { key, kind } => write!(f, "StartItem({key:#x}, {kind:?})"),
            Change::MoveItem { offset, kind } => write!(f, "MoveItem({offset}, {kind:?})"),
            Change::RemoveItem => f.write_str("RemoveItem"),
            Change::BeginInsert => f.write_str("BeginInsert"),
            Change::EndInsert => f.write_str("EndInsert"),
            Change::ApplyToCurrent(_) => f.write_str("ApplyToCurrent"),
            Change::InstallTrigger(_) => f.write_str("InstallTrigger"),
        }
    }
}

#[cfg(test)]
#[path = "tests/changes_tests.rs"]
mod tests;
