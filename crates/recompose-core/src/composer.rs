//! Single-pass composer over the slot table.
//!
//! The composer replays the previous pass recorded in the [`SlotTable`] while
//! the caller issues group and node calls. Matching keys take the fast path
//! and only record navigation. A mismatch opens a [`Pending`] for the enclosing
//! group that finds moved, inserted and removed children by key. All edits are
//! recorded as [`Change`]s and applied afterwards by [`Composer::apply_changes`].

use crate::applier::Applier;
use crate::changes::{read_node, Change, SlotActions};
use crate::collections::map::HashSet;
use crate::composition::{ComponentSlot, ComposerOptions, DuplicateKeyPolicy, Recomposable};
use crate::invalidation::{InvalidationQueue, Invalidations};
use crate::pending::{NodeEdit, Pending};
use crate::slot_table::{GroupKind, Slot, SlotTable};
use crate::{ApplierError, Key};
use std::cell::RefCell;
use std::rc::Rc;

const ROOT_KEY: Key = 0x7265_636f_6d70_6f73;

/// Most recent node removal or move, extended while the next one is adjacent.
#[derive(Copy, Clone, Debug)]
enum Movement {
    Remove { index: usize, count: usize },
    Move { from: usize, to: usize, count: usize },
}

pub struct Composer<N> {
    slots: SlotTable,
    applier: Applier<N>,
    options: ComposerOptions,
    changes: Vec<Change<N>>,
    pending: Option<Pending>,
    pending_stack: Vec<Option<Pending>>,
    // Id of the open group within its parent's pending.
    group_key_info: Option<usize>,
    key_info_stack: Vec<Option<usize>>,
    node_index: usize,
    node_index_stack: Vec<usize>,
    group_node_count: usize,
    group_node_count_stack: Vec<usize>,
    children_allowed: bool,
    // Keys opened so far in the current group; tracked only when duplicates
    // are rejected.
    sibling_keys: HashSet<Key>,
    sibling_keys_stack: Vec<HashSet<Key>>,
    invalidations: Invalidations,
    queue: InvalidationQueue,
    enters_stack: Vec<GroupKind>,
    // Components whose compose group was opened while inserting.
    inserted_parents: Vec<Rc<RefCell<dyn Recomposable<N>>>>,
    slot_actions: SlotActions,
    movement: Option<Movement>,
}

impl<N: Clone + 'static> Composer<N> {
    pub fn new(slots: SlotTable, applier: Applier<N>, options: ComposerOptions) -> Self {
        Self {
            slots,
            applier,
            options,
            changes: Vec::new(),
            pending: None,
            pending_stack: Vec::new(),
            group_key_info: None,
            key_info_stack: Vec::new(),
            node_index: 0,
            node_index_stack: Vec::new(),
            group_node_count: 0,
            group_node_count_stack: Vec::new(),
            children_allowed: true,
            sibling_keys: HashSet::default(),
            sibling_keys_stack: Vec::new(),
            invalidations: Invalidations::default(),
            queue: InvalidationQueue::default(),
            enters_stack: Vec::new(),
            inserted_parents: Vec::new(),
            slot_actions: SlotActions::default(),
            movement: None,
        }
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn applier(&self) -> &Applier<N> {
        &self.applier
    }

    pub fn options(&self) -> ComposerOptions {
        self.options
    }

    /// Whether the group being composed is new in this pass.
    pub fn inserting(&self) -> bool {
        self.slots.in_empty()
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn has_invalidations(&self) -> bool {
        !self.queue.is_empty() || !self.invalidations.is_empty()
    }

    /// Run a full pass: every group is visited and `content` is re-run.
    pub fn compose_root(&mut self, content: impl FnOnce(&mut Self)) {
        assert!(
            self.changes.is_empty(),
            "apply_changes() must run before the next composition pass"
        );
        self.invalidations.resolve(&self.queue, &self.slots);
        self.slots.reset();
        self.slots.begin_reading();
        self.start_group(ROOT_KEY);
        content(self);
        self.end_group();
        self.slots.end_reading();
        self.finalize_compose();
        log::debug!("composition pass recorded {} changes", self.changes.len());
    }

    /// Re-run only the invalidated components. Returns `false` when nothing
    /// was invalidated.
    pub fn recompose(&mut self) -> bool {
        assert!(
            self.changes.is_empty(),
            "apply_changes() must run before the next composition pass"
        );
        self.invalidations.resolve(&self.queue, &self.slots);
        if self.invalidations.is_empty() {
            return false;
        }
        let invalidated = self.invalidations.len();
        self.slots.reset();
        self.slots.begin_reading();
        self.node_index = 0;
        self.group_node_count = 0;
        self.recompose_component_range(0, usize::MAX);
        self.slots.end_reading();
        self.finalize_compose();
        log::debug!(
            "recomposed {invalidated} invalidated groups, recorded {} changes",
            self.changes.len()
        );
        true
    }

    /// Replay the recorded changes against the applier and the slot table.
    pub fn apply_changes(&mut self) -> Result<(), ApplierError> {
        let changes = std::mem::take(&mut self.changes);
        if changes.is_empty() {
            return Ok(());
        }
        log::debug!("applying {} changes", changes.len());
        self.slots.reset();
        for change in changes {
            log::trace!("apply {change:?}");
            change.apply(&mut self.applier, &mut self.slots, &self.queue)?;
        }
        self.applier.reset();
        Ok(())
    }

    pub fn start_group(&mut self, key: Key) {
        self.start(key, GroupKind::Group);
    }

    pub fn end_group(&mut self) {
        self.end(GroupKind::Group);
    }

    /// Skip the rest of the open group; its content is known to be unchanged.
    pub fn skip_group(&mut self) {
        assert!(!self.inserting(), "Cannot skip a group while inserting");
        self.group_node_count = self.slots.skip_enclosing_group();
        self.slot_actions.record_skip_to_group_end();
    }

    /// Open a node group. Must be followed by [`emit_node`](Self::emit_node)
    /// or [`use_node`](Self::use_node).
    pub fn start_node(&mut self, key: Key) {
        self.start(key, GroupKind::Node);
        self.children_allowed = false;
    }

    /// Create the node with `factory` when inserting, otherwise return the node
    /// stored by a previous pass.
    pub fn emit_node(&mut self, factory: impl FnOnce() -> N) -> N {
        if self.inserting() {
            let node = factory();
            self.insert_node(node.clone());
            node
        } else {
            self.use_node()
        }
    }

    /// Insert a node created by the caller. Only valid while inserting.
    pub fn emit_node_with(&mut self, node: N) {
        assert!(self.inserting(), "emit_node_with() called when not inserting");
        self.insert_node(node);
    }

    pub fn use_node(&mut self) -> N {
        assert!(!self.inserting(), "use_node() called while inserting");
        self.slot_actions.record_down();
        let node = read_node(&mut self.slots);
        self.children_allowed = true;
        node
    }

    pub fn end_node(&mut self) {
        self.end(GroupKind::Node);
    }

    fn insert_node(&mut self, node: N) {
        let index = match self.node_index_stack.last() {
            Some(index) => *index,
            None => panic!("emit_node() called outside of a node group"),
        };
        self.record_operation(Change::InsertNode { index, node });
        self.children_allowed = true;
    }

    /// Run `block` against the current node when the changes are applied.
    pub fn apply<V: 'static>(&mut self, value: V, block: impl FnOnce(&mut N, V) + 'static) {
        self.record_operation(Change::ApplyToCurrent(Box::new(move |node: &mut N| {
            block(node, value)
        })));
    }

    pub fn next_slot(&mut self) -> Option<&Slot> {
        self.slots.next()
    }

    pub fn peek_slot(&self) -> Option<&Slot> {
        if self.inserting() {
            None
        } else {
            self.slots.get(self.slots.current())
        }
    }

    /// Keep the slot read by the last [`next_slot`](Self::next_slot).
    pub fn skip_value(&mut self) {
        self.slot_actions.record_slot_next(1);
    }

    /// Replace the slot read by the last [`next_slot`](Self::next_slot).
    pub fn update_value<T: 'static>(&mut self, value: T) {
        self.record_operation(Change::UpdateSlot(Slot::value(value)));
    }

    /// Compare `value` with the one stored by the previous pass, scheduling
    /// an update when it differs.
    pub fn changed<T: PartialEq + 'static>(&mut self, value: T) -> bool {
        let same = self
            .slots
            .next()
            .and_then(|slot| slot.as_value::<T>())
            .map_or(false, |previous| *previous == value);
        if same {
            self.skip_value();
            false
        } else {
            self.update_value(value);
            true
        }
    }

    /// Compose a recomposable component under `key`.
    ///
    /// A new instance is built with `factory` when the call site is inserted.
    /// Otherwise `update` receives the stored instance and returns whether its
    /// inputs changed; an unchanged instance is skipped unless it was
    /// invalidated.
    pub fn compose_component<C>(
        &mut self,
        key: Key,
        factory: impl FnOnce() -> C,
        update: impl FnOnce(&mut C) -> bool,
    ) -> Rc<RefCell<C>>
    where
        C: Recomposable<N> + 'static,
    {
        self.start_group(key);
        let (typed, handle, valid) = if self.inserting() {
            let typed = Rc::new(RefCell::new(factory()));
            let handle: Rc<RefCell<dyn Recomposable<N>>> = typed.clone();
            self.update_value(ComponentSlot {
                handle: Rc::clone(&handle),
                typed: typed.clone(),
            });
            (typed, handle, false)
        } else {
            let location = self.slots.current();
            let stored = match self
                .slots
                .next()
                .and_then(|slot| slot.as_value::<ComponentSlot<N>>())
                .cloned()
            {
                Some(stored) => stored,
                None => panic!("Expected a component in slot {location}"),
            };
            self.skip_value();
            let typed = match stored.typed.downcast::<RefCell<C>>() {
                Ok(typed) => typed,
                Err(_) => panic!("Component type changed in slot {location}"),
            };
            let changed = update(&mut typed.borrow_mut());
            (typed, stored.handle, !changed)
        };
        self.start_compose(valid, &handle);
        if !valid {
            handle.borrow_mut().compose(self);
        }
        self.done_compose(valid);
        self.end_group();
        typed
    }

    /// Open the compose group of `component`. A valid component opens nothing;
    /// [`done_compose`](Self::done_compose) then skips or partially
    /// recomposes its group.
    pub fn start_compose(&mut self, valid: bool, component: &Rc<RefCell<dyn Recomposable<N>>>) {
        if valid {
            return;
        }
        self.slots.start_group();
        self.slot_actions.record_start(GroupKind::Group);
        if self.inserting() {
            self.record_operation(Change::InstallTrigger(Rc::clone(component)));
            self.slots.begin_empty();
            self.inserted_parents.push(Rc::clone(component));
        } else {
            self.invalidations.remove_location(self.slots.current() - 1);
        }
        self.enter_group(GroupKind::Group, None, None);
    }

    pub fn done_compose(&mut self, valid: bool) {
        if !valid {
            if self.inserting() {
                self.inserted_parents.pop();
            }
            self.end(GroupKind::Group);
        } else if self.invalidations.is_empty() {
            self.skip_counted_group();
        } else {
            let start = self.slots.current();
            let end = start + self.slots.group_size() + 2;
            self.recompose_component_range(start, end);
        }
    }

    /// Visit the components enclosing the cursor, innermost first and
    /// starting with the one being composed. Stops when `visit` returns
    /// `false`.
    pub fn enum_parents(&self, mut visit: impl FnMut(&Rc<RefCell<dyn Recomposable<N>>>) -> bool) {
        for parent in self.inserted_parents.iter().rev() {
            if !visit(parent) {
                return;
            }
        }
        for &location in self.slots.open_groups().iter().rev() {
            if let Some(parent) = self.component_before(location) {
                if !visit(&parent) {
                    return;
                }
            }
        }
    }

    /// Visit the components recorded inside the open group by the previous
    /// pass, in slot order. A group being inserted has none. Stops when
    /// `visit` returns `false`.
    pub fn enum_children(&self, mut visit: impl FnMut(&Rc<RefCell<dyn Recomposable<N>>>) -> bool) {
        if self.inserting() {
            return;
        }
        let Some(&group) = self.slots.open_groups().last() else {
            return;
        };
        let start = group + 1;
        for location in start..start + self.slots.group_size_at(group) {
            if !self.slots.is_group_at(location) {
                continue;
            }
            if let Some(child) = self.component_before(location) {
                if !visit(&child) {
                    return;
                }
            }
        }
    }

    fn start(&mut self, key: Key, kind: GroupKind) {
        assert!(self.children_allowed, "A call to emit_node() or use_node() expected");
        if self.options.duplicate_keys == DuplicateKeyPolicy::Reject
            && !self.sibling_keys.insert(key)
        {
            panic!(
                "Duplicate key {key:#x} among sibling groups at slot {}",
                self.slots.current()
            );
        }
        if self.pending.is_none() {
            let (advanced, slot_key) = match self.slots.next() {
                Some(slot) => (true, slot.as_key()),
                None => (false, None),
            };
            if slot_key == Some(key) {
                // Same group as last time.
                self.slots.start(kind);
                self.slot_actions.record_slot_next(1);
                self.slot_actions.record_start(kind);
                self.enter_group(kind, None, None);
                return;
            }
            // Structure changed: collect the remaining previous siblings to
            // tell moved groups from inserted ones.
            if advanced {
                self.slots.previous();
            }
            let previous = self.slots.extract_item_keys();
            log::trace!(
                "pending created at slot {} over {} previous groups",
                self.slots.current(),
                previous.len()
            );
            self.pending = Some(Pending::new(
                previous,
                self.node_index,
                self.options.duplicate_keys == DuplicateKeyPolicy::Reject,
            ));
        }

        let Some(mut pending) = self.pending.take() else {
            return;
        };
        let new_key_info;
        let mut new_pending = None;
        if let Some(id) = pending.get_next(key) {
            pending.record_used(id);
            let location = match pending.key_info(id).location {
                Some(location) => location,
                None => panic!("Previous group {id} has no location"),
            };
            self.slots.set_current(location);
            self.slots.next();
            self.slots.start(kind);

            self.node_index = pending.node_position_of(id) + pending.start_index;
            let offset = pending.place_slot(id);
            if offset > 0 {
                log::trace!("moving group {key:#x} from {offset} items ahead");
                self.record_operation(Change::MoveItem { offset, kind });
            } else {
                self.slot_actions.record_slot_next(1);
                self.slot_actions.record_start(kind);
            }
            new_key_info = Some(id);
        } else {
            // New group: everything below it is inserted until it closes.
            if !self.slots.in_empty() {
                self.record_operation(Change::BeginInsert);
            }
            self.slots.begin_empty();
            self.record_operation(Change::StartItem { key, kind });
            let id = pending.register_insert(key);
            pending.record_used(id);
            log::trace!("inserting group {key:#x} at node {}", self.node_index);
            new_key_info = Some(id);
            let start_index = if kind == GroupKind::Node {
                0
            } else {
                self.node_index
            };
            new_pending = Some(Pending::new(Vec::new(), start_index, false));
        }
        self.pending = Some(pending);
        self.enter_group(kind, new_pending, new_key_info);
    }

    fn enter_group(
        &mut self,
        kind: GroupKind,
        new_pending: Option<Pending>,
        key_info: Option<usize>,
    ) {
        self.pending_stack.push(self.pending.take());
        self.pending = new_pending;
        let keys = std::mem::take(&mut self.sibling_keys);
        self.sibling_keys_stack.push(keys);
        self.key_info_stack.push(self.group_key_info.take());
        self.group_key_info = key_info;
        self.node_index_stack.push(self.node_index);
        if kind == GroupKind::Node {
            self.node_index = 0;
        }
        self.group_node_count_stack.push(self.group_node_count);
        self.group_node_count = 0;
    }

    fn end(&mut self, kind: GroupKind) {
        assert!(
            !self.pending_stack.is_empty(),
            "Unbalanced calls to start and end of a group"
        );
        let mut expected = self.group_node_count;

        if let Some(mut pending) = self.pending.take() {
            if let Some(last) = pending.previous().last().and_then(|info| info.location) {
                let start_index = pending.start_index;
                let edits = pending.reconcile();
                log::trace!(
                    "reconciled {} previous groups into {} used: {edits:?}",
                    pending.previous().len(),
                    pending.used().len()
                );
                for edit in edits {
                    match edit {
                        NodeEdit::Remove { at, count } => {
                            self.record_remove_node(at + start_index, count);
                            self.record_operation(Change::RemoveItem);
                        }
                        NodeEdit::Move { from, to, count } => {
                            self.record_move_node(from + start_index, to + start_index, count)
                        }
                    }
                }
                self.realize_movement();

                // Every previous group was visited; continue after the last one.
                self.slots.report_uncertain_node_count();
                self.slots.set_current(last);
                self.slots.skip_item();
            }
        }

        // Groups left over at the end of the previous pass.
        let remove_index = self.node_index;
        while !self.slots.is_group_end() {
            self.slots.next();
            self.slots.skip_memos();
            let count = self.slots.skip_group();
            log::trace!("removing trailing group with {count} nodes");
            self.record_remove_node(remove_index, count);
            self.record_operation(Change::RemoveItem);
            self.slots.report_uncertain_node_count();
        }

        if kind == GroupKind::Node {
            expected = 1;
        }
        self.slots.end();
        self.realize_movement();
        if kind == GroupKind::Node {
            self.slot_actions.record_up();
        }
        self.slot_actions.record_end(kind);

        if self.slots.in_empty() {
            self.slots.end_empty();
            if !self.slots.in_empty() {
                self.record_operation(Change::EndInsert);
            }
        }

        // Restore the parent, folding this group's node count into it.
        let mut parent_pending = self.pending_stack.pop().flatten();
        if let (Some(parent), Some(id)) = (parent_pending.as_mut(), self.group_key_info) {
            parent.update_node_count(id, expected);
        }
        self.pending = parent_pending;
        self.sibling_keys = self.sibling_keys_stack.pop().unwrap_or_default();
        self.group_key_info = self.key_info_stack.pop().flatten();
        self.node_index = self.node_index_stack.pop().unwrap_or_default() + expected;
        self.group_node_count = self.group_node_count_stack.pop().unwrap_or_default() + expected;
    }

    fn skip_counted_group(&mut self) {
        let kind = self.slots.group_start_at(self.slots.current()).kind;
        let count = self.slots.skip_group();
        self.slot_actions.record_skip(kind);
        self.node_index += count;
        self.group_node_count += count;
    }

    /// Skip siblings until the cursor is at `location` or at a group that
    /// contains it.
    fn skip_to_group_containing(&mut self, location: usize) {
        while self.slots.current() < location {
            if self.slots.is_group_end() {
                return;
            }
            if self.slots.is_group() {
                if location < self.slots.current() + self.slots.group_size() + 2 {
                    return;
                }
                self.skip_counted_group();
            } else {
                self.slot_actions.record_slot_next(1);
                self.slots.next();
            }
        }
    }

    /// Enter the groups containing `location` as if they were composed with
    /// no changes.
    fn record_enters(&mut self, location: usize) {
        loop {
            self.skip_to_group_containing(location);
            let current = self.slots.current();
            assert!(
                self.slots.is_group()
                    && location >= current
                    && location < current + self.slots.group_size() + 2,
                "Could not find group at {location}"
            );
            if current == location {
                return;
            }
            let kind = self.slots.group_start_at(current).kind;
            self.enter_group(kind, None, None);
            self.slot_actions.record_start(kind);
            self.slots.start(kind);
            if kind == GroupKind::Node {
                self.slot_actions.record_down();
                self.slots.next();
            }
            self.enters_stack.push(kind);
        }
    }

    /// Leave entered groups, down to `base`, until a sibling of `max` is
    /// reached.
    fn record_exits(&mut self, max: usize, base: usize) {
        while self.enters_stack.len() > base {
            self.skip_to_group_containing(max);
            if !self.slots.is_group_end() {
                return;
            }
            if let Some(kind) = self.enters_stack.pop() {
                self.end(kind);
            }
        }
    }

    fn recompose_component_range(&mut self, start: usize, end: usize) {
        let base = self.enters_stack.len();
        let mut recomposed = false;

        let mut next = self.invalidations.first_in_range(start, end);
        while let Some(invalidation) = next {
            let location = invalidation.location;
            self.invalidations.remove_location(location);

            self.record_exits(location, base);
            self.record_enters(location);
            let component = self.component_at(location);
            self.compose_instance(&component);
            recomposed = true;

            // Always walk forward; groups invalidated behind the cursor wait
            // for the next pass.
            next = self.invalidations.first_in_range(self.slots.current(), end);
        }

        if recomposed {
            self.record_exits(end, base);
        } else {
            self.skip_counted_group();
        }
    }

    fn component_at(&self, location: usize) -> Rc<RefCell<dyn Recomposable<N>>> {
        match self.component_before(location) {
            Some(component) => component,
            None => panic!("No component precedes the group at {location}"),
        }
    }

    /// Component owning the compose group at `location`, if any.
    fn component_before(&self, location: usize) -> Option<Rc<RefCell<dyn Recomposable<N>>>> {
        location
            .checked_sub(1)
            .and_then(|index| self.slots.get(index))
            .and_then(|slot| slot.as_value::<ComponentSlot<N>>())
            .map(|stored| Rc::clone(&stored.handle))
    }

    fn compose_instance(&mut self, component: &Rc<RefCell<dyn Recomposable<N>>>) {
        self.start_compose(false, component);
        component.borrow_mut().compose(self);
        self.done_compose(false);
    }

    fn finalize_compose(&mut self) {
        if let Some(actions) = self.slot_actions.take_final() {
            self.changes.push(Change::Slots(actions));
        }
        assert!(self.pending_stack.is_empty(), "Start end imbalance");
        debug_assert!(self.enters_stack.is_empty(), "Entered groups left open");
        debug_assert!(self.movement.is_none(), "Unrealized node movement");
        self.pending = None;
        self.sibling_keys.clear();
        self.inserted_parents.clear();
        self.group_key_info = None;
        self.node_index = 0;
        self.group_node_count = 0;
        self.children_allowed = true;
        self.invalidations.requeue(&self.queue);
    }

    fn realize_slots(&mut self) {
        if let Some(actions) = self.slot_actions.take() {
            self.changes.push(Change::Slots(actions));
        }
    }

    fn record_operation(&mut self, change: Change<N>) {
        self.realize_slots();
        self.changes.push(change);
    }

    fn record_remove_node(&mut self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(Movement::Remove { index: at, count: total }) = &mut self.movement {
            if *at == index {
                *total += count;
                return;
            }
        }
        self.realize_movement();
        self.movement = Some(Movement::Remove { index, count });
    }

    fn record_move_node(&mut self, from: usize, to: usize, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(Movement::Move {
            from: previous_from,
            to: previous_to,
            count: total,
        }) = &mut self.movement
        {
            if *previous_from + *total == from && *previous_to + *total == to {
                *total += count;
                return;
            }
        }
        self.realize_movement();
        self.movement = Some(Movement::Move { from, to, count });
    }

    fn realize_movement(&mut self) {
        match self.movement.take() {
            Some(Movement::Remove { index, count }) => {
                self.record_operation(Change::RemoveNodes { index, count })
            }
            Some(Movement::Move { from, to, count }) => {
                self.record_operation(Change::MoveNodes { from, to, count })
            }
            None => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn recorded_changes(&self) -> &[Change<N>] {
        &self.changes
    }

    #[cfg(test)]
    pub(crate) fn pending_slot_actions(&self) -> usize {
        self.slot_actions.len()
    }
}

#[cfg(test)]
#[path = "tests/composer_tests.rs"]
mod tests;
