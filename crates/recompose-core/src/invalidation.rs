//! Invalidation bookkeeping.
//!
//! Triggers only enqueue anchors; a pass resolves them to slot locations and
//! keeps them sorted so range scans can find the next invalidated group at or
//! after the cursor.

use crate::slot_table::{Anchor, SlotTable};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Handle given to a component so it can request recomposition of its group.
#[derive(Clone)]
pub struct RecomposeTrigger {
    anchor: Anchor,
    queue: Weak<RefCell<Vec<Anchor>>>,
}

impl RecomposeTrigger {
    /// Request that the component's group is re-run on the next pass.
    ///
    /// Returns `false` once the owning composer is gone.
    pub fn invalidate(&self) -> bool {
        let Some(queue) = self.queue.upgrade() else {
            return false;
        };
        let mut queue = queue.borrow_mut();
        if !queue.contains(&self.anchor) {
            queue.push(self.anchor);
        }
        true
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }
}

impl fmt::Debug for RecomposeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecomposeTrigger")
            .field("anchor", &self.anchor)
            .field("live", &(self.queue.strong_count() > 0))
            .finish()
    }
}

#[derive(Default)]
pub(crate) struct InvalidationQueue {
    anchors: Rc<RefCell<Vec<Anchor>>>,
}

impl InvalidationQueue {
    pub(crate) fn trigger(&self, anchor: Anchor) -> RecomposeTrigger {
        RecomposeTrigger {
            anchor,
            queue: Rc::downgrade(&self.anchors),
        }
    }

    pub(crate) fn push(&self, anchor: Anchor) {
        let mut anchors = self.anchors.borrow_mut();
        if !anchors.contains(&anchor) {
            anchors.push(anchor);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.anchors.borrow().is_empty()
    }

    pub(crate) fn drain(&self) -> Vec<Anchor> {
        std::mem::take(&mut *self.anchors.borrow_mut())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Invalidation {
    pub(crate) location: usize,
    pub(crate) anchor: Anchor,
}

/// Invalidations ordered by location.
#[derive(Default, Debug)]
pub(crate) struct Invalidations {
    entries: Vec<Invalidation>,
}

impl Invalidations {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn find_location(&self, location: usize) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| entry.location.cmp(&location))
    }

    pub(crate) fn insert_if_missing(&mut self, location: usize, anchor: Anchor) {
        if let Err(index) = self.find_location(location) {
            self.entries.insert(index, Invalidation { location, anchor });
        }
    }

    /// First invalidation with `start <= location < end`.
    pub(crate) fn first_in_range(&self, start: usize, end: usize) -> Option<Invalidation> {
        let index = match self.find_location(start) {
            Ok(index) | Err(index) => index,
        };
        self.entries
            .get(index)
            .filter(|entry| entry.location < end)
            .copied()
    }

    pub(crate) fn remove_location(&mut self, location: usize) -> Option<Invalidation> {
        self.find_location(location)
            .ok()
            .map(|index| self.entries.remove(index))
    }

    /// Resolve queued anchors against the table. Anchors whose group was
    /// removed are dropped.
    pub(crate) fn resolve(&mut self, queue: &InvalidationQueue, slots: &SlotTable) {
        for anchor in queue.drain() {
            match slots.anchor_location(anchor) {
                Some(location) => self.insert_if_missing(location, anchor),
                None => log::trace!("dropping invalidation of removed group {anchor:?}"),
            }
        }
    }

    /// Hand unprocessed invalidations back to the queue for the next pass.
    pub(crate) fn requeue(&mut self, queue: &InvalidationQueue) {
        for entry in self.entries.drain(..) {
            queue.push(entry.anchor);
        }
    }
}

#[cfg(test)]
#[path = "tests/invalidation_tests.rs"]
mod tests;
