//! Reconciliation state for a group whose children changed structure.

use crate::collections::map::Entry;
use crate::collections::MultiMap;
use crate::Key;
use smallvec::smallvec;

/// An item as it existed in the previous composition, or an item inserted
/// during the current one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: Key,
    /// Location of the item's key slot; `None` for inserted items.
    pub location: Option<usize>,
    /// Nodes the item contributed last time (always 1 for a node group).
    pub nodes: usize,
    /// Position of this info within its [`Pending`].
    pub index: usize,
}

impl KeyInfo {
    pub(crate) fn previous(key: Key, location: usize, nodes: usize, index: usize) -> Self {
        Self {
            key,
            location: Some(location),
            nodes,
            index,
        }
    }

    pub(crate) fn inserted(key: Key, index: usize) -> Self {
        Self {
            key,
            location: None,
            nodes: 0,
            index,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct GroupInfo {
    /// Position among the not yet placed previous items, as the slot table will
    /// see them once the recorded moves are applied. `None` for inserts.
    slot_index: Option<usize>,
    /// Nodes the item holds after the changes recorded so far.
    node_count: usize,
}

/// Node edit computed when the pending group closes. Indices are relative to
/// [`Pending::start_index`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum NodeEdit {
    /// Remove an unused item: its `count` nodes at `at` and its slots.
    Remove { at: usize, count: usize },
    Move { from: usize, to: usize, count: usize },
}

pub(crate) struct Pending {
    key_infos: Vec<KeyInfo>, // previous items first, then inserted ones
    previous_len: usize,
    group_infos: Vec<GroupInfo>,
    key_map: MultiMap<Key, usize>,
    used: Vec<usize>,
    used_flags: Vec<bool>,
    // Item ids in the order their nodes currently sit in the external tree.
    layout: Vec<usize>,
    placed_slots: usize,
    pub(crate) start_index: usize,
}

impl Pending {
    pub(crate) fn new(
        key_infos: Vec<KeyInfo>,
        start_index: usize,
        reject_duplicates: bool,
    ) -> Self {
        let mut key_map: MultiMap<Key, usize> = MultiMap::default();
        for info in &key_infos {
            match key_map.entry(info.key) {
                Entry::Occupied(mut bucket) => {
                    if reject_duplicates {
                        panic!(
                            "Duplicate key {:#x} among sibling groups at {:?}",
                            info.key, info.location
                        );
                    }
                    bucket.get_mut().push(info.index);
                }
                Entry::Vacant(bucket) => {
                    bucket.insert(smallvec![info.index]);
                }
            }
        }
        let group_infos = key_infos
            .iter()
            .enumerate()
            .map(|(index, info)| GroupInfo {
                slot_index: Some(index),
                node_count: info.nodes,
            })
            .collect();
        let previous_len = key_infos.len();
        Self {
            previous_len,
            group_infos,
            key_map,
            used: Vec::new(),
            used_flags: vec![false; previous_len],
            layout: (0..previous_len).collect(),
            placed_slots: 0,
            start_index,
            key_infos,
        }
    }

    /// Items of the previous composition.
    pub(crate) fn previous(&self) -> &[KeyInfo] {
        &self.key_infos[..self.previous_len]
    }

    pub(crate) fn key_info(&self, id: usize) -> &KeyInfo {
        &self.key_infos[id]
    }

    /// Take the first unclaimed previous item with `key`, in previous order.
    pub(crate) fn get_next(&mut self, key: Key) -> Option<usize> {
        let bucket = self.key_map.get_mut(&key)?;
        let id = bucket.remove(0);
        if bucket.is_empty() {
            self.key_map.remove(&key);
        }
        Some(id)
    }

    pub(crate) fn record_used(&mut self, id: usize) {
        if let Some(flag) = self.used_flags.get_mut(id) {
            *flag = true;
        }
        self.used.push(id);
    }

    pub(crate) fn used(&self) -> &[usize] {
        &self.used
    }

    /// Register a new item composed right after the last used one.
    pub(crate) fn register_insert(&mut self, key: Key) -> usize {
        let id = self.key_infos.len();
        self.key_infos.push(KeyInfo::inserted(key, id));
        self.group_infos.push(GroupInfo {
            slot_index: None,
            node_count: 0,
        });
        let position = match self.used.last() {
            Some(last) => self.layout_position(*last) + 1,
            None => 0,
        };
        self.layout.insert(position, id);
        id
    }

    /// Claim the slot position of a previous item and return how many items
    /// after the cursor it must be moved from.
    pub(crate) fn place_slot(&mut self, id: usize) -> usize {
        let from = match self.group_infos[id].slot_index {
            Some(index) => index,
            None => panic!("Inserted item {id} has no slot position"),
        };
        let to = self.placed_slots;
        debug_assert!(from >= to, "Item {id} was already placed");
        self.register_move_slot(from, to);
        self.placed_slots += 1;
        from - to
    }

    fn register_move_slot(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        for group in &mut self.group_infos {
            match group.slot_index {
                Some(position) if position == from => group.slot_index = Some(to),
                Some(position) if (to..from).contains(&position) => {
                    group.slot_index = Some(position + 1)
                }
                _ => {}
            }
        }
    }

    pub(crate) fn node_position_of(&self, id: usize) -> usize {
        self.layout
            .iter()
            .take_while(|other| **other != id)
            .map(|other| self.group_infos[*other].node_count)
            .sum()
    }

    pub(crate) fn update_node_count(&mut self, id: usize, count: usize) {
        self.group_infos[id].node_count = count;
    }

    /// Compute the removals for unused previous items, in previous order,
    /// followed by the moves that bring the used items into the order they
    /// were composed in.
    pub(crate) fn reconcile(&mut self) -> Vec<NodeEdit> {
        let mut edits = Vec::new();

        let mut position = 0;
        let mut index = 0;
        while index < self.layout.len() {
            let id = self.layout[index];
            let count = self.group_infos[id].node_count;
            if id < self.previous_len && !self.used_flags[id] {
                edits.push(NodeEdit::Remove { at: position, count });
                self.group_infos[id].node_count = 0;
                self.layout.remove(index);
            } else {
                position += count;
                index += 1;
            }
        }

        for target in 0..self.used.len() {
            let id = self.used[target];
            let current = self.layout_position(id);
            if current == target {
                continue;
            }
            debug_assert!(current > target, "Item {id} moved behind placed items");
            let from = self.node_offset(current);
            let to = self.node_offset(target);
            let count = self.group_infos[id].node_count;
            if count > 0 && from != to {
                edits.push(NodeEdit::Move { from, to, count });
            }
            self.layout.remove(current);
            self.layout.insert(target, id);
        }
        edits
    }

    fn layout_position(&self, id: usize) -> usize {
        match self.layout.iter().position(|other| *other == id) {
            Some(position) => position,
            None => panic!("Item {id} is not part of the pending layout"),
        }
    }

    fn node_offset(&self, layout_index: usize) -> usize {
        self.layout[..layout_index]
            .iter()
            .map(|id| self.group_infos[*id].node_count)
            .sum()
    }
}

#[cfg(test)]
#[path = "tests/pending_tests.rs"]
mod tests;
