//! Slot table implementation using a gap-buffer strategy.
//!
//! The table is a flat sequence of slots partitioned into nested groups:
//! - A *group* is `GroupStart`, its content, then a `GroupEnd` marker at
//!   `start + slots + 1`.
//! - An *item* is a key slot, optional memo groups, then a group.
//! - A *node* group maps to exactly one node of the external tree; it counts as
//!   a single node in its parent no matter how many nodes it contains.
//! - A *memo* group sits between an item's key and its group and stores the
//!   compared arguments of a call.
//!
//! All positions handed out by the table are logical; the gap is only visible
//! through [`SlotTable::effective_index`]. The table has three nestable modes:
//! reading (mutation is a protocol violation), inserting (`next` grows the table
//! at the cursor) and empty (reads report nothing and the cursor stays put).

use crate::pending::KeyInfo;
use crate::Key;
use std::any::Any;
use std::fmt;

pub(crate) const MIN_GROWTH: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Group,
    Node,
    Memo,
}

/// Marker written at the start of every group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupStart {
    pub kind: GroupKind,
    /// Number of content slots between this marker and its `GroupEnd`.
    pub slots: usize,
    /// Number of nodes the group contributed when it was last closed.
    pub nodes: usize,
}

impl GroupStart {
    pub fn is_node(&self) -> bool {
        self.kind == GroupKind::Node
    }

    pub fn is_memo(&self) -> bool {
        self.kind == GroupKind::Memo
    }

    /// Nodes this group contributes to its parent.
    pub fn contributed_nodes(&self) -> usize {
        if self.is_node() {
            1
        } else {
            self.nodes
        }
    }
}

#[derive(Default)]
pub enum Slot {
    #[default]
    Empty,
    GroupStart(GroupStart),
    GroupEnd,
    Key(Key),
    Value(Box<dyn Any>),
}

impl Slot {
    pub fn value<T: 'static>(value: T) -> Self {
        Slot::Value(Box::new(value))
    }

    pub fn as_value<T: 'static>(&self) -> Option<&T> {
        match self {
            Slot::Value(data) => data.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<Key> {
        match self {
            Slot::Key(key) => Some(*key),
            _ => None,
        }
    }

    pub fn as_group_start(&self) -> Option<GroupStart> {
        match self {
            Slot::GroupStart(start) => Some(*start),
            _ => None,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => f.write_str("Empty"),
            Slot::GroupStart(start) => write!(
                f,
                "{:?}(slots={}, nodes={})",
                start.kind, start.slots, start.nodes
            ),
            Slot::GroupEnd => f.write_str("End"),
            Slot::Key(key) => write!(f, "Key({key:#x})"),
            Slot::Value(_) => f.write_str("Value"),
        }
    }
}

/// Stable handle to a slot position.
///
/// The table keeps anchored positions current across inserts, removes and
/// item moves. An anchor whose slot was removed no longer resolves, even
/// after its id is handed out again for another slot.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Anchor {
    id: usize,
    generation: u32,
}

#[derive(Copy, Clone, Debug, Default)]
struct AnchorEntry {
    location: Option<usize>,
    generation: u32,
}

pub struct SlotTable {
    slots: Vec<Slot>,
    gap_start: usize,
    gap_len: usize,
    current: usize,
    current_end: usize,
    insert_count: usize,
    empty_count: usize,
    reading_count: usize,
    start_stack: Vec<usize>,
    kind_stack: Vec<GroupKind>,
    // Ends are stored relative to the end of the table so edits inside a child
    // group are already reflected when the parent's end is restored.
    end_stack: Vec<usize>,
    // `None` once the count of the open group can no longer be verified.
    node_count: Option<usize>,
    node_count_stack: Vec<Option<usize>>,
    anchors: Vec<AnchorEntry>, // index = anchor id
    free_anchors: Vec<usize>,
    min_growth: usize,
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotTable {
    pub fn new() -> Self {
        Self::with_min_growth(MIN_GROWTH)
    }

    pub fn with_min_growth(min_growth: usize) -> Self {
        Self {
            slots: Vec::new(),
            gap_start: 0,
            gap_len: 0,
            current: 0,
            current_end: 0,
            insert_count: 0,
            empty_count: 0,
            reading_count: 0,
            start_stack: Vec::new(),
            kind_stack: Vec::new(),
            end_stack: Vec::new(),
            node_count: Some(0),
            node_count_stack: Vec::new(),
            anchors: Vec::new(),
            free_anchors: Vec::new(),
            min_growth: min_growth.max(1),
        }
    }

    /// Number of logical slots.
    pub fn size(&self) -> usize {
        self.slots.len() - self.gap_len
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn set_current(&mut self, index: usize) {
        debug_assert!(index <= self.size(), "cursor {index} past the end of the table");
        self.current = index;
    }

    /// Backing index of a logical position.
    pub fn effective_index(&self, index: usize) -> usize {
        if index < self.gap_start {
            index
        } else {
            index + self.gap_len
        }
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(self.effective_index(index))
    }

    /// The slot most recently passed by the cursor.
    pub fn get_previous(&self) -> Option<&Slot> {
        if self.empty_count > 0 || self.current == 0 {
            None
        } else {
            self.get(self.current - 1)
        }
    }

    /// Advance the cursor, returning the slot passed over.
    ///
    /// Returns `None` in empty mode, at the end of the enclosing group, and for
    /// the freshly created slot while inserting.
    pub fn next(&mut self) -> Option<&Slot> {
        if self.empty_count > 0 {
            return None;
        }
        let inserted = self.insert_count > 0;
        if inserted {
            self.insert(1);
        }
        if self.current >= self.current_end {
            return None;
        }
        let index = self.current;
        self.current += 1;
        if inserted {
            None
        } else {
            self.get(index)
        }
    }

    /// Write the slot just passed by the cursor.
    pub fn set(&mut self, value: Slot) {
        assert!(self.reading_count == 0, "Cannot set or update while in reading mode");
        assert!(self.empty_count == 0, "Cannot set or update in an empty region");
        assert!(self.current > 0, "No slot to set before the first slot");
        let index = self.effective_index(self.current - 1);
        self.slots[index] = value;
    }

    /// Advance and write the slot passed over.
    pub fn update(&mut self, value: Slot) {
        self.next();
        self.set(value);
    }

    /// Step back one slot, e.g. to un-read a key that did not match.
    pub fn previous(&mut self) {
        if self.empty_count == 0 {
            assert!(self.current > 0, "Invalid call to previous");
            self.current -= 1;
        }
    }

    pub fn begin_insert(&mut self) {
        assert!(self.reading_count == 0, "Cannot insert while reading");
        self.insert_count += 1;
    }

    pub fn end_insert(&mut self) {
        assert!(self.insert_count > 0, "Unbalanced begin/end insert");
        self.insert_count -= 1;
    }

    pub fn is_inserting(&self) -> bool {
        self.insert_count > 0
    }

    pub fn begin_empty(&mut self) {
        self.empty_count += 1;
    }

    pub fn end_empty(&mut self) {
        assert!(self.empty_count > 0, "Unbalanced begin/end empty");
        self.empty_count -= 1;
    }

    pub fn in_empty(&self) -> bool {
        self.empty_count > 0
    }

    pub fn begin_reading(&mut self) {
        self.reading_count += 1;
    }

    pub fn end_reading(&mut self) {
        assert!(self.reading_count > 0, "Unbalanced begin/end reading");
        self.reading_count -= 1;
    }

    pub fn is_reading(&self) -> bool {
        self.reading_count > 0
    }

    /// Return the cursor to the first slot.
    pub fn reset(&mut self) {
        assert!(self.insert_count == 0, "Cannot reset while inserting");
        assert!(self.start_stack.is_empty(), "Cannot reset in an open group");
        assert!(self.empty_count == 0, "Cannot reset in an empty region");
        assert!(self.reading_count == 0, "Cannot reset when in reading mode");
        self.current = 0;
        self.current_end = self.size();
        self.node_count = Some(0);
        self.node_count_stack.clear();
    }

    pub fn start_group(&mut self) {
        self.start(GroupKind::Group);
    }

    pub fn start_node(&mut self) {
        self.start(GroupKind::Node);
    }

    pub fn start_memo(&mut self) {
        self.start(GroupKind::Memo);
    }

    pub(crate) fn start(&mut self, kind: GroupKind) {
        if self.empty_count > 0 {
            return;
        }
        self.start_stack.push(self.current);
        self.kind_stack.push(kind);
        self.node_count_stack.push(self.node_count);
        self.end_stack.push(self.size() - self.current_end);
        self.node_count = Some(0);
        if self.insert_count > 0 {
            // Placeholder for the GroupStart written by end_group().
            self.next();
            self.current_end = self.current;
        } else {
            let location = self.current;
            let start = match self.next() {
                Some(Slot::GroupStart(start)) => *start,
                other => panic!("Expected a group start at {location}, found {other:?}"),
            };
            assert!(
                start.kind == kind,
                "Group kind changed at {location}: expected {kind:?}, found {:?}",
                start.kind
            );
            self.current_end = self.current + start.slots;
        }
    }

    pub fn end_group(&mut self) -> usize {
        self.end()
    }

    pub fn end_node(&mut self) -> usize {
        self.end()
    }

    pub fn end_memo(&mut self) -> usize {
        self.end()
    }

    /// Close the open group and return the number of nodes it contains.
    ///
    /// While reading, the observed length and node count must match what was
    /// recorded unless the count was reported uncertain. Otherwise the group
    /// start is rewritten with the observed values.
    pub(crate) fn end(&mut self) -> usize {
        if self.empty_count > 0 {
            return 0;
        }
        assert!(
            !self.start_stack.is_empty(),
            "Invalid state. Unbalanced calls to start_group() and end_group()"
        );
        assert!(
            self.insert_count > 0 || self.current == self.current_end,
            "Expected to be at the end of a group (current={}, end={})",
            self.current,
            self.current_end
        );
        let start_location = self.start_stack.pop().unwrap_or_default();
        let kind = self.kind_stack.pop().unwrap_or(GroupKind::Group);
        let len = self.current - start_location - 1;

        if self.insert_count > 0 {
            self.next();
            self.set(Slot::GroupEnd);
        } else {
            debug_assert!(
                matches!(self.get(self.current), Some(Slot::GroupEnd)),
                "Missing group end marker at {}",
                self.current
            );
            self.current += 1;
        }

        let count = if self.reading_count > 0 {
            let start = self.group_start_at(start_location);
            assert!(
                start.slots == len && self.node_count.map_or(true, |n| n == start.nodes),
                "Invalid end_group call, expected {} slots and {} nodes, found {} and {:?}",
                start.slots,
                start.nodes,
                len,
                self.node_count
            );
            start.nodes
        } else {
            let nodes = match self.node_count {
                Some(nodes) => nodes,
                None => self.group_start_at(start_location).nodes,
            };
            let index = self.effective_index(start_location);
            self.slots[index] = Slot::GroupStart(GroupStart {
                kind,
                slots: len,
                nodes,
            });
            nodes
        };

        let contributed = if kind == GroupKind::Node { 1 } else { count };
        self.node_count = self
            .node_count_stack
            .pop()
            .unwrap_or(Some(0))
            .map(|parent| parent + contributed);
        self.current_end = self.size() - self.end_stack.pop().unwrap_or_default();
        count
    }

    /// Skip the group at the cursor, returning the nodes it contributes.
    pub fn skip_group(&mut self) -> usize {
        assert!(self.insert_count == 0, "Cannot skip while inserting");
        assert!(self.empty_count == 0, "Cannot skip while in an empty region");
        let start = self.group_start_at(self.current);
        self.current += start.slots + 2;
        let count = start.contributed_nodes();
        self.node_count = self.node_count.map(|n| n + count);
        count
    }

    pub fn skip_node(&mut self) -> usize {
        self.skip_group()
    }

    /// Move the cursor to the end of the enclosing group and return its
    /// recorded node count. The running count becomes uncertain.
    pub fn skip_enclosing_group(&mut self) -> usize {
        assert!(self.insert_count == 0, "Cannot skip the enclosing group while inserting");
        assert!(self.empty_count == 0, "Cannot skip the enclosing group while in an empty region");
        assert!(
            self.reading_count > 0,
            "Can only skip the enclosing group in reading mode as the node counts are uncertain"
        );
        let start_location = match self.start_stack.last() {
            Some(location) => *location,
            None => panic!("No enclosing group to skip"),
        };
        let start = self.group_start_at(start_location);
        self.current = self.current_end;
        self.node_count = None;
        start.nodes
    }

    /// Skip to the end of the enclosing group, accumulating node counts as the
    /// remaining children are passed.
    pub fn skip_to_group_end(&mut self) {
        assert!(self.empty_count == 0, "Cannot skip while in an empty region");
        while self.current < self.current_end {
            if self.is_group() {
                self.skip_group();
            } else {
                self.current += 1;
            }
        }
    }

    pub fn report_uncertain_node_count(&mut self) {
        assert!(self.reading_count > 0, "Can only report an uncertain count while reading");
        self.node_count = None;
    }

    pub fn is_group(&self) -> bool {
        self.current < self.current_end && self.is_group_at(self.current)
    }

    pub fn is_group_at(&self, index: usize) -> bool {
        matches!(self.get(index), Some(Slot::GroupStart(_)))
    }

    pub fn is_node(&self) -> bool {
        self.current < self.current_end
            && matches!(self.get(self.current), Some(Slot::GroupStart(start)) if start.is_node())
    }

    pub fn is_memo_group(&self) -> bool {
        self.current < self.current_end
            && matches!(self.get(self.current), Some(Slot::GroupStart(start)) if start.is_memo())
    }

    /// Content slots of the group at the cursor.
    pub fn group_size(&self) -> usize {
        self.group_size_at(self.current)
    }

    pub fn group_size_at(&self, index: usize) -> usize {
        self.group_start_at(index).slots
    }

    pub fn is_group_end(&self) -> bool {
        self.empty_count > 0 || self.current >= self.current_end
    }

    /// Nodes passed so far in the open group, if still known.
    pub fn node_index(&self) -> Option<usize> {
        self.node_count
    }

    /// Depth of open groups.
    pub fn depth(&self) -> usize {
        self.start_stack.len()
    }

    /// Start locations of the open groups, outermost first.
    pub fn open_groups(&self) -> &[usize] {
        &self.start_stack
    }

    pub fn group_start_at(&self, index: usize) -> GroupStart {
        match self.get(index) {
            Some(Slot::GroupStart(start)) => *start,
            other => panic!("Expected a group start at {index}, found {other:?}"),
        }
    }

    /// Move the `offset`th item after the cursor to the cursor.
    pub fn move_item(&mut self, offset: usize) {
        assert!(self.reading_count == 0, "Cannot move while reading");
        assert!(self.insert_count == 0, "Cannot move an item while inserting");
        assert!(self.empty_count == 0, "Cannot move an item in an empty region");
        let old_current = self.current;
        let old_node_count = self.node_count;

        for _ in 0..offset {
            self.skip_item();
        }

        let move_location = self.current;
        self.skip_item();
        let move_len = self.current - move_location;

        // Open room at the destination, relocate the span, then drop the
        // vacated original.
        self.current = old_current;
        self.insert(move_len);
        let source = move_location + move_len;
        self.current = old_current;
        self.node_count = old_node_count;
        for i in 0..move_len {
            let from = self.effective_index(source + i);
            let to = self.effective_index(old_current + i);
            self.slots[to] = std::mem::take(&mut self.slots[from]);
        }
        let carried: Vec<(usize, usize)> = self
            .anchors
            .iter()
            .enumerate()
            .filter_map(|(id, entry)| match entry.location {
                Some(location) if (source..source + move_len).contains(&location) => {
                    Some((id, location - source))
                }
                _ => None,
            })
            .collect();
        // Detached so the removal of the vacated span does not free them.
        for (id, _) in &carried {
            self.anchors[*id].location = None;
        }
        self.remove(source, move_len);
        for (id, relative) in carried {
            self.anchors[id].location = Some(old_current + relative);
        }
    }

    /// Remove the item at the cursor: key, memos and group.
    pub fn remove_item(&mut self) {
        assert!(self.reading_count == 0, "Cannot remove while reading");
        assert!(self.insert_count == 0, "Cannot remove an item while inserting");
        assert!(self.empty_count == 0, "Cannot remove an item in an empty region");
        let old_current = self.current;
        let count = self.skip_item();
        self.remove(old_current, self.current - old_current);
        self.current = old_current;
        self.node_count = self.node_count.map(|n| n - count);
    }

    /// Skip the item at the cursor, returning the nodes it contributes.
    pub fn skip_item(&mut self) -> usize {
        assert!(self.insert_count == 0, "Cannot skip an item while inserting");
        assert!(self.empty_count == 0, "Cannot skip an item in an empty region");
        self.next();
        self.skip_memos();
        self.skip_group()
    }

    pub fn skip_memos(&mut self) {
        assert!(
            self.insert_count == 0 && self.empty_count == 0,
            "Cannot skip while inserting or in empty mode"
        );
        while self.is_memo_group() {
            self.skip_group();
        }
    }

    pub fn skip_memo(&mut self) {
        assert!(
            self.insert_count == 0 && self.empty_count == 0,
            "Cannot skip while inserting or in empty mode"
        );
        if self.is_memo_group() {
            self.skip_group();
        }
    }

    /// Describe the items from the cursor to the end of the enclosing group.
    /// The cursor is left where it was.
    pub fn extract_item_keys(&mut self) -> Vec<KeyInfo> {
        assert!(self.insert_count == 0, "Cannot extract keys while inserting");
        let mut result = Vec::new();
        if self.empty_count > 0 {
            return result;
        }
        let old_current = self.current;
        let old_node_count = self.node_count;
        while self.current < self.current_end {
            let location = self.current;
            let key = match self.next() {
                Some(Slot::Key(key)) => *key,
                other => panic!("Expected an item key at {location}, found {other:?}"),
            };
            self.skip_memos();
            let nodes = self.skip_group();
            result.push(KeyInfo::previous(key, location, nodes, result.len()));
        }
        self.current = old_current;
        self.node_count = old_node_count;
        result
    }

    /// Anchor the slot at `index`, reusing an existing anchor for it.
    pub fn anchor(&mut self, index: usize) -> Anchor {
        if let Some(id) = self
            .anchors
            .iter()
            .position(|entry| entry.location == Some(index))
        {
            return Anchor {
                id,
                generation: self.anchors[id].generation,
            };
        }
        let id = match self.free_anchors.pop() {
            Some(id) => {
                let entry = &mut self.anchors[id];
                entry.generation = entry.generation.wrapping_add(1);
                entry.location = Some(index);
                id
            }
            None => {
                self.anchors.push(AnchorEntry {
                    location: Some(index),
                    generation: 0,
                });
                self.anchors.len() - 1
            }
        };
        Anchor {
            id,
            generation: self.anchors[id].generation,
        }
    }

    /// Current location of `anchor`, or `None` once its slot was removed.
    pub fn anchor_location(&self, anchor: Anchor) -> Option<usize> {
        self.anchors
            .get(anchor.id)
            .filter(|entry| entry.generation == anchor.generation)
            .and_then(|entry| entry.location)
    }

    /// Number of anchors that still resolve.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len() - self.free_anchors.len()
    }

    pub fn debug_dump_all_slots(&self) -> Vec<(usize, String)> {
        (0..self.size())
            .filter_map(|index| self.get(index).map(|slot| (index, format!("{slot:?}"))))
            .collect()
    }

    fn move_gap_to(&mut self, index: usize) {
        if self.gap_len > 0 && self.gap_start != index {
            if index < self.gap_start {
                self.slots[index..self.gap_start + self.gap_len].rotate_right(self.gap_len);
            } else {
                self.slots[self.gap_start..index + self.gap_len].rotate_left(self.gap_len);
            }
        }
        self.gap_start = index;
    }

    fn insert(&mut self, size: usize) {
        if size == 0 {
            return;
        }
        self.move_gap_to(self.current);
        if self.gap_len < size {
            let old_size = self.slots.len();
            let new_gap_len = old_size
                .max(size)
                .max(self.min_growth.saturating_sub(old_size));
            let gap_end = self.gap_start + self.gap_len;
            let grow = new_gap_len - self.gap_len;
            self.slots
                .splice(gap_end..gap_end, std::iter::repeat_with(Slot::default).take(grow));
            self.gap_len = new_gap_len;
            log::trace!("slot table grew to {} slots", self.slots.len());
        }
        if self.current_end >= self.current {
            self.current_end += size;
        }
        for location in self.anchors.iter_mut().filter_map(|e| e.location.as_mut()) {
            if *location >= self.current {
                *location += size;
            }
        }
        self.gap_start += size;
        self.gap_len -= size;
    }

    pub(crate) fn remove(&mut self, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = start + len;
        self.move_gap_to(end);
        for slot in &mut self.slots[start..end] {
            *slot = Slot::Empty;
        }
        self.gap_start = start;
        self.gap_len += len;
        if self.current_end >= end {
            self.current_end -= len;
        }
        for (id, entry) in self.anchors.iter_mut().enumerate() {
            match entry.location {
                Some(loc) if loc >= end => entry.location = Some(loc - len),
                Some(loc) if loc >= start => {
                    entry.location = None;
                    self.free_anchors.push(id);
                }
                _ => {}
            }
        }
    }
}

impl fmt::Display for SlotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotTable(current={}, size={}, gap=", self.current, self.size())?;
        if self.gap_len > 0 {
            write!(f, "{}-{}", self.gap_start, self.gap_start + self.gap_len - 1)?;
        } else {
            f.write_str("none")?;
        }
        if self.is_reading() {
            f.write_str(", reading")?;
        }
        if self.is_inserting() {
            f.write_str(", inserting")?;
        }
        if self.in_empty() {
            f.write_str(", in empty")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
#[path = "tests/slot_table_tests.rs"]
mod tests;
