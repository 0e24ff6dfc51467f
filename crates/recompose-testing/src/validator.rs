//! Structural checks of a slot table and of the tree it describes.

use crate::mock_tree::MockNode;
use recompose_core::{GroupStart, Slot, SlotTable};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub location: usize,
    pub message: String,
}

impl ValidationError {
    fn new(location: usize, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check that every group is closed by its end marker, every key is followed
/// by optional memo groups and a group, and every recorded node count matches
/// the nodes of the group's children.
pub fn validate_slots(slots: &SlotTable) -> Result<(), ValidationError> {
    check_content(slots, 0, slots.size()).map(|_| ())
}

// Returns the nodes contributed by the content of `from..to`.
fn check_content(slots: &SlotTable, from: usize, to: usize) -> Result<usize, ValidationError> {
    let mut nodes = 0;
    let mut index = from;
    while index < to {
        match slots.get(index) {
            Some(Slot::Key(_)) => {
                check_item_group(slots, index + 1, to)?;
                index += 1;
            }
            Some(Slot::Value(_)) => index += 1,
            Some(Slot::GroupStart(start)) => {
                let start = *start;
                let end = index + start.slots + 1;
                if end >= to || !matches!(slots.get(end), Some(Slot::GroupEnd)) {
                    return Err(ValidationError::new(
                        index,
                        format!(
                            "{:?} group of {} slots has no end marker",
                            start.kind, start.slots
                        ),
                    ));
                }
                let content = check_content(slots, index + 1, end)?;
                if content != start.nodes {
                    return Err(ValidationError::new(
                        index,
                        format!("group records {} nodes but holds {content}", start.nodes),
                    ));
                }
                nodes += start.contributed_nodes();
                index = end + 1;
            }
            Some(Slot::GroupEnd) => {
                return Err(ValidationError::new(index, "group end without a start"))
            }
            Some(Slot::Empty) | None => {
                return Err(ValidationError::new(index, "empty slot inside the table"))
            }
        }
    }
    Ok(nodes)
}

fn check_item_group(slots: &SlotTable, mut index: usize, to: usize) -> Result<(), ValidationError> {
    let key_location = index - 1;
    loop {
        match group_at(slots, index, to) {
            Some(start) if start.is_memo() => index += start.slots + 2,
            Some(_) => return Ok(()),
            None => {
                return Err(ValidationError::new(
                    key_location,
                    "key is not followed by a group",
                ))
            }
        }
    }
}

fn group_at(slots: &SlotTable, index: usize, to: usize) -> Option<GroupStart> {
    if index < to {
        slots.get(index).and_then(Slot::as_group_start)
    } else {
        None
    }
}

/// Check that the nodes stored in the table are exactly the nodes of the tree
/// under `root`, in order and by identity.
pub fn validate_composition(slots: &SlotTable, root: &MockNode) -> Result<(), ValidationError> {
    validate_slots(slots)?;
    let mut top = Vec::new();
    collect_nodes(slots, 0, slots.size(), &mut top)?;
    compare_children(0, root, &top)
}

// Collects the nodes contributed by `from..to`, checking each node group's
// children on the way.
fn collect_nodes(
    slots: &SlotTable,
    from: usize,
    to: usize,
    out: &mut Vec<MockNode>,
) -> Result<(), ValidationError> {
    let mut index = from;
    while index < to {
        let Some(start) = slots.get(index).and_then(Slot::as_group_start) else {
            index += 1;
            continue;
        };
        let end = index + start.slots + 1;
        if start.is_node() {
            let node = slots
                .get(index + 1)
                .and_then(|slot| slot.as_value::<MockNode>())
                .cloned()
                .ok_or_else(|| ValidationError::new(index, "node group without a node"))?;
            let mut children = Vec::new();
            collect_nodes(slots, index + 2, end, &mut children)?;
            compare_children(index, &node, &children)?;
            out.push(node);
        } else {
            collect_nodes(slots, index + 1, end, out)?;
        }
        index = end + 1;
    }
    Ok(())
}

fn compare_children(
    location: usize,
    parent: &MockNode,
    expected: &[MockNode],
) -> Result<(), ValidationError> {
    let actual = parent.children();
    if actual.len() != expected.len() {
        return Err(ValidationError::new(
            location,
            format!(
                "{} has {} children but the table holds {}",
                parent.kind(),
                actual.len(),
                expected.len()
            ),
        ));
    }
    for (index, (actual, expected)) in actual.iter().zip(expected).enumerate() {
        if !actual.ptr_eq(expected) {
            return Err(ValidationError::new(
                location,
                format!(
                    "child {index} of {} is {:?}, the table holds {:?}",
                    parent.kind(),
                    actual,
                    expected
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/validator_tests.rs"]
mod tests;
