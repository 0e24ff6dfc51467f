//! Positional memoization engine: a gap-buffer slot table replayed by a
//! composer that emits minimal edits to an external node tree.

mod applier;
mod changes;
pub mod collections;
mod composer;
mod composition;
mod error;
pub mod hash;
mod invalidation;
mod pending;
mod slot_table;

pub use applier::{Applier, ApplierAdapter};
pub use composer::Composer;
pub use composition::{ComposerOptions, Composition, DuplicateKeyPolicy, Recomposable};
pub use error::ApplierError;
pub use invalidation::RecomposeTrigger;
pub use pending::KeyInfo;
pub use slot_table::{Anchor, GroupKind, GroupStart, Slot, SlotTable};

use std::hash::{Hash, Hasher};

/// Opaque identity of a call site or keyed group among its siblings.
pub type Key = u64;

/// Key of a source location. Stable across runs of the same build.
pub fn location_key(file: &str, line: u32, column: u32) -> Key {
    hash_key(&file)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15) // cheap mix
        ^ ((line as u64) << 32)
        ^ (column as u64)
}

pub fn hash_key<K: Hash>(key: &K) -> Key {
    let mut hasher = hash::default::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Combine two key fragments, e.g. a call site and a user supplied key.
/// Not commutative.
pub fn join_key(left: Key, right: Key) -> Key {
    left.rotate_left(5).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ right
}

/// Key of the call site of the macro invocation.
#[macro_export]
macro_rules! location_key {
    () => {
        $crate::location_key(file!(), line!(), column!())
    };
}

#[cfg(test)]
#[path = "tests/test_tree.rs"]
pub(crate) mod test_tree;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
