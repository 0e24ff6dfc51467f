//! Hash containers used by reconciliation bookkeeping.
//!
//! The fast Fx hasher is used by default; the `std-hash` feature switches to
//! the SipHash-backed standard maps for hostile key distributions.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::hash_map::Entry;
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
    pub use std::collections::hash_map::Entry;
}

/// Multimap from a key to the values recorded under it, in insertion order.
pub type MultiMap<K, V> = map::HashMap<K, smallvec::SmallVec<[V; 1]>>;
