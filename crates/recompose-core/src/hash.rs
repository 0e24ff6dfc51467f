//! Hasher used to derive call-site keys from arbitrary hashable values.

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    // fast branch, fixed seeds so keys are stable across compositions
    pub use ahash::AHasher as DefaultHasher;
    use std::hash::BuildHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        ahash::RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        )
        .build_hasher()
    }
}
