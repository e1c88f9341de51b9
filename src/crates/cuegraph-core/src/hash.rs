//! Deterministic string hashing shared by the process context (`nodeIdHash`)
//! and client selection's seeded PRNG (spec §4.7, §9 "Deterministic random").
//!
//! `HashMap`'s *default* hashing (`RandomState`) is seeded randomly per
//! process — unsuitable here, since `nodeIdHash` must reproduce across runs.
//! `std::collections::hash_map::DefaultHasher::new()` has no such seed, so a
//! fixed-key `DefaultHasher` is deterministic and stable across runs.

use std::hash::{Hash, Hasher};

/// Stable across runs (not across platforms/Rust versions — `DefaultHasher`
/// gives no such guarantee, and none is needed within a single process).
pub fn stable_hash(s: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}
