//! Deterministic client selection (spec §4.7).
//!
//! `index`/`range` address a window into the connected-client list; `random`
//! swaps the identity ordering for a permutation seeded by `hash(nodeId)` so
//! repeated ticks with unchanged inputs repeat the same selection — the
//! "deterministic random" rule in spec §9.

use cuegraph_core::hash::stable_hash;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub selected_ids: Vec<String>,
}

/// Inputs carried on `client-object`'s `{index, range, random}` ports,
/// already coerced to host types by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionInputs {
    pub index: Option<i64>,
    pub range: Option<i64>,
    pub random: bool,
}

fn clamp_1_based(value: Option<i64>, n: usize) -> usize {
    let n = n.max(1);
    match value {
        Some(v) if v >= 1 => (v as usize).min(n),
        _ => 1,
    }
}

fn clamp_count(value: Option<i64>, n: usize) -> usize {
    let n = n.max(1);
    match value {
        Some(v) if v >= 1 => (v as usize).min(n),
        _ => 1,
    }
}

/// Deterministic permutation of `clients`, seeded by `hash(nodeId)`. Used
/// only when `random=true`; the identity ordering is used otherwise.
fn deterministic_permutation(seed: u64, clients: &[String]) -> Vec<String> {
    let mut permuted = clients.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    permuted.shuffle(&mut rng);
    permuted
}

/// Selects a subset of `clients` for `node_id` given `{index, range, random}`.
/// `clients` must already be the ordered list of currently connected ids
/// (see [`crate::registry::ConnectionRegistry::connected_client_ids`]);
/// re-evaluate every tick so reconnects join mid-graph.
pub fn select_client_ids_for_node(node_id: &str, clients: &[String], inputs: SelectionInputs) -> Selection {
    select_client_ids_with_seed(stable_hash(node_id), clients, inputs)
}

/// Same as [`select_client_ids_for_node`] but takes an already-computed
/// seed — callers that already carry `ProcessContext::node_id_hash` (every
/// node hook does) should use this directly rather than re-hashing the id.
pub fn select_client_ids_with_seed(seed: u64, clients: &[String], inputs: SelectionInputs) -> Selection {
    if clients.is_empty() {
        return Selection { index: 1, selected_ids: Vec::new() };
    }

    let n = clients.len();
    let index = clamp_1_based(inputs.index, n);
    let range = clamp_count(inputs.range, n);

    let pool = if inputs.random { deterministic_permutation(seed, clients) } else { clients.to_vec() };

    let start = index - 1;
    let selected_ids = (0..range).map(|offset| pool[(start + offset) % n].clone()).collect();

    Selection { index, selected_ids }
}
