//! Built-in node catalog (spec §4.6): about 60 definitions grouped by
//! category, each a `NodeDefinition` registered into a `NodeRegistry`.
//!
//! Nodes that need to remember something across ticks (`for`, `sleep`,
//! `number-stabilizer`, `number-script`, `proc-push-image-upload`,
//! `proc-show-image`) can't close over plain fields — one `NodeDefinition`
//! backs every instance of that node *type*, so its `process` closure is
//! shared across every node id using it. Those nodes instead keep a
//! `DashMap<u64, State>` inside the closure, keyed by
//! `ProcessContext::node_id_hash`, matching the hashing `cuegraph-core`
//! already uses to seed per-node determinism.

pub mod control_flow;
pub mod display;
pub mod effects;
pub mod generators;
pub mod logic;
pub mod midi;
pub mod processors;
pub mod selection;
pub mod values;

use cuegraph_core::{NodeRegistry, Result};
pub use selection::NodeHostCallbacks;

/// Registers every built-in node definition with no-op host callbacks
/// (`client-count`/`client-object`/`proc-client-sensors` report zero
/// clients). Suitable for tests and for graphs that don't touch those
/// nodes; a real host should call [`register_builtin_nodes_with_host`].
pub fn register_builtin_nodes(registry: &NodeRegistry) -> Result<()> {
    register_shared(registry)?;
    selection::register(registry)?;
    Ok(())
}

/// Same as [`register_builtin_nodes`], but wires the selection-category
/// nodes to a real host (live client list, sensor snapshots).
pub fn register_builtin_nodes_with_host(registry: &NodeRegistry, host: NodeHostCallbacks) -> Result<()> {
    register_shared(registry)?;
    selection::register_with_host(registry, host)?;
    Ok(())
}

/// Idempotent only in the sense that calling it twice against the same
/// registry fails on the second call's first duplicate — callers own one
/// registry per process.
fn register_shared(registry: &NodeRegistry) -> Result<()> {
    values::register(registry)?;
    display::register(registry)?;
    logic::register(registry)?;
    control_flow::register(registry)?;
    generators::register(registry)?;
    midi::register(registry)?;
    processors::register(registry)?;
    effects::register(registry)?;
    Ok(())
}
