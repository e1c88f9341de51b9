//! Graph compilation: Kahn's topological sort over data edges only (spec §4.2).
//!
//! Sink edges are stripped before the sort runs — they're never part of the
//! compute DAG and are free to cycle (spec §3, §9 "Cyclic sink graphs").
//! Tie-breaking among nodes with equal in-degree uses insertion order
//! (`GraphState::nodes` order), which is what makes execution deterministic
//! across structurally-equivalent graphs (spec §8, invariant 2).

use crate::error::{Error, Result};
use crate::graph::GraphState;
use crate::node::NodeId;
use crate::port::PortKind;
use crate::registry::NodeRegistry;
use std::collections::{HashMap, HashSet, VecDeque};

/// Compute the linear execution order for `state`'s data edges.
pub fn compile(state: &GraphState, registry: &NodeRegistry) -> Result<Vec<NodeId>> {
    let order_index: HashMap<&str, usize> = state.nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();

    let mut in_degree: HashMap<&str, usize> = state.nodes.iter().map(|n| (n.id.as_str(), 0usize)).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = state.nodes.iter().map(|n| (n.id.as_str(), Vec::new())).collect();

    for conn in &state.connections {
        let is_data_edge = registry
            .get(&state.node(&conn.target_node_id).map(|n| n.node_type.clone()).unwrap_or_default())
            .and_then(|def| def.input_port(&conn.target_port_id).cloned())
            .map(|p| p.kind == PortKind::Data)
            .unwrap_or(false);

        if !is_data_edge {
            continue;
        }

        if let (Some(adj), Some(deg)) = (adjacency.get_mut(conn.source_node_id.as_str()), in_degree.get_mut(conn.target_node_id.as_str())) {
            adj.push(conn.target_node_id.as_str());
            *deg += 1;
        }
    }

    // Seed the queue with all zero-in-degree nodes, in insertion order.
    let mut ready: Vec<&str> = in_degree.iter().filter(|(_, &deg)| deg == 0).map(|(id, _)| *id).collect();
    ready.sort_by_key(|id| order_index.get(id).copied().unwrap_or(usize::MAX));
    let mut queue: VecDeque<&str> = ready.into();

    let mut order = Vec::with_capacity(state.nodes.len());
    let mut visited: HashSet<&str> = HashSet::new();

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        order.push(node.to_string());

        let mut newly_ready: Vec<&str> = Vec::new();
        if let Some(targets) = adjacency.get(node) {
            for &target in targets {
                if let Some(deg) = in_degree.get_mut(target) {
                    *deg -= 1;
                    if *deg == 0 {
                        newly_ready.push(target);
                    }
                }
            }
        }
        newly_ready.sort_by_key(|id| order_index.get(id).copied().unwrap_or(usize::MAX));
        for t in newly_ready {
            queue.push_back(t);
        }
    }

    if order.len() != state.nodes.len() {
        let residue: Vec<String> = state
            .nodes
            .iter()
            .map(|n| n.id.clone())
            .filter(|id| !visited.contains(id.as_str()))
            .collect();
        return Err(Error::Cycle { residue });
    }

    Ok(order)
}
