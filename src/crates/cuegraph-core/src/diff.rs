//! Structural change detection between two graph snapshots (spec §4.8).
//!
//! Feeds incremental adapters (editors, live-reload) without forcing them to
//! re-materialize the whole world on every edit.

use crate::graph::{Connection, GraphState};
use crate::node::{NodeInstance, Position};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GraphChange {
    AddNode { node: NodeInstance },
    RemoveNode { node_id: String },
    UpdateNodeType { node_id: String, node_type: String },
    UpdateNodePosition { node_id: String, position: Position },
    UpdateNodeConfig { node_id: String, config: HashMap<String, Value> },
    AddConnection { connection: Connection },
    RemoveConnection { connection_id: String },
}

/// Diff `prev` against `next`, emitting changes in a stable order: node
/// removals, node additions, node updates (by field), connection removals,
/// connection additions. `diffGraphState(prev, prev)` is always `[]`
/// (spec §8, invariant 7).
pub fn diff_graph_state(prev: &GraphState, next: &GraphState) -> Vec<GraphChange> {
    let mut changes = Vec::new();

    let prev_nodes: HashMap<&str, &NodeInstance> = prev.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let next_nodes: HashMap<&str, &NodeInstance> = next.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    for node in &prev.nodes {
        if !next_nodes.contains_key(node.id.as_str()) {
            changes.push(GraphChange::RemoveNode { node_id: node.id.clone() });
        }
    }

    for node in &next.nodes {
        if !prev_nodes.contains_key(node.id.as_str()) {
            changes.push(GraphChange::AddNode { node: node.clone() });
        }
    }

    for node in &next.nodes {
        if let Some(prev_node) = prev_nodes.get(node.id.as_str()) {
            if prev_node.node_type != node.node_type {
                changes.push(GraphChange::UpdateNodeType { node_id: node.id.clone(), node_type: node.node_type.clone() });
            }
            if prev_node.position != node.position {
                changes.push(GraphChange::UpdateNodePosition { node_id: node.id.clone(), position: node.position });
            }
            if stable_json(&prev_node.config) != stable_json(&node.config) {
                changes.push(GraphChange::UpdateNodeConfig { node_id: node.id.clone(), config: node.config.clone() });
            }
        }
    }

    let prev_conns: HashMap<&str, &Connection> = prev.connections.iter().map(|c| (c.id.as_str(), c)).collect();
    let next_conns: HashSet<&str> = next.connections.iter().map(|c| c.id.as_str()).collect();

    for conn in &prev.connections {
        if !next_conns.contains(conn.id.as_str()) {
            changes.push(GraphChange::RemoveConnection { connection_id: conn.id.clone() });
        }
    }

    for conn in &next.connections {
        if !prev_conns.contains_key(conn.id.as_str()) {
            changes.push(GraphChange::AddConnection { connection: conn.clone() });
        }
    }

    changes
}

fn stable_json(config: &HashMap<String, Value>) -> String {
    serde_json::to_value(config)
        .ok()
        .and_then(|v| serde_json::to_string(&v).ok())
        .unwrap_or_default()
}

/// Apply a sequence of changes to `state` in place — the inverse of
/// [`diff_graph_state`], used to validate the round-trip law in spec §8,
/// invariant 7.
pub fn apply_changes(state: &mut GraphState, changes: &[GraphChange]) {
    for change in changes {
        match change.clone() {
            GraphChange::AddNode { node } => state.nodes.push(node),
            GraphChange::RemoveNode { node_id } => state.nodes.retain(|n| n.id != node_id),
            GraphChange::UpdateNodeType { node_id, node_type } => {
                if let Some(n) = state.node_mut(&node_id) {
                    n.node_type = node_type;
                }
            }
            GraphChange::UpdateNodePosition { node_id, position } => {
                if let Some(n) = state.node_mut(&node_id) {
                    n.position = position;
                }
            }
            GraphChange::UpdateNodeConfig { node_id, config } => {
                if let Some(n) = state.node_mut(&node_id) {
                    n.config = config;
                }
            }
            GraphChange::AddConnection { connection } => state.connections.push(connection),
            GraphChange::RemoveConnection { connection_id } => state.connections.retain(|c| c.id != connection_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diffing_a_state_against_itself_is_empty() {
        let state = GraphState {
            nodes: vec![NodeInstance::new("n1", "number")],
            connections: vec![],
        };
        assert_eq!(diff_graph_state(&state, &state), vec![]);
    }

    #[test]
    fn scenario_s6_deterministic_graph_diff() {
        let mut n1 = NodeInstance::new("n1", "number");
        n1.config.insert("value".into(), Value::Number(1.0));
        let mut n2 = NodeInstance::new("n2", "number");
        n2.config.insert("value".into(), Value::Number(2.0));
        let prev = GraphState { nodes: vec![n1.clone(), n2.clone()], connections: vec![] };

        let mut n1_next = n1.clone();
        n1_next.position = Position { x: 10.0, y: 20.0 };
        let mut n2_next = n2.clone();
        n2_next.config.insert("value".into(), Value::Number(9.0));
        let n3 = NodeInstance::new("n3", "math");
        let conn = Connection { id: "c1".into(), source_node_id: "n1".into(), source_port_id: "value".into(), target_node_id: "n3".into(), target_port_id: "a".into() };
        let next = GraphState { nodes: vec![n1_next, n2_next, n3.clone()], connections: vec![conn.clone()] };

        let changes = diff_graph_state(&prev, &next);

        assert!(changes.contains(&GraphChange::UpdateNodePosition { node_id: "n1".into(), position: Position { x: 10.0, y: 20.0 } }));
        assert!(changes.iter().any(|c| matches!(c, GraphChange::UpdateNodeConfig { node_id, .. } if node_id == "n2")));
        assert!(changes.contains(&GraphChange::AddNode { node: n3 }));
        assert!(changes.contains(&GraphChange::AddConnection { connection: conn }));
        assert_eq!(changes.len(), 4);
    }

    #[test]
    fn applying_emitted_changes_reconstructs_next() {
        let prev = GraphState { nodes: vec![NodeInstance::new("n1", "number")], connections: vec![] };
        let mut next = prev.clone();
        next.nodes.push(NodeInstance::new("n2", "number"));
        let changes = diff_graph_state(&prev, &next);

        let mut applied = prev.clone();
        apply_changes(&mut applied, &changes);

        assert_eq!(applied.nodes.len(), next.nodes.len());
        assert_eq!(stable_json(&applied.nodes[1].config), stable_json(&next.nodes[1].config));
    }
}
