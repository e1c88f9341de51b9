//! Graph state: node instances + connections (spec §3 "Connection", "Graph state").

use crate::error::{Error, Result};
use crate::node::NodeInstance;
use crate::port::PortKind;
use crate::registry::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    pub id: String,
    pub source_node_id: String,
    pub source_port_id: String,
    pub target_node_id: String,
    pub target_port_id: String,
}

/// `{ nodes, connections }` — the caller's persisted/editor-facing snapshot.
/// The runtime owns a mutable working copy; callers may only observe it
/// through [`crate::runtime::Runtime::export_graph`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphState {
    pub nodes: Vec<NodeInstance>,
    pub connections: Vec<Connection>,
}

impl GraphState {
    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeInstance> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Validates every node type is registered, every connection endpoint
    /// exists, port types are resolvable, and no data input port has more
    /// than one incoming connection. Mirrors the checks `loadGraph` performs
    /// before accepting a graph (spec §6).
    pub fn validate(&self, registry: &NodeRegistry) -> Result<()> {
        let mut node_defs = HashMap::new();
        for node in &self.nodes {
            let def = registry
                .get(&node.node_type)
                .ok_or_else(|| Error::UnknownNodeType(node.node_type.clone()))?;
            node_defs.insert(node.id.clone(), def);
        }

        let mut seen_data_inputs: HashMap<(String, String), String> = HashMap::new();

        for conn in &self.connections {
            let source_def = node_defs.get(&conn.source_node_id).ok_or_else(|| Error::InvalidConnection {
                connection_id: conn.id.clone(),
                reason: format!("source node {} does not exist", conn.source_node_id),
            })?;
            let target_def = node_defs.get(&conn.target_node_id).ok_or_else(|| Error::InvalidConnection {
                connection_id: conn.id.clone(),
                reason: format!("target node {} does not exist", conn.target_node_id),
            })?;

            source_def.output_port(&conn.source_port_id).ok_or_else(|| Error::InvalidConnection {
                connection_id: conn.id.clone(),
                reason: format!("source port {} does not exist on {}", conn.source_port_id, conn.source_node_id),
            })?;
            let target_port = target_def.input_port(&conn.target_port_id).ok_or_else(|| Error::InvalidConnection {
                connection_id: conn.id.clone(),
                reason: format!("target port {} does not exist on {}", conn.target_port_id, conn.target_node_id),
            })?;

            if target_port.kind == PortKind::Data {
                let key = (conn.target_node_id.clone(), conn.target_port_id.clone());
                if let Some(existing) = seen_data_inputs.insert(key, conn.id.clone()) {
                    tracing::debug!(existing_connection = %existing, "duplicate data input");
                    return Err(Error::DuplicateDataInput {
                        node_id: conn.target_node_id.clone(),
                        port_id: conn.target_port_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Incoming data connections for a target node/port (kind filtered to `Data`).
    pub fn data_sources_for(&self, target_node: &str, target_port: &str, registry: &NodeRegistry) -> Option<&Connection> {
        self.connections.iter().find(|c| {
            c.target_node_id == target_node
                && c.target_port_id == target_port
                && self
                    .node(&c.target_node_id)
                    .and_then(|n| registry.get(&n.node_type))
                    .and_then(|d| d.input_port(target_port).cloned())
                    .map(|p| p.kind == PortKind::Data)
                    .unwrap_or(false)
        })
    }

    /// All incoming sink connections for a target node/port, in connection
    /// insertion order (fan-in order is otherwise unspecified by spec §3).
    pub fn sink_sources_for<'a>(&'a self, target_node: &str, target_port: &str) -> Vec<&'a Connection> {
        self.connections
            .iter()
            .filter(|c| c.target_node_id == target_node && c.target_port_id == target_port)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDefinition, NodeHooks};
    use crate::port::{Port, PortType};

    fn registry_with_number_and_math() -> NodeRegistry {
        let reg = NodeRegistry::new();
        reg.register(NodeDefinition {
            node_type: "number".into(),
            label: "Number".into(),
            category: "values".into(),
            inputs: vec![],
            outputs: vec![Port::data("value", "Value", PortType::Number)],
            config_schema: vec![],
            hooks: NodeHooks::default(),
        })
        .unwrap();
        reg.register(NodeDefinition {
            node_type: "math".into(),
            label: "Math".into(),
            category: "logic".into(),
            inputs: vec![Port::data("a", "A", PortType::Number), Port::data("b", "B", PortType::Number)],
            outputs: vec![Port::data("result", "Result", PortType::Number)],
            config_schema: vec![],
            hooks: NodeHooks::default(),
        })
        .unwrap();
        reg
    }

    #[test]
    fn rejects_unknown_node_type() {
        let reg = NodeRegistry::new();
        let state = GraphState { nodes: vec![NodeInstance::new("n1", "bogus")], connections: vec![] };
        assert!(matches!(state.validate(&reg), Err(Error::UnknownNodeType(_))));
    }

    #[test]
    fn rejects_duplicate_data_input() {
        let reg = registry_with_number_and_math();
        let state = GraphState {
            nodes: vec![
                NodeInstance::new("n1", "number"),
                NodeInstance::new("n2", "number"),
                NodeInstance::new("m", "math"),
            ],
            connections: vec![
                Connection { id: "c1".into(), source_node_id: "n1".into(), source_port_id: "value".into(), target_node_id: "m".into(), target_port_id: "a".into() },
                Connection { id: "c2".into(), source_node_id: "n2".into(), source_port_id: "value".into(), target_node_id: "m".into(), target_port_id: "a".into() },
            ],
        };
        assert!(matches!(state.validate(&reg), Err(Error::DuplicateDataInput { .. })));
    }

    #[test]
    fn accepts_well_formed_graph() {
        let reg = registry_with_number_and_math();
        let state = GraphState {
            nodes: vec![NodeInstance::new("n1", "number"), NodeInstance::new("m", "math")],
            connections: vec![Connection {
                id: "c1".into(),
                source_node_id: "n1".into(),
                source_port_id: "value".into(),
                target_node_id: "m".into(),
                target_port_id: "a".into(),
            }],
        };
        assert!(state.validate(&reg).is_ok());
    }
}
