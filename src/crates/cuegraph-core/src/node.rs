//! Node contract: definitions (immutable metadata + hooks) and instances
//! (the mutable, per-graph state the runtime owns) — spec §3, §4.6.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub type NodeId = String;

/// A single config field in a node's schema (spec §3 "Node definition").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    pub key: String,
    pub field_type: crate::port::PortType,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl ConfigField {
    pub fn new(key: &str, field_type: crate::port::PortType, default: Value) -> Self {
        ConfigField { key: key.to_string(), field_type, default, options: None, min: None, max: None, step: None }
    }
}

/// Per-tick context passed to every hook (spec §3 "Process context").
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub node_id_hash: u64,
    pub time_ms: i64,
    pub delta_time_ms: i64,
}

/// Resolved input map passed into a hook: port id -> value.
pub type InputMap = HashMap<String, Value>;
/// Resolved config map: config key -> value.
pub type ConfigMap = HashMap<String, Value>;
/// Output map produced by `process`.
pub type OutputMap = HashMap<String, Value>;

/// Side effects requested by `onSink`/`onDisable`: commands addressed to
/// clients, to be handed to the host's command dispatcher.
#[derive(Debug, Clone, Default)]
pub struct SinkEffects {
    pub commands: Vec<(crate::command::Target, crate::value::Cmd)>,
}

impl SinkEffects {
    pub fn push(&mut self, target: crate::command::Target, cmd: crate::value::Cmd) {
        self.commands.push((target, cmd));
    }
}

/// Hooks return `Result` rather than panicking — the runtime's "try/catch"
/// (spec §4.3, §7 `NodeHookException`) is modeled as a logical error a node
/// reports, not as Rust panic recovery: node authors are expected to write
/// total functions, and a caught `Err` gets logged with empty outputs for
/// that tick while the runtime keeps ticking.
pub type ProcessFn = Arc<dyn Fn(&InputMap, &ConfigMap, &ProcessContext) -> Result<OutputMap, String> + Send + Sync>;
pub type SinkFn = Arc<dyn Fn(&InputMap, &ConfigMap, &ProcessContext) -> Result<SinkEffects, String> + Send + Sync>;
pub type DisableFn = Arc<dyn Fn(&InputMap, &ConfigMap, &ProcessContext) -> Result<SinkEffects, String> + Send + Sync>;

/// Optional lifecycle hooks a node definition may implement (spec §3).
#[derive(Clone, Default)]
pub struct NodeHooks {
    pub process: Option<ProcessFn>,
    pub on_sink: Option<SinkFn>,
    pub on_disable: Option<DisableFn>,
}

impl std::fmt::Debug for NodeHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHooks")
            .field("process", &self.process.is_some())
            .field("on_sink", &self.on_sink.is_some())
            .field("on_disable", &self.on_disable.is_some())
            .finish()
    }
}

/// Immutable metadata for one node *type* (spec §3 "Node definition").
#[derive(Clone, Debug)]
pub struct NodeDefinition {
    pub node_type: String,
    pub label: String,
    pub category: String,
    pub inputs: Vec<crate::port::Port>,
    pub outputs: Vec<crate::port::Port>,
    pub config_schema: Vec<ConfigField>,
    pub hooks: NodeHooks,
}

impl NodeDefinition {
    pub fn default_config(&self) -> ConfigMap {
        self.config_schema
            .iter()
            .map(|f| (f.key.clone(), f.default.clone()))
            .collect()
    }

    pub fn input_port(&self, id: &str) -> Option<&crate::port::Port> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output_port(&self, id: &str) -> Option<&crate::port::Port> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// Position on the editor canvas. Carried through but never interpreted by
/// the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node instance within a [`crate::graph::GraphState`] (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default)]
    pub input_values: HashMap<String, Value>,
    #[serde(default)]
    pub output_values: HashMap<String, Value>,
}

impl NodeInstance {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        NodeInstance {
            id: id.into(),
            node_type: node_type.into(),
            position: Position::default(),
            config: HashMap::new(),
            input_values: HashMap::new(),
            output_values: HashMap::new(),
        }
    }
}
