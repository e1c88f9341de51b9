//! Hybrid constant/pass-through nodes (spec §4.6 "Values"): forward `in`
//! when it's wired, fall back to the node's own `value` config otherwise.
//!
//! `process` only sees resolved values, not wiring — a port left
//! unconnected resolves to [`cuegraph_core::value::Value::Null`] (see
//! `Runtime::resolve_inputs`), so "connected" is read here as "resolved to
//! something other than null".

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::Value;
use cuegraph_core::{NodeRegistry, Result};
use std::sync::Arc;

fn hybrid_def(node_type: &str, label: &str, port_type: PortType, default: Value) -> NodeDefinition {
    NodeDefinition {
        node_type: node_type.into(),
        label: label.into(),
        category: "values".into(),
        inputs: vec![Port::data("in", "In", port_type)],
        outputs: vec![Port::data("value", "Value", port_type)],
        config_schema: vec![ConfigField::new("value", port_type, default)],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let incoming = inputs.get("in").cloned().unwrap_or(Value::Null);
                let value = if incoming.is_null() { config.get("value").cloned().unwrap_or(Value::Null) } else { incoming };
                let mut out = InputMap::new();
                out.insert("value".into(), value);
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(hybrid_def("number", "Number", PortType::Number, Value::Number(0.0)))?;
    registry.register(hybrid_def("string", "String", PortType::String, Value::Str(String::new())))?;
    registry.register(hybrid_def("bool", "Boolean", PortType::Boolean, Value::Bool(false)))?;
    Ok(())
}
