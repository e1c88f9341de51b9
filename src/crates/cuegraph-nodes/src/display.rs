//! Display nodes (spec §4.6 "Display"): `show-anything` previews a value,
//! `note` is a purely ornamental label with no data flow at all.

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::Value;
use cuegraph_core::{NodeRegistry, Result};
use std::sync::Arc;

const PREVIEW_MAX_LEN: usize = 120;

fn preview(value: &Value) -> String {
    let text = value.as_str_lossy();
    let mut single_line: String = text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect();
    if single_line.chars().count() > PREVIEW_MAX_LEN {
        single_line = single_line.chars().take(PREVIEW_MAX_LEN - 1).collect::<String>() + "…";
    }
    single_line
}

fn show_anything_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "show-anything".into(),
        label: "Show Anything".into(),
        category: "display".into(),
        inputs: vec![Port::data("in", "In", PortType::Any)],
        outputs: vec![Port::data("preview", "Preview", PortType::String)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, _config, _ctx| {
                let value = inputs.get("in").cloned().unwrap_or(Value::Null);
                let mut out = InputMap::new();
                out.insert("preview".into(), Value::Str(preview(&value)));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn note_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "note".into(),
        label: "Note".into(),
        category: "display".into(),
        inputs: vec![],
        outputs: vec![],
        config_schema: vec![ConfigField::new("text", PortType::String, Value::Str(String::new()))],
        hooks: NodeHooks::default(),
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(show_anything_def())?;
    registry.register(note_def())?;
    Ok(())
}
