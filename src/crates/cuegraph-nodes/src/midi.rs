//! MIDI-sourced value shaping (spec §4.6 "MIDI"). The actual MIDI learn /
//! routing machinery is host-side (out of core's scope); these nodes only
//! shape the normalized `0..1` "fuzzy" value the host already resolved for
//! a learned source into something a processor can consume.

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::{Rgb, Value};
use cuegraph_core::{NodeRegistry, Result};
use std::sync::Arc;

fn parse_hex_color(s: &str) -> Rgb {
    let s = s.trim_start_matches('#');
    let component = |offset: usize| u8::from_str_radix(s.get(offset..offset + 2).unwrap_or("00"), 16).unwrap_or(0);
    if s.len() >= 6 { Rgb { r: component(0), g: component(2), b: component(4) } } else { Rgb { r: 0, g: 0, b: 0 } }
}

fn midi_fuzzy_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "midi-fuzzy".into(),
        label: "MIDI Fuzzy".into(),
        category: "midi".into(),
        inputs: vec![Port::data("in", "In", PortType::Fuzzy)],
        outputs: vec![Port::data("value", "Value", PortType::Number)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, _config, _ctx| {
                let value = inputs.get("in").map(Value::as_number).unwrap_or(0.0).clamp(0.0, 1.0);
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Number(value));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn midi_boolean_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "midi-boolean".into(),
        label: "MIDI Boolean".into(),
        category: "midi".into(),
        inputs: vec![Port::data("in", "In", PortType::Fuzzy)],
        outputs: vec![Port::data("value", "Value", PortType::Boolean)],
        config_schema: vec![ConfigField::new("threshold", PortType::Number, Value::Number(0.5))],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let value = inputs.get("in").map(Value::as_number).unwrap_or(0.0);
                let threshold = config.get("threshold").map(Value::as_number).unwrap_or(0.5);
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Bool(value >= threshold));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn midi_map_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "midi-map".into(),
        label: "MIDI Map".into(),
        category: "midi".into(),
        inputs: vec![Port::data("in", "In", PortType::Fuzzy)],
        outputs: vec![Port::data("value", "Value", PortType::Number)],
        config_schema: vec![
            ConfigField::new("outMin", PortType::Number, Value::Number(0.0)),
            ConfigField::new("outMax", PortType::Number, Value::Number(1.0)),
            ConfigField::new("invert", PortType::Boolean, Value::Bool(false)),
            ConfigField::new("round", PortType::Boolean, Value::Bool(false)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let mut t = inputs.get("in").map(Value::as_number).unwrap_or(0.0).clamp(0.0, 1.0);
                if config.get("invert").map(Value::as_bool).unwrap_or(false) {
                    t = 1.0 - t;
                }
                let out_min = config.get("outMin").map(Value::as_number).unwrap_or(0.0);
                let out_max = config.get("outMax").map(Value::as_number).unwrap_or(1.0);
                let mut value = out_min + t * (out_max - out_min);
                if config.get("round").map(Value::as_bool).unwrap_or(false) {
                    value = value.round();
                }
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Number(value));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn midi_color_map_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "midi-color-map".into(),
        label: "MIDI Color Map".into(),
        category: "midi".into(),
        inputs: vec![Port::data("in", "In", PortType::Fuzzy)],
        outputs: vec![Port::data("value", "Value", PortType::Color)],
        config_schema: vec![
            ConfigField::new("colorA", PortType::String, Value::Str("#000000".into())),
            ConfigField::new("colorB", PortType::String, Value::Str("#ffffff".into())),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let t = inputs.get("in").map(Value::as_number).unwrap_or(0.0).clamp(0.0, 1.0);
                let a = parse_hex_color(&config.get("colorA").map(Value::as_str_lossy).unwrap_or_else(|| "#000000".into()));
                let b = parse_hex_color(&config.get("colorB").map(Value::as_str_lossy).unwrap_or_else(|| "#ffffff".into()));
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Color(Rgb::lerp(a, b, t)));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn midi_select_map_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "midi-select-map".into(),
        label: "MIDI Select Map".into(),
        category: "midi".into(),
        inputs: vec![Port::data("in", "In", PortType::Fuzzy)],
        outputs: vec![Port::data("value", "Value", PortType::Any)],
        config_schema: vec![ConfigField::new("options", PortType::Array, Value::Array(vec![]))],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let t = inputs.get("in").map(Value::as_number).unwrap_or(0.0).clamp(0.0, 0.999_999);
                let options = config.get("options").and_then(Value::as_array).map(|s| s.to_vec()).unwrap_or_default();
                let mut out = InputMap::new();
                let value = if options.is_empty() {
                    Value::Null
                } else {
                    let index = (t * options.len() as f64).floor() as usize;
                    options[index.min(options.len() - 1)].clone()
                };
                out.insert("value".into(), value);
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(midi_fuzzy_def())?;
    registry.register(midi_boolean_def())?;
    registry.register(midi_map_def())?;
    registry.register(midi_color_map_def())?;
    registry.register(midi_select_map_def())?;
    Ok(())
}
