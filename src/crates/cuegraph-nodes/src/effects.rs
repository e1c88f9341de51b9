//! Visual effect chain nodes (spec §4.6 "Effects"): `effect-ascii`,
//! `effect-convolution`. Each reads an incoming `Effect[]` chain off its
//! `chain` input, appends its own [`cuegraph_core::value::Effect`] entry,
//! and passes the extended chain on — a renderer downstream applies them in
//! order, so fan-in order here is significant and left to however the
//! upstream graph wires it.

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::{Effect, Value};
use cuegraph_core::{NodeRegistry, Result};
use std::sync::Arc;

fn incoming_chain(inputs: &InputMap) -> Vec<Effect> {
    match inputs.get("chain") {
        Some(Value::Effects(chain)) => chain.clone(),
        _ => Vec::new(),
    }
}

fn effect_ascii_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "effect-ascii".into(),
        label: "ASCII Effect".into(),
        category: "effects".into(),
        inputs: vec![Port::data("chain", "Chain", PortType::Effect), Port::data("cellSize", "Cell Size", PortType::Number)],
        outputs: vec![Port::data("chain", "Chain", PortType::Effect)],
        config_schema: vec![ConfigField::new("cellSize", PortType::Number, Value::Number(8.0))],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let cell_size = inputs
                    .get("cellSize")
                    .filter(|v| !v.is_null())
                    .map(Value::as_number)
                    .unwrap_or_else(|| config.get("cellSize").map(Value::as_number).unwrap_or(8.0));
                let mut chain = incoming_chain(inputs);
                chain.push(Effect::Ascii { cell_size });
                let mut out = InputMap::new();
                out.insert("chain".into(), Value::Effects(chain));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn effect_convolution_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "effect-convolution".into(),
        label: "Convolution Effect".into(),
        category: "effects".into(),
        inputs: vec![Port::data("chain", "Chain", PortType::Effect)],
        outputs: vec![Port::data("chain", "Chain", PortType::Effect)],
        config_schema: vec![
            ConfigField::new("preset", PortType::String, Value::Str(String::new())),
            ConfigField::new("kernel", PortType::Array, Value::Null),
            ConfigField::new("mix", PortType::Number, Value::Number(1.0)),
            ConfigField::new("bias", PortType::Number, Value::Number(0.0)),
            ConfigField::new("normalize", PortType::Boolean, Value::Bool(true)),
            ConfigField::new("scale", PortType::Number, Value::Number(1.0)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let preset = config.get("preset").map(Value::as_str_lossy).unwrap_or_default();
                let preset = if preset.is_empty() { None } else { Some(preset) };

                let kernel = config.get("kernel").and_then(Value::as_array).and_then(|items| {
                    if items.len() == 9 {
                        let mut out = [0.0f64; 9];
                        for (slot, item) in out.iter_mut().zip(items.iter()) {
                            *slot = item.as_number();
                        }
                        Some(out)
                    } else {
                        None
                    }
                });

                let mix = config.get("mix").map(Value::as_number).unwrap_or(1.0);
                let bias = config.get("bias").map(Value::as_number).unwrap_or(0.0);
                let normalize = config.get("normalize").map(Value::as_bool).unwrap_or(true);
                let scale = config.get("scale").map(Value::as_number).unwrap_or(1.0);

                let mut chain = incoming_chain(inputs);
                chain.push(Effect::Convolution { preset, kernel, mix, bias, normalize, scale });
                let mut out = InputMap::new();
                out.insert("chain".into(), Value::Effects(chain));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(effect_ascii_def())?;
    registry.register(effect_convolution_def())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuegraph_core::node::ProcessContext;

    fn ctx() -> ProcessContext {
        ProcessContext { node_id_hash: 1, time_ms: 0, delta_time_ms: 0 }
    }

    #[test]
    fn ascii_appends_to_empty_chain_using_config_default() {
        let def = effect_ascii_def();
        let out = (def.hooks.process.as_ref().unwrap())(&InputMap::new(), &def.default_config(), &ctx()).unwrap();
        match out.get("chain") {
            Some(Value::Effects(chain)) => assert_eq!(chain, &vec![Effect::Ascii { cell_size: 8.0 }]),
            other => panic!("expected Effects, got {other:?}"),
        }
    }

    #[test]
    fn convolution_preserves_upstream_chain_order() {
        let def = effect_convolution_def();
        let mut inputs = InputMap::new();
        inputs.insert("chain".into(), Value::Effects(vec![Effect::Ascii { cell_size: 4.0 }]));
        let out = (def.hooks.process.as_ref().unwrap())(&inputs, &def.default_config(), &ctx()).unwrap();
        match out.get("chain") {
            Some(Value::Effects(chain)) => {
                assert_eq!(chain.len(), 2);
                assert_eq!(chain[0], Effect::Ascii { cell_size: 4.0 });
                assert!(matches!(chain[1], Effect::Convolution { .. }));
            }
            other => panic!("expected Effects, got {other:?}"),
        }
    }
}
