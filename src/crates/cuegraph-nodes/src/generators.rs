//! `lfo` — a free-running low-frequency oscillator (spec §4.6 "Generators").
//! Time-driven (reads `ProcessContext::time_ms`), not `deltaTime`-integrated,
//! so two LFOs with the same config and the same wall clock always agree —
//! this is what scenario S1 checks at the 1-second mark.

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::Value;
use cuegraph_core::{NodeRegistry, Result};
use std::sync::Arc;

fn wave(waveform: &str, phase_cycles: f64) -> f64 {
    let frac = phase_cycles.rem_euclid(1.0);
    match waveform {
        "square" => if frac < 0.5 { 1.0 } else { 0.0 },
        "triangle" => 1.0 - (2.0 * frac - 1.0).abs(),
        "sawtooth" => frac,
        _ => (frac * std::f64::consts::TAU).sin() * 0.5 + 0.5,
    }
}

fn lfo_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "lfo".into(),
        label: "LFO".into(),
        category: "generators".into(),
        inputs: vec![],
        outputs: vec![Port::data("value", "Value", PortType::Number)],
        config_schema: vec![
            ConfigField::new("waveform", PortType::String, Value::Str("sine".into())),
            ConfigField::new("frequency", PortType::Number, Value::Number(1.0)),
            ConfigField::new("amplitude", PortType::Number, Value::Number(1.0)),
            ConfigField::new("offset", PortType::Number, Value::Number(0.0)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|_inputs, config, ctx| {
                let waveform = config.get("waveform").map(Value::as_str_lossy).unwrap_or_else(|| "sine".into());
                let freq = config.get("frequency").map(Value::as_number).unwrap_or(1.0);
                let amplitude = config.get("amplitude").map(Value::as_number).unwrap_or(1.0);
                let offset = config.get("offset").map(Value::as_number).unwrap_or(0.0);
                let phase_cycles = (ctx.time_ms as f64 / 1000.0) * freq;
                let value = wave(&waveform, phase_cycles) * amplitude + offset;
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Number(value));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(lfo_def())?;
    Ok(())
}
