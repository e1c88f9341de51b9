//! Processors (spec §4.6 "Processors"): build `ControlMessage` payloads
//! deterministically from inputs+config.
//!
//! Most of these are plain per-tick functions — the runtime's own sink
//! diffing (`Runtime::diff_commands`, the sink-state fingerprint) already
//! collapses an unchanging payload into the single delivery a live client
//! needs, so "send a one-shot off" falls out of emitting the same off
//! payload every tick rather than requiring the node to track a
//! previous-active flag itself. `proc-push-image-upload` is the one
//! processor that genuinely needs memory (a rate limit and a counter), so
//! it keeps a `DashMap<u64, _>` like the control-flow nodes do.

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::{Cmd, Value};
use cuegraph_core::{NodeRegistry, Result};
use dashmap::DashMap;
use std::sync::Arc;

fn proc_flashlight_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "proc-flashlight".into(),
        label: "Flashlight".into(),
        category: "processors".into(),
        inputs: vec![Port::data("frequencyHz", "Frequency Hz", PortType::Number)],
        outputs: vec![Port::sink("cmd", "Cmd", PortType::Command)],
        config_schema: vec![
            ConfigField::new("active", PortType::Boolean, Value::Bool(true)),
            ConfigField::new("mode", PortType::String, Value::Str("blink".into())),
            ConfigField::new("dutyCycle", PortType::Number, Value::Number(0.5)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let active = config.get("active").map(Value::as_bool).unwrap_or(true);
                let payload = if active {
                    let mode = config.get("mode").map(Value::as_str_lossy).unwrap_or_else(|| "blink".into());
                    let frequency = inputs.get("frequencyHz").map(Value::as_number).unwrap_or(0.0);
                    let duty_cycle = config.get("dutyCycle").map(Value::as_number).unwrap_or(0.5);
                    serde_json::json!({ "mode": mode, "frequency": frequency, "dutyCycle": duty_cycle })
                } else {
                    serde_json::json!({ "mode": "off" })
                };
                let mut out = InputMap::new();
                out.insert("cmd".into(), Value::Command(Cmd { action: "flashlight".into(), payload, execute_at: None }));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn proc_screen_color_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "proc-screen-color".into(),
        label: "Screen Color".into(),
        category: "processors".into(),
        inputs: vec![],
        outputs: vec![Port::sink("cmd", "Cmd", PortType::Command)],
        config_schema: vec![
            ConfigField::new("active", PortType::Boolean, Value::Bool(true)),
            ConfigField::new("color", PortType::String, Value::Str("#ffffff".into())),
            ConfigField::new("secondaryColor", PortType::String, Value::Str(String::new())),
            ConfigField::new("mode", PortType::String, Value::Str("solid".into())),
            ConfigField::new("waveform", PortType::String, Value::Str(String::new())),
            ConfigField::new("opacity", PortType::Number, Value::Number(1.0)),
            ConfigField::new("minOpacity", PortType::Number, Value::Number(0.0)),
            ConfigField::new("maxOpacity", PortType::Number, Value::Number(1.0)),
            ConfigField::new("frequencyHz", PortType::Number, Value::Number(1.0)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|_inputs, config, _ctx| {
                let active = config.get("active").map(Value::as_bool).unwrap_or(true);
                let get_str = |key: &str| config.get(key).map(Value::as_str_lossy).unwrap_or_default();
                let get_num = |key: &str, default: f64| config.get(key).map(Value::as_number).unwrap_or(default);
                let payload = if active {
                    let mut payload = serde_json::json!({
                        "color": get_str("color"),
                        "opacity": get_num("opacity", 1.0),
                        "minOpacity": get_num("minOpacity", 0.0),
                        "maxOpacity": get_num("maxOpacity", 1.0),
                        "mode": get_str("mode"),
                    });
                    let secondary = get_str("secondaryColor");
                    if !secondary.is_empty() {
                        payload["secondaryColor"] = serde_json::Value::String(secondary);
                    }
                    let waveform = get_str("waveform");
                    if !waveform.is_empty() {
                        payload["waveform"] = serde_json::Value::String(waveform);
                        payload["frequencyHz"] = serde_json::json!(get_num("frequencyHz", 1.0));
                    }
                    payload
                } else {
                    serde_json::json!({ "color": "#000000", "opacity": 1.0, "minOpacity": 1.0, "maxOpacity": 1.0, "mode": "solid" })
                };
                let mut out = InputMap::new();
                out.insert("cmd".into(), Value::Command(Cmd { action: "screenColor".into(), payload, execute_at: None }));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn proc_synth_update_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "proc-synth-update".into(),
        label: "Synth Update".into(),
        category: "processors".into(),
        inputs: vec![Port::data("frequency", "Frequency", PortType::Number), Port::data("volume", "Volume", PortType::Number)],
        outputs: vec![Port::sink("cmd", "Cmd", PortType::Command)],
        config_schema: vec![
            ConfigField::new("active", PortType::Boolean, Value::Bool(true)),
            ConfigField::new("waveform", PortType::String, Value::Str("sine".into())),
            ConfigField::new("modFrequency", PortType::Number, Value::Number(0.0)),
            ConfigField::new("modDepth", PortType::Number, Value::Number(0.0)),
            ConfigField::new("durationMs", PortType::Number, Value::Number(0.0)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let active = config.get("active").map(Value::as_bool).unwrap_or(true);
                let payload = if active {
                    let frequency = inputs.get("frequency").map(Value::as_number).unwrap_or(440.0);
                    let volume = inputs.get("volume").map(Value::as_number).unwrap_or(1.0).clamp(0.0, 1.0);
                    let waveform = config.get("waveform").map(Value::as_str_lossy).unwrap_or_else(|| "sine".into());
                    let mod_frequency = config.get("modFrequency").map(Value::as_number).unwrap_or(0.0);
                    let mod_depth = config.get("modDepth").map(Value::as_number).unwrap_or(0.0);
                    let duration_ms = config.get("durationMs").map(Value::as_number).unwrap_or(0.0);
                    serde_json::json!({
                        "frequency": frequency,
                        "volume": volume,
                        "waveform": waveform,
                        "modFrequency": mod_frequency,
                        "modDepth": mod_depth,
                        "durationMs": duration_ms,
                    })
                } else {
                    serde_json::json!({ "frequency": 0.0, "volume": 0.0, "waveform": "sine", "durationMs": 0.0 })
                };
                let mut out = InputMap::new();
                out.insert("cmd".into(), Value::Command(Cmd { action: "synthUpdate".into(), payload, execute_at: None }));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn proc_push_image_upload_def() -> NodeDefinition {
    struct UploadState {
        last_emit_time: Option<i64>,
        seq: u64,
    }
    let states: Arc<DashMap<u64, UploadState>> = Arc::new(DashMap::new());

    NodeDefinition {
        node_type: "proc-push-image-upload".into(),
        label: "Push Image Upload".into(),
        category: "processors".into(),
        inputs: vec![Port::data("trigger", "Trigger", PortType::Boolean)],
        outputs: vec![Port::sink("cmd", "Cmd", PortType::Command)],
        config_schema: vec![ConfigField::new("speed", PortType::Number, Value::Number(1.0))],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, config, ctx| {
                let trigger = inputs.get("trigger").map(Value::as_bool).unwrap_or(false);
                let speed = config.get("speed").map(Value::as_number).unwrap_or(1.0).max(0.001);
                let interval_ms = (1000.0 / speed) as i64;

                let mut out = InputMap::new();
                if !trigger {
                    return Ok(out);
                }

                let mut entry = states.entry(ctx.node_id_hash).or_insert(UploadState { last_emit_time: None, seq: 0 });
                let ready = entry.last_emit_time.map(|t| ctx.time_ms - t >= interval_ms).unwrap_or(true);
                if ready {
                    entry.last_emit_time = Some(ctx.time_ms);
                    entry.seq += 1;
                    out.insert(
                        "cmd".into(),
                        Value::Command(Cmd { action: "captureImage".into(), payload: serde_json::json!({ "seq": entry.seq }), execute_at: None }),
                    );
                }
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn proc_show_image_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "proc-show-image".into(),
        label: "Show Image".into(),
        category: "processors".into(),
        inputs: vec![Port::data("url", "Url", PortType::String)],
        outputs: vec![Port::sink("cmd", "Cmd", PortType::Command)],
        config_schema: vec![ConfigField::new("active", PortType::Boolean, Value::Bool(true))],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let active = config.get("active").map(Value::as_bool).unwrap_or(true);
                let url = inputs.get("url").map(Value::as_str_lossy).unwrap_or_default();
                let cmd = if active && !url.is_empty() {
                    Cmd { action: "showImage".into(), payload: serde_json::json!({ "url": url }), execute_at: None }
                } else {
                    Cmd { action: "hideImage".into(), payload: serde_json::json!({}), execute_at: None }
                };
                let mut out = InputMap::new();
                out.insert("cmd".into(), Value::Command(cmd));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(proc_flashlight_def())?;
    registry.register(proc_screen_color_def())?;
    registry.register(proc_synth_update_def())?;
    registry.register(proc_push_image_upload_def())?;
    registry.register(proc_show_image_def())?;
    Ok(())
}
