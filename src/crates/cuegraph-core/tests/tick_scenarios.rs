//! End-to-end scenarios exercised against the public crate surface only
//! (`cuegraph_core::{Runtime, NodeRegistry, ...}`), the way an embedding
//! host would use it.

use cuegraph_core::command::Target;
use cuegraph_core::graph::Connection;
use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks, NodeInstance, SinkEffects};
use cuegraph_core::overrides::OverrideKind;
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::runtime::{Callbacks, RuntimeOptions};
use cuegraph_core::value::{Cmd, Value};
use cuegraph_core::watchdog::WatchdogReason;
use cuegraph_core::{GraphState, NodeRegistry, Runtime};
use std::sync::Arc;

fn lfo_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "lfo".into(),
        label: "LFO".into(),
        category: "generators".into(),
        inputs: vec![],
        outputs: vec![Port::data("value", "Value", PortType::Number)],
        config_schema: vec![ConfigField::new("freq", PortType::Number, Value::Number(1.0))],
        hooks: NodeHooks {
            process: Some(Arc::new(|_inputs, config, ctx| {
                let freq = config.get("freq").map(Value::as_number).unwrap_or(1.0);
                let phase = (ctx.time_ms as f64 / 1000.0) * freq * std::f64::consts::TAU;
                let mut out = InputMap::new();
                out.insert("value".into(), Value::Number((phase.sin() + 1.0) / 2.0));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn proc_flashlight_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "proc-flashlight".into(),
        label: "Flashlight".into(),
        category: "processors".into(),
        inputs: vec![Port::data("frequencyHz", "FrequencyHz", PortType::Number)],
        outputs: vec![Port::sink("cmd", "Cmd", PortType::Command)],
        config_schema: vec![
            ConfigField::new("active", PortType::Boolean, Value::Bool(true)),
            ConfigField::new("mode", PortType::String, Value::Str("blink".into())),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, config, _ctx| {
                let active = config.get("active").map(Value::as_bool).unwrap_or(true);
                let mode = config.get("mode").map(Value::as_str_lossy).unwrap_or_else(|| "off".into());
                let frequency = inputs.get("frequencyHz").map(Value::as_number).unwrap_or(0.0);
                let payload = if active {
                    serde_json::json!({ "mode": mode, "frequency": frequency, "dutyCycle": 0.5 })
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

/// Stands in for `client-object`'s sink half only — fans its one incoming
/// command straight to the dispatcher (the full node, including client
/// selection, lives in `cuegraph-nodes`/`cuegraph-net`).
fn client_relay_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "client-relay".into(),
        label: "ClientRelay".into(),
        category: "test".into(),
        inputs: vec![Port::sink("in", "In", PortType::Command)],
        outputs: vec![],
        config_schema: vec![],
        hooks: NodeHooks {
            process: None,
            on_sink: Some(Arc::new(|inputs, _config, _ctx| {
                let mut effects = SinkEffects::default();
                for cmd in inputs.get("in").map(Value::as_commands).unwrap_or_default() {
                    effects.push(Target::ClientIds(vec!["A".into()]), cmd);
                }
                Ok(effects)
            })),
            on_disable: None,
        },
    }
}

fn registry_with(defs: Vec<NodeDefinition>) -> Arc<NodeRegistry> {
    let reg = Arc::new(NodeRegistry::new());
    for def in defs {
        reg.register(def).unwrap();
    }
    reg
}

#[test]
fn scenario_s1_lfo_drives_flashlight() {
    let registry = registry_with(vec![lfo_def(), proc_flashlight_def(), client_relay_def()]);

    let dispatched: Arc<parking_lot::Mutex<Vec<(Target, Cmd)>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let dispatched_cb = Arc::clone(&dispatched);

    let mut rt = Runtime::new(
        registry,
        RuntimeOptions { callbacks: Callbacks { on_command: Some(Arc::new(move |t, c| dispatched_cb.lock().push((t.clone(), c.clone())))), ..Callbacks::default() }, ..RuntimeOptions::default() },
    );

    let mut lfo = NodeInstance::new("lfo1", "lfo");
    lfo.config.insert("freq".into(), Value::Number(2.0));
    let mut flashlight = NodeInstance::new("fx1", "proc-flashlight");
    flashlight.config.insert("active".into(), Value::Bool(true));
    flashlight.config.insert("mode".into(), Value::Str("blink".into()));
    let relay = NodeInstance::new("relay1", "client-relay");

    rt.load_graph(GraphState {
        nodes: vec![lfo, flashlight, relay],
        connections: vec![
            Connection { id: "c1".into(), source_node_id: "lfo1".into(), source_port_id: "value".into(), target_node_id: "fx1".into(), target_port_id: "frequencyHz".into() },
            Connection { id: "c2".into(), source_node_id: "fx1".into(), source_port_id: "cmd".into(), target_node_id: "relay1".into(), target_port_id: "in".into() },
        ],
    })
    .unwrap();

    rt.tick_once(0);
    assert_eq!(dispatched.lock().len(), 1);
    let (target, cmd) = dispatched.lock()[0].clone();
    assert_eq!(target, Target::ClientIds(vec!["A".into()]));
    assert_eq!(cmd.action, "flashlight");
    assert_eq!(cmd.payload["mode"], "blink");
}

fn flip_flop_flashlight_def() -> NodeDefinition {
    NodeDefinition {
        node_type: "flip-flop".into(),
        label: "FlipFlop".into(),
        category: "test".into(),
        inputs: vec![],
        outputs: vec![Port::sink("cmd", "Cmd", PortType::Command)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(|_inputs, _config, ctx| {
                let on = (ctx.time_ms / 33) % 2 == 0;
                let mut out = InputMap::new();
                out.insert("cmd".into(), Value::Command(Cmd { action: "flashlight".into(), payload: serde_json::json!({ "mode": if on { "on" } else { "off" } }), execute_at: None }));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

#[test]
fn scenario_s3_oscillation_reported_but_runtime_survives() {
    let registry = registry_with(vec![flip_flop_flashlight_def(), client_relay_def()]);
    let mut rt = Runtime::new(registry, RuntimeOptions::default());
    rt.load_graph(GraphState {
        nodes: vec![NodeInstance::new("ff", "flip-flop"), NodeInstance::new("relay", "client-relay")],
        connections: vec![Connection { id: "c1".into(), source_node_id: "ff".into(), source_port_id: "cmd".into(), target_node_id: "relay".into(), target_port_id: "in".into() }],
    })
    .unwrap();

    let mut saw_oscillation = false;
    for tick in 0..10 {
        let events = rt.tick_once(tick * 33);
        for e in &events {
            assert_ne!(e.reason, WatchdogReason::CompileError);
            assert_ne!(e.reason, WatchdogReason::SinkBurst);
            if e.reason == WatchdogReason::Oscillation {
                saw_oscillation = true;
            }
        }
    }

    assert!(saw_oscillation, "expected an oscillation report within 10 ticks");
    assert!(!rt.is_halted(), "oscillation must not halt the runtime");
}

#[test]
fn invariant_5_disable_runs_exactly_once_per_transition() {
    let disable_calls = Arc::new(parking_lot::Mutex::new(0u32));
    let disable_calls_cb = Arc::clone(&disable_calls);

    let def = NodeDefinition {
        node_type: "counts-disables".into(),
        label: "CountsDisables".into(),
        category: "test".into(),
        inputs: vec![],
        outputs: vec![],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(|_i, _c, _x| Ok(InputMap::new()))),
            on_sink: None,
            on_disable: Some(Arc::new(move |_i, _c, _x| {
                *disable_calls_cb.lock() += 1;
                Ok(SinkEffects::default())
            })),
        },
    };
    let registry = registry_with(vec![def]);

    let enabled = Arc::new(parking_lot::Mutex::new(true));
    let enabled_gate = Arc::clone(&enabled);
    let mut rt = Runtime::new(
        registry,
        RuntimeOptions { gates: cuegraph_core::runtime::Gates { is_node_enabled: Some(Arc::new(move |_id| *enabled_gate.lock())), ..Default::default() }, ..RuntimeOptions::default() },
    );
    rt.load_graph(GraphState { nodes: vec![NodeInstance::new("n1", "counts-disables")], connections: vec![] }).unwrap();

    rt.tick_once(0);
    assert_eq!(*disable_calls.lock(), 0);

    *enabled.lock() = false;
    rt.tick_once(33);
    rt.tick_once(66);
    rt.tick_once(99);
    assert_eq!(*disable_calls.lock(), 1, "onDisable must fire exactly once across consecutive disabled ticks");

    *enabled.lock() = true;
    rt.tick_once(132);
    *enabled.lock() = false;
    rt.tick_once(165);
    assert_eq!(*disable_calls.lock(), 2, "re-enabling then disabling again fires onDisable a second time");
}

#[test]
fn config_override_never_mutates_the_base_value() {
    let registry = registry_with(vec![lfo_def()]);
    let mut rt = Runtime::new(registry, RuntimeOptions::default());
    let mut lfo = NodeInstance::new("n", "lfo");
    lfo.config.insert("freq".into(), Value::Number(1.0));
    rt.load_graph(GraphState { nodes: vec![lfo], connections: vec![] }).unwrap();

    rt.apply_override_at("n", OverrideKind::Config, "freq", Value::Number(9.0), Some(100), 0);
    assert_eq!(rt.get_node("n").unwrap().config.get("freq"), Some(&Value::Number(1.0)), "override never mutates base config");
}
