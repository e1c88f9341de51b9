//! Selection/object nodes (spec §4.6 "Selection / Objects"): `client-count`,
//! `client-object` (the primary router), `cmd-aggregator`,
//! `proc-client-sensors`.
//!
//! These need things no `process` hook otherwise has: the live client list,
//! and the latest sensor snapshot for a given client. The spec's
//! "host-provided callbacks" (`getAllClientIds`, `getSensorForClientId`, …)
//! are modeled as [`NodeHostCallbacks`], threaded in at registration time
//! the same way `cuegraph-net`'s `Dispatcher`/`ConnectionRegistry` take
//! their callbacks as constructor options.

use cuegraph_core::command::Target;
use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks, SinkEffects};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::{Cmd, Value};
use cuegraph_core::{NodeRegistry, Result};
use cuegraph_net::{select_client_ids_with_seed, SelectionInputs};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

pub type GetAllClientIds = Arc<dyn Fn() -> Vec<String> + Send + Sync>;
pub type GetSensorForClientId = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

#[derive(Clone)]
pub struct NodeHostCallbacks {
    pub get_all_client_ids: GetAllClientIds,
    pub get_sensor_for_client_id: GetSensorForClientId,
}

fn client_count_def(host: NodeHostCallbacks) -> NodeDefinition {
    NodeDefinition {
        node_type: "client-count".into(),
        label: "Client Count".into(),
        category: "selection".into(),
        inputs: vec![],
        outputs: vec![Port::data("clients", "Clients", PortType::Array), Port::data("count", "Count", PortType::Number)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(move |_inputs, _config, _ctx| {
                let ids = (host.get_all_client_ids)();
                let mut out = InputMap::new();
                out.insert("count".into(), Value::Number(ids.len() as f64));
                out.insert("clients".into(), Value::Array(ids.into_iter().map(Value::Client).collect()));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn cleanup_bundle() -> Vec<Cmd> {
    vec![
        Cmd { action: "stopSound".into(), payload: serde_json::json!({}), execute_at: None },
        Cmd { action: "stopMedia".into(), payload: serde_json::json!({}), execute_at: None },
        Cmd { action: "hideImage".into(), payload: serde_json::json!({}), execute_at: None },
        Cmd { action: "flashlight".into(), payload: serde_json::json!({"mode": "off"}), execute_at: None },
        Cmd { action: "screenColor".into(), payload: serde_json::json!({"color": "#000000", "opacity": 1.0, "mode": "solid"}), execute_at: None },
    ]
}

fn client_object_def(host: NodeHostCallbacks) -> NodeDefinition {
    let last_selected: Arc<DashMap<u64, Vec<String>>> = Arc::new(DashMap::new());
    let last_selected_sink = Arc::clone(&last_selected);
    let last_selected_disable = Arc::clone(&last_selected);

    NodeDefinition {
        node_type: "client-object".into(),
        label: "Client Object".into(),
        category: "selection".into(),
        inputs: vec![
            Port::data("loadIndexs", "Load Indexes", PortType::Array),
            Port::data("index", "Index", PortType::Number),
            Port::data("range", "Range", PortType::Number),
            Port::data("random", "Random", PortType::Boolean),
            Port::sink("in", "In", PortType::Command),
        ],
        outputs: vec![Port::data("out", "Out", PortType::Any), Port::data("indexs", "Indexes", PortType::Array)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, _config, ctx| {
                let all_clients = (host.get_all_client_ids)();
                let load_indexs = inputs.get("loadIndexs").and_then(Value::as_array).map(|s| s.to_vec()).unwrap_or_default();

                let selected_ids: Vec<String> = if !load_indexs.is_empty() {
                    load_indexs.iter().map(Value::as_str_lossy).filter(|id| all_clients.contains(id)).collect()
                } else {
                    let selection_inputs = SelectionInputs {
                        index: Some(inputs.get("index").map(Value::as_number).unwrap_or(1.0) as i64),
                        range: Some(inputs.get("range").map(Value::as_number).unwrap_or(1.0) as i64),
                        random: inputs.get("random").map(Value::as_bool).unwrap_or(false),
                    };
                    select_client_ids_with_seed(ctx.node_id_hash, &all_clients, selection_inputs).selected_ids
                };

                last_selected.insert(ctx.node_id_hash, selected_ids.clone());

                let snapshot = selected_ids.first().and_then(|id| (host.get_sensor_for_client_id)(id)).unwrap_or(Value::Null);

                let mut out = InputMap::new();
                out.insert("out".into(), snapshot);
                out.insert("indexs".into(), Value::Array(selected_ids.into_iter().map(Value::Client).collect()));
                Ok(out)
            })),
            on_sink: Some(Arc::new(move |inputs, _config, ctx| {
                let ids = last_selected_sink.get(&ctx.node_id_hash).map(|v| v.clone()).unwrap_or_default();
                let mut effects = SinkEffects::default();
                if !ids.is_empty() {
                    for cmd in inputs.get("in").map(Value::as_commands).unwrap_or_default() {
                        effects.push(Target::ClientIds(ids.clone()), cmd);
                    }
                }
                Ok(effects)
            })),
            on_disable: Some(Arc::new(move |_inputs, _config, ctx| {
                let ids = last_selected_disable.get(&ctx.node_id_hash).map(|v| v.clone()).unwrap_or_default();
                let mut effects = SinkEffects::default();
                if !ids.is_empty() {
                    for cmd in cleanup_bundle() {
                        effects.push(Target::ClientIds(ids.clone()), cmd);
                    }
                }
                Ok(effects)
            })),
        },
    }
}

fn cmd_aggregator_def() -> NodeDefinition {
    const MAX_INPUTS: usize = 8;
    NodeDefinition {
        node_type: "cmd-aggregator".into(),
        label: "Command Aggregator".into(),
        category: "selection".into(),
        inputs: (0..MAX_INPUTS).map(|i| Port::data(&format!("in{i}"), &format!("In {i}"), PortType::Command)).collect(),
        outputs: vec![Port::data("out", "Out", PortType::Array)],
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(|inputs, _config, _ctx| {
                let mut flattened = Vec::new();
                for i in 0..MAX_INPUTS {
                    if let Some(value) = inputs.get(&format!("in{i}")) {
                        flattened.extend(value.as_commands());
                    }
                }
                let mut out = InputMap::new();
                out.insert("out".into(), Value::Commands(flattened));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

const SENSOR_FIELDS: [&str; 10] =
    ["accelX", "accelY", "accelZ", "gyroAlpha", "gyroBeta", "gyroGamma", "micVolume", "micLow", "micHigh", "micBpm"];

fn proc_client_sensors_def(host: NodeHostCallbacks) -> NodeDefinition {
    NodeDefinition {
        node_type: "proc-client-sensors".into(),
        label: "Client Sensors".into(),
        category: "selection".into(),
        inputs: vec![Port::data("clientId", "Client Id", PortType::Client)],
        outputs: SENSOR_FIELDS.iter().map(|&f| Port::data(f, f, PortType::Number)).collect(),
        config_schema: vec![],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, _config, _ctx| {
                let client_id = inputs.get("clientId").map(Value::as_str_lossy).unwrap_or_default();
                let snapshot = if client_id.is_empty() { None } else { (host.get_sensor_for_client_id)(&client_id) };
                let fields: HashMap<String, Value> = match &snapshot {
                    Some(Value::Object(map)) => map.clone(),
                    _ => HashMap::new(),
                };
                let mut out = InputMap::new();
                for field in SENSOR_FIELDS {
                    out.insert(field.to_string(), Value::Number(fields.get(field).map(Value::as_number).unwrap_or(0.0)));
                }
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    let noop_host = NodeHostCallbacks { get_all_client_ids: Arc::new(Vec::new), get_sensor_for_client_id: Arc::new(|_| None) };
    register_with_host(registry, noop_host)
}

/// Registers the selection/object category with real host callbacks. The
/// CLI binary calls this instead of the no-op [`register`] once it has a
/// live `cuegraph-net` connection registry to back the callbacks with.
pub fn register_with_host(registry: &NodeRegistry, host: NodeHostCallbacks) -> Result<()> {
    registry.register(client_count_def(host.clone()))?;
    registry.register(client_object_def(host.clone()))?;
    registry.register(cmd_aggregator_def())?;
    registry.register(proc_client_sensors_def(host))?;
    Ok(())
}
