//! Control-flow nodes (spec §4.6 "Control flow"): `for`, `sleep`,
//! `number-stabilizer`, `number-script`. Each remembers something across
//! ticks, so each closure keeps a `DashMap<u64, State>` keyed by
//! `ProcessContext::node_id_hash` — see the module doc in `lib.rs`.

use cuegraph_core::node::{ConfigField, InputMap, NodeDefinition, NodeHooks};
use cuegraph_core::port::{Port, PortType};
use cuegraph_core::value::Value;
use cuegraph_core::{NodeRegistry, Result};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

fn for_def() -> NodeDefinition {
    struct ForState {
        prev_trigger: bool,
        running: bool,
        next_index: i64,
        last_emitted: i64,
        last_emit_time: Option<i64>,
    }
    let states: Arc<DashMap<u64, ForState>> = Arc::new(DashMap::new());

    NodeDefinition {
        node_type: "for".into(),
        label: "For".into(),
        category: "control-flow".into(),
        inputs: vec![Port::data("trigger", "Trigger", PortType::Boolean)],
        outputs: vec![
            Port::data("index", "Index", PortType::Number),
            Port::data("running", "Running", PortType::Boolean),
            Port::data("loopEnd", "Loop End", PortType::Boolean),
        ],
        config_schema: vec![
            ConfigField::new("from", PortType::Number, Value::Number(0.0)),
            ConfigField::new("to", PortType::Number, Value::Number(10.0)),
            ConfigField::new("waitMs", PortType::Number, Value::Number(100.0)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, config, ctx| {
                let trigger = inputs.get("trigger").map(Value::as_bool).unwrap_or(false);
                let from = config.get("from").map(Value::as_number).unwrap_or(0.0) as i64;
                let to = config.get("to").map(Value::as_number).unwrap_or(10.0) as i64;
                let wait_ms = config.get("waitMs").map(Value::as_number).unwrap_or(100.0).max(1.0) as i64;

                let mut entry = states.entry(ctx.node_id_hash).or_insert(ForState {
                    prev_trigger: false,
                    running: false,
                    next_index: from,
                    last_emitted: from,
                    last_emit_time: None,
                });

                let rising_edge = trigger && !entry.prev_trigger;
                entry.prev_trigger = trigger;

                if rising_edge {
                    entry.running = true;
                    entry.next_index = from;
                    entry.last_emit_time = None;
                } else if !trigger {
                    entry.running = false;
                }

                let mut loop_end = false;
                if entry.running {
                    let ready = entry.last_emit_time.map(|t| ctx.time_ms - t >= wait_ms).unwrap_or(true);
                    if ready {
                        let emitted = entry.next_index;
                        entry.last_emitted = emitted;
                        entry.last_emit_time = Some(ctx.time_ms);
                        if emitted >= to - 1 {
                            loop_end = true;
                            entry.running = false;
                        } else {
                            entry.next_index = emitted + 1;
                        }
                    }
                }

                let mut out = InputMap::new();
                out.insert("index".into(), Value::Number(entry.last_emitted as f64));
                out.insert("running".into(), Value::Bool(entry.running));
                out.insert("loopEnd".into(), Value::Bool(loop_end));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn sleep_def() -> NodeDefinition {
    let queues: Arc<DashMap<u64, VecDeque<(i64, Value)>>> = Arc::new(DashMap::new());

    NodeDefinition {
        node_type: "sleep".into(),
        label: "Sleep".into(),
        category: "control-flow".into(),
        inputs: vec![Port::data("in", "In", PortType::Any)],
        outputs: vec![Port::data("out", "Out", PortType::Array)],
        config_schema: vec![ConfigField::new("delayMs", PortType::Number, Value::Number(0.0))],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, config, ctx| {
                let delay_ms = config.get("delayMs").map(Value::as_number).unwrap_or(0.0) as i64;
                let mut queue = queues.entry(ctx.node_id_hash).or_default();

                if let Some(value) = inputs.get("in") {
                    if !value.is_null() {
                        queue.push_back((ctx.time_ms, value.clone()));
                    }
                }

                let release_before = ctx.time_ms - delay_ms;
                let mut released = Vec::new();
                while matches!(queue.front(), Some((enqueued_at, _)) if *enqueued_at <= release_before) {
                    if let Some((_, value)) = queue.pop_front() {
                        released.push(value);
                    }
                }

                let mut out = InputMap::new();
                out.insert("out".into(), Value::Array(released));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

fn number_stabilizer_def() -> NodeDefinition {
    struct EaseState {
        current: f64,
        last_time: Option<i64>,
    }
    let states: Arc<DashMap<u64, EaseState>> = Arc::new(DashMap::new());

    NodeDefinition {
        node_type: "number-stabilizer".into(),
        label: "Number Stabilizer".into(),
        category: "control-flow".into(),
        inputs: vec![Port::data("target", "Target", PortType::Number)],
        outputs: vec![Port::data("value", "Value", PortType::Number)],
        config_schema: vec![ConfigField::new("smoothing", PortType::Number, Value::Number(0.5))],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, config, ctx| {
                let target = inputs.get("target").map(Value::as_number).unwrap_or(0.0);
                let smoothing = config.get("smoothing").map(Value::as_number).unwrap_or(0.5);
                // Below 1, `smoothing` is a normalized 0..1 knob mapped onto a
                // 50..1000ms easing window; at or above 1 it's already ms.
                let duration_ms = if smoothing < 1.0 { 50.0 + smoothing.clamp(0.0, 1.0) * 950.0 } else { smoothing };

                let mut entry = states.entry(ctx.node_id_hash).or_insert(EaseState { current: target, last_time: None });
                let dt = entry.last_time.map(|t| (ctx.time_ms - t) as f64).unwrap_or(0.0);
                let alpha = (dt / duration_ms).clamp(0.0, 1.0);
                entry.current += (target - entry.current) * alpha;
                entry.last_time = Some(ctx.time_ms);

                let mut out = InputMap::new();
                out.insert("value".into(), Value::Number(entry.current));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

/// Cubic Bezier with fixed endpoints `(0,0)` and `(1,1)`, solved for `y` at
/// a given `x` by bisection — monotonic for the easing-style control point
/// ranges this node is meant to be configured with.
fn cubic_bezier_ease(p1x: f64, p1y: f64, p2x: f64, p2y: f64, x: f64) -> f64 {
    let bezier = |u: f64, c1: f64, c2: f64| {
        let mu = 1.0 - u;
        3.0 * mu * mu * u * c1 + 3.0 * mu * u * u * c2 + u * u * u
    };
    let x = x.clamp(0.0, 1.0);
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    for _ in 0..30 {
        let mid = (lo + hi) / 2.0;
        if bezier(mid, p1x, p2x) < x { lo = mid } else { hi = mid }
    }
    bezier((lo + hi) / 2.0, p1y, p2y)
}

fn number_script_def() -> NodeDefinition {
    #[derive(Clone, Copy, PartialEq)]
    enum Phase {
        Idle,
        Forward,
        Backward,
    }
    struct ScriptState {
        prev_trigger: bool,
        phase: Phase,
        start_time: i64,
        last_value_t: f64,
    }
    let states: Arc<DashMap<u64, ScriptState>> = Arc::new(DashMap::new());

    NodeDefinition {
        node_type: "number-script".into(),
        label: "Number Script".into(),
        category: "control-flow".into(),
        inputs: vec![Port::data("trigger", "Trigger", PortType::Boolean)],
        outputs: vec![
            Port::data("value", "Value", PortType::Number),
            Port::data("running", "Running", PortType::Boolean),
            Port::data("finished", "Finished", PortType::Boolean),
        ],
        config_schema: vec![
            ConfigField::new("mode", PortType::String, Value::Str("once".into())),
            ConfigField::new("durationMs", PortType::Number, Value::Number(500.0)),
            ConfigField::new("from", PortType::Number, Value::Number(0.0)),
            ConfigField::new("to", PortType::Number, Value::Number(1.0)),
            ConfigField::new("p1x", PortType::Number, Value::Number(0.25)),
            ConfigField::new("p1y", PortType::Number, Value::Number(0.1)),
            ConfigField::new("p2x", PortType::Number, Value::Number(0.25)),
            ConfigField::new("p2y", PortType::Number, Value::Number(1.0)),
        ],
        hooks: NodeHooks {
            process: Some(Arc::new(move |inputs, config, ctx| {
                let trigger = inputs.get("trigger").map(Value::as_bool).unwrap_or(false);
                let mode = config.get("mode").map(Value::as_str_lossy).unwrap_or_else(|| "once".into());
                let duration_ms = config.get("durationMs").map(Value::as_number).unwrap_or(500.0).max(1.0);
                let from = config.get("from").map(Value::as_number).unwrap_or(0.0);
                let to = config.get("to").map(Value::as_number).unwrap_or(1.0);
                let (p1x, p1y) = (config.get("p1x").map(Value::as_number).unwrap_or(0.25), config.get("p1y").map(Value::as_number).unwrap_or(0.1));
                let (p2x, p2y) = (config.get("p2x").map(Value::as_number).unwrap_or(0.25), config.get("p2y").map(Value::as_number).unwrap_or(1.0));

                let mut entry = states.entry(ctx.node_id_hash).or_insert(ScriptState { prev_trigger: false, phase: Phase::Idle, start_time: ctx.time_ms, last_value_t: 0.0 });

                let rising_edge = trigger && !entry.prev_trigger;
                entry.prev_trigger = trigger;
                if rising_edge {
                    entry.phase = Phase::Forward;
                    entry.start_time = ctx.time_ms;
                }

                let mut finished = false;
                // `once` holds at the curve's end value; `one-way`/`around` reset
                // to the start so the node is immediately ready to retrigger.
                let value_t = match entry.phase {
                    Phase::Idle => entry.last_value_t,
                    Phase::Forward => {
                        let t = ((ctx.time_ms - entry.start_time) as f64 / duration_ms).clamp(0.0, 1.0);
                        if t >= 1.0 {
                            finished = true;
                            match mode.as_str() {
                                "around" => {
                                    entry.phase = Phase::Backward;
                                    entry.start_time = ctx.time_ms;
                                }
                                "one-way" => entry.phase = Phase::Idle,
                                _ => entry.phase = Phase::Idle,
                            }
                        }
                        t
                    }
                    Phase::Backward => {
                        let t = ((ctx.time_ms - entry.start_time) as f64 / duration_ms).clamp(0.0, 1.0);
                        if t >= 1.0 {
                            entry.phase = Phase::Idle;
                            finished = true;
                        }
                        1.0 - t
                    }
                };
                entry.last_value_t = if finished && mode == "one-way" { 0.0 } else { value_t };
                let running = entry.phase != Phase::Idle;

                let eased = cubic_bezier_ease(p1x, p1y, p2x, p2y, value_t);
                let value = from + eased * (to - from);

                let mut out = InputMap::new();
                out.insert("value".into(), Value::Number(value));
                out.insert("running".into(), Value::Bool(running));
                out.insert("finished".into(), Value::Bool(finished));
                Ok(out)
            })),
            on_sink: None,
            on_disable: None,
        },
    }
}

pub fn register(registry: &NodeRegistry) -> Result<()> {
    registry.register(for_def())?;
    registry.register(sleep_def())?;
    registry.register(number_stabilizer_def())?;
    registry.register(number_script_def())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuegraph_core::node::ProcessContext;

    fn ctx(time_ms: i64) -> ProcessContext {
        ProcessContext { node_id_hash: 42, time_ms, delta_time_ms: 0 }
    }

    #[test]
    fn for_emits_indices_one_per_wait_window() {
        let def = for_def();
        let process = def.hooks.process.clone().unwrap();
        let mut config = def.default_config();
        config.insert("from".into(), Value::Number(0.0));
        config.insert("to".into(), Value::Number(3.0));
        config.insert("waitMs".into(), Value::Number(100.0));

        let mut trigger_inputs = InputMap::new();
        trigger_inputs.insert("trigger".into(), Value::Bool(true));

        let first = process(&trigger_inputs, &config, &ctx(0)).unwrap();
        assert_eq!(first.get("index"), Some(&Value::Number(0.0)));
        assert_eq!(first.get("running"), Some(&Value::Bool(true)));

        let held = process(&trigger_inputs, &config, &ctx(50)).unwrap();
        assert_eq!(held.get("index"), Some(&Value::Number(0.0)), "not yet at wait-ms boundary");

        let second = process(&trigger_inputs, &config, &ctx(100)).unwrap();
        assert_eq!(second.get("index"), Some(&Value::Number(1.0)));
        assert_eq!(second.get("loopEnd"), Some(&Value::Bool(false)));

        let third = process(&trigger_inputs, &config, &ctx(200)).unwrap();
        assert_eq!(third.get("index"), Some(&Value::Number(2.0)));
        assert_eq!(third.get("loopEnd"), Some(&Value::Bool(true)), "last emit pulses loopEnd the same tick");
        assert_eq!(third.get("running"), Some(&Value::Bool(false)));
    }

    #[test]
    fn sleep_releases_only_after_delay_elapses() {
        let def = sleep_def();
        let process = def.hooks.process.clone().unwrap();
        let mut config = def.default_config();
        config.insert("delayMs".into(), Value::Number(100.0));

        let mut inputs = InputMap::new();
        inputs.insert("in".into(), Value::Number(7.0));
        let immediate = process(&inputs, &config, &ctx(0)).unwrap();
        assert_eq!(immediate.get("out"), Some(&Value::Array(vec![])));

        let not_yet = process(&InputMap::new(), &config, &ctx(50)).unwrap();
        assert_eq!(not_yet.get("out"), Some(&Value::Array(vec![])));

        let released = process(&InputMap::new(), &config, &ctx(100)).unwrap();
        assert_eq!(released.get("out"), Some(&Value::Array(vec![Value::Number(7.0)])));
    }

    #[test]
    fn stabilizer_reaches_target_only_after_smoothing_duration() {
        let def = number_stabilizer_def();
        let process = def.hooks.process.clone().unwrap();
        let mut config = def.default_config();
        config.insert("smoothing".into(), Value::Number(100.0));

        let mut inputs = InputMap::new();
        inputs.insert("target".into(), Value::Number(10.0));
        let first = process(&inputs, &config, &ctx(0)).unwrap();
        assert_eq!(first.get("value"), Some(&Value::Number(10.0)), "no prior tick to ease from, snaps to target");

        let mut change = InputMap::new();
        change.insert("target".into(), Value::Number(20.0));
        let mid = process(&change, &config, &ctx(50)).unwrap();
        assert_eq!(mid.get("value"), Some(&Value::Number(15.0)));
    }

    #[test]
    fn script_pulses_finished_exactly_once_for_once_mode() {
        let def = number_script_def();
        let process = def.hooks.process.clone().unwrap();
        let mut config = def.default_config();
        config.insert("mode".into(), Value::Str("once".into()));
        config.insert("durationMs".into(), Value::Number(100.0));

        let mut trigger_inputs = InputMap::new();
        trigger_inputs.insert("trigger".into(), Value::Bool(true));
        process(&trigger_inputs, &config, &ctx(0)).unwrap();
        let running_mid = process(&trigger_inputs, &config, &ctx(50)).unwrap();
        assert_eq!(running_mid.get("finished"), Some(&Value::Bool(false)));

        let at_end = process(&trigger_inputs, &config, &ctx(100)).unwrap();
        assert_eq!(at_end.get("finished"), Some(&Value::Bool(true)));

        let after = process(&trigger_inputs, &config, &ctx(150)).unwrap();
        assert_eq!(after.get("finished"), Some(&Value::Bool(false)), "finished is a single-tick pulse");
    }
}
