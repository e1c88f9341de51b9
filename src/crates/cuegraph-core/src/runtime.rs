//! The tick loop: the runtime's central clock (spec §4.3, §5, §6).
//!
//! ```text
//!  tick(time)
//!    │
//!    ├─ overrides.expire(time)
//!    ├─ recompile if dirty               (§4.2)
//!    ├─ compute pass, in topo order       (§4.3.3)
//!    │    not-enabled  -> onDisable once, passthrough bypass, skip
//!    │    compute-gated off -> clear outputs, skip
//!    │    otherwise    -> resolve inputs, effectiveConfig, process()
//!    └─ sink pass, same order             (§4.3.4)
//!         no sink sources  -> onDisable once on disconnect
//!         unchanged fingerprint -> skip
//!         otherwise    -> per-action command diff, onSink(), dispatch
//! ```
//!
//! [`Runtime`] itself is a plain, synchronous, single-threaded struct — it
//! owns all of its mutable state and never locks anything internally,
//! mirroring the cooperative single-threaded model spec §5 describes.
//! [`RuntimeHandle`] is the thin async wrapper that drives it off a
//! `tokio::time::interval` and lets host code call into it concurrently with
//! the tick task; that's the one piece of synchronization Rust needs that a
//! single-threaded JS host gets for free.

use crate::command::Target;
use crate::compile::compile;
use crate::error::{Error, Result};
use crate::graph::GraphState;
use crate::hash::stable_hash;
use crate::node::{ConfigMap, InputMap, NodeDefinition, NodeId, NodeInstance, ProcessContext};
use crate::overrides::{OverrideKind, OverrideManager};
use crate::port::{Port, PortKind, PortType};
use crate::registry::NodeRegistry;
use crate::value::{Cmd, Value};
use crate::watchdog::{Watchdog, WatchdogConfig, WatchdogEvent};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_TICK_INTERVAL_MS: u64 = 33;
const MIN_TICK_INTERVAL_MS: u64 = 5;
const MAX_TICK_INTERVAL_MS: u64 = 250;

fn clamp_tick_interval(ms: u64) -> u64 {
    ms.clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS)
}

type NodeGate = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type TickCallback = Arc<dyn Fn(f64, i64) + Send + Sync>;
type WatchdogCallback = Arc<dyn Fn(&WatchdogEvent) + Send + Sync>;
type CommandCallback = Arc<dyn Fn(&Target, &Cmd) + Send + Sync>;

/// Caller-supplied gate callbacks (spec §6 "Construction options"). Absent
/// gates default to "enabled".
#[derive(Clone, Default)]
pub struct Gates {
    pub is_node_enabled: Option<NodeGate>,
    pub is_compute_enabled: Option<NodeGate>,
    pub is_sink_enabled: Option<NodeGate>,
}

impl Gates {
    fn node_enabled(&self, id: &str) -> bool {
        self.is_node_enabled.as_ref().map(|f| f(id)).unwrap_or(true)
    }
    fn compute_enabled(&self, id: &str) -> bool {
        self.is_compute_enabled.as_ref().map(|f| f(id)).unwrap_or(true)
    }
    fn sink_enabled(&self, id: &str) -> bool {
        self.is_sink_enabled.as_ref().map(|f| f(id)).unwrap_or(true)
    }
}

/// Caller-supplied lifecycle callbacks (spec §6).
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_tick: Option<TickCallback>,
    pub on_watchdog: Option<WatchdogCallback>,
    /// Invoked once per command a sink hook actually dispatches — the
    /// runtime's side of the host-supplied `executeCommand` pair (spec §6).
    pub on_command: Option<CommandCallback>,
}

#[derive(Clone)]
pub struct RuntimeOptions {
    pub tick_interval_ms: u64,
    pub watchdog: WatchdogConfig,
    pub gates: Gates,
    pub callbacks: Callbacks,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            watchdog: WatchdogConfig::default(),
            gates: Gates::default(),
            callbacks: Callbacks::default(),
        }
    }
}

/// Rolling per-tick timing (an SPEC_FULL addition — spec only requires
/// `onTick(durationMs, time)`; this keeps a running average for dashboards
/// without the host having to integrate it itself).
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub tick_count: u64,
    pub last_duration_ms: f64,
    pub avg_duration_ms: f64,
}

#[derive(Clone)]
struct SinkState {
    fingerprint: String,
}

/// The tick-driven node graph evaluator.
pub struct Runtime {
    registry: Arc<NodeRegistry>,
    state: GraphState,
    dirty: bool,
    order: Vec<NodeId>,
    overrides: OverrideManager,
    watchdog: Watchdog,
    tick_interval_ms: u64,
    gates: Gates,
    callbacks: Callbacks,

    last_enabled: HashMap<NodeId, bool>,
    last_inputs: HashMap<NodeId, InputMap>,
    last_sink_state: HashMap<NodeId, SinkState>,
    command_delivery: HashMap<(NodeId, String, String, usize), String>,

    halted: Option<WatchdogEvent>,
    clock_start: Instant,
    last_tick_time_ms: Option<i64>,
    stats: TickStats,
}

impl Runtime {
    pub fn new(registry: Arc<NodeRegistry>, options: RuntimeOptions) -> Self {
        Runtime {
            registry,
            state: GraphState::default(),
            dirty: true,
            order: Vec::new(),
            overrides: OverrideManager::new(),
            watchdog: Watchdog::new(options.watchdog),
            tick_interval_ms: clamp_tick_interval(options.tick_interval_ms),
            gates: options.gates,
            callbacks: options.callbacks,
            last_enabled: HashMap::new(),
            last_inputs: HashMap::new(),
            last_sink_state: HashMap::new(),
            command_delivery: HashMap::new(),
            halted: None,
            clock_start: Instant::now(),
            last_tick_time_ms: None,
            stats: TickStats::default(),
        }
    }

    // ---- External interface (spec §6) ----------------------------------

    /// Replace the world. Validates the graph against the registry first;
    /// on failure the runtime retains whatever graph it had before (spec §6,
    /// §7 "ProgrammerError — no graph state is retained" applies to the
    /// *caller's* view, not a partial write into the runtime).
    pub fn load_graph(&mut self, state: GraphState) -> Result<()> {
        state.validate(&self.registry)?;
        self.state = state;
        self.dirty = true;
        self.overrides.clear();
        self.last_enabled.clear();
        self.last_inputs.clear();
        self.last_sink_state.clear();
        self.command_delivery.clear();
        self.halted = None;
        Ok(())
    }

    pub fn set_tick_interval_ms(&mut self, ms: u64) {
        self.tick_interval_ms = clamp_tick_interval(ms);
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Wipes the graph, overrides, and every per-node cache — a fresh
    /// runtime in all but identity.
    pub fn clear(&mut self) {
        self.state = GraphState::default();
        self.dirty = true;
        self.order.clear();
        self.overrides.clear();
        self.last_enabled.clear();
        self.last_inputs.clear();
        self.last_sink_state.clear();
        self.command_delivery.clear();
        self.halted = None;
        self.last_tick_time_ms = None;
        self.stats = TickStats::default();
    }

    pub fn apply_override(&mut self, node_id: &str, kind: OverrideKind, key: &str, value: Value, ttl_ms: Option<u64>) {
        let now = self.now_ms();
        self.apply_override_at(node_id, kind, key, value, ttl_ms, now);
    }

    /// Same as [`Runtime::apply_override`] but with an explicit `updatedAt`
    /// timestamp instead of reading the wall clock — lets tests stamp
    /// overrides on the same time axis as the ticks they drive.
    pub fn apply_override_at(&mut self, node_id: &str, kind: OverrideKind, key: &str, value: Value, ttl_ms: Option<u64>, now: i64) {
        self.overrides.apply(node_id, kind, key, value, ttl_ms, now);
    }

    pub fn remove_override(&mut self, node_id: &str, kind: OverrideKind, key: &str) {
        self.overrides.remove(node_id, kind, key);
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    pub fn get_node(&self, id: &str) -> Option<&NodeInstance> {
        self.state.node(id)
    }

    pub fn get_last_computed_inputs(&self, id: &str) -> Option<&InputMap> {
        self.last_inputs.get(id)
    }

    /// A snapshot, not a live pointer (spec §9 "Cached last-inputs for UI").
    pub fn export_graph(&self) -> GraphState {
        self.state.clone()
    }

    pub fn get_graph_ref(&self) -> &GraphState {
        &self.state
    }

    pub fn compile_now(&mut self) -> Result<()> {
        self.order = compile(&self.state, &self.registry)?;
        self.dirty = false;
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    pub fn tick_stats(&self) -> TickStats {
        self.stats
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halted_reason(&self) -> Option<&WatchdogEvent> {
        self.halted.as_ref()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock_start.elapsed().as_millis() as i64
    }

    /// Runs every node's `onDisable` (ignoring the last-enabled gate — stop
    /// unconditionally flushes, spec §5), clears outputs and sink caches.
    /// Does not clear overrides or the compiled order, so `start()` again
    /// resumes from the same world.
    pub fn stop_now(&mut self) {
        let order = self.order.clone();
        for node_id in &order {
            let Some(node_type) = self.state.node(node_id).map(|n| n.node_type.clone()) else { continue };
            let Some(def) = self.registry.get(&node_type) else { continue };
            let time_ms = self.now_ms();
            self.run_on_disable(node_id, &def, time_ms, 0);
        }
        for node in &mut self.state.nodes {
            node.output_values.clear();
        }
        self.last_sink_state.clear();
    }

    // ---- Tick body (spec §4.3) ------------------------------------------

    /// Run one tick at wall-clock `time_ms`. `deltaTime` is derived from the
    /// previous call's `time_ms`, per spec §3 "Process context". Returns the
    /// watchdog events raised this tick (empty in the common case). A halted
    /// runtime no-ops.
    pub fn tick_once(&mut self, time_ms: i64) -> Vec<WatchdogEvent> {
        let mut events = Vec::new();
        if self.halted.is_some() {
            return events;
        }

        let started = Instant::now();
        let delta_time_ms = time_ms - self.last_tick_time_ms.unwrap_or(time_ms);
        self.last_tick_time_ms = Some(time_ms);

        self.overrides.expire(time_ms);

        if self.dirty {
            match compile(&self.state, &self.registry) {
                Ok(order) => {
                    self.order = order;
                    self.dirty = false;
                }
                Err(Error::Cycle { residue }) => {
                    let ev = Watchdog::compile_error(residue, "cycle detected among data edges".to_string());
                    self.emit_watchdog(ev.clone(), &mut events);
                    return events;
                }
                Err(other) => {
                    tracing::error!(error = %other, "unexpected compile error");
                    return events;
                }
            }
        }

        self.watchdog.begin_tick();

        let order = self.order.clone();
        for node_id in &order {
            self.compute_node(node_id, time_ms, delta_time_ms);
        }

        for node_id in &order {
            if self.sink_node(node_id, time_ms, delta_time_ms, &mut events) {
                // A fatal watchdog event fired mid-pass; halt takes effect
                // immediately and subsequent nodes in this tick don't sink.
                return events;
            }
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats.tick_count += 1;
        self.stats.last_duration_ms = duration_ms;
        self.stats.avg_duration_ms += (duration_ms - self.stats.avg_duration_ms) / self.stats.tick_count as f64;

        if let Some(cb) = &self.callbacks.on_tick {
            cb(duration_ms, time_ms);
        }

        events
    }

    fn emit_watchdog(&mut self, event: WatchdogEvent, events: &mut Vec<WatchdogEvent>) -> bool {
        if let Some(cb) = &self.callbacks.on_watchdog {
            cb(&event);
        }
        let fatal = event.reason.is_fatal();
        events.push(event.clone());
        if fatal {
            self.halted = Some(event);
        }
        fatal
    }

    fn dispatch_effects(&mut self, effects: crate::node::SinkEffects) {
        for (target, cmd) in effects.commands {
            if let Some(cb) = &self.callbacks.on_command {
                cb(&target, &cmd);
            }
        }
    }

    // ---- Compute pass ----------------------------------------------------

    fn compute_node(&mut self, node_id: &str, time_ms: i64, delta_time_ms: i64) {
        let Some(node_type) = self.state.node(node_id).map(|n| n.node_type.clone()) else { return };
        let Some(def) = self.registry.get(&node_type) else { return };

        let enabled = self.gates.node_enabled(node_id);
        let was_enabled = self.last_enabled.get(node_id).copied().unwrap_or(true);

        if !enabled {
            if was_enabled {
                self.run_on_disable(node_id, &def, time_ms, delta_time_ms);
                self.last_sink_state.remove(node_id);
            }
            self.last_enabled.insert(node_id.to_string(), false);
            self.apply_passthrough_bypass(node_id, &def);
            return;
        }
        self.last_enabled.insert(node_id.to_string(), true);

        if !self.gates.compute_enabled(node_id) {
            if let Some(n) = self.state.node_mut(node_id) {
                n.output_values.clear();
            }
            return;
        }

        let inputs = self.resolve_inputs(node_id, &def, time_ms);
        self.last_inputs.insert(node_id.to_string(), inputs.clone());
        let config = self.effective_config(node_id, &def, time_ms);
        let ctx = ProcessContext { node_id_hash: stable_hash(node_id), time_ms, delta_time_ms };

        let outputs = match &def.hooks.process {
            Some(f) => match f(&inputs, &config, &ctx) {
                Ok(outputs) => outputs,
                Err(e) => {
                    tracing::warn!(node_id, error = %e, "process hook failed");
                    InputMap::new()
                }
            },
            None => InputMap::new(),
        };

        if let Some(n) = self.state.node_mut(node_id) {
            n.output_values = outputs;
        }
    }

    /// A disabled single-data-in/single-data-out node with matching,
    /// non-command/non-client port types transparently forwards its upstream
    /// value (spec §4.3 "Passthrough bypass rule"). This is the generic
    /// heuristic only — no hardcoded node-type list (spec §9 Open Questions).
    fn apply_passthrough_bypass(&mut self, node_id: &str, def: &NodeDefinition) {
        let data_inputs: Vec<&Port> = def.inputs.iter().filter(|p| p.kind == PortKind::Data).collect();
        let data_outputs: Vec<&Port> = def.outputs.iter().filter(|p| p.kind == PortKind::Data).collect();

        let bypass_value = (data_inputs.len() == 1 && data_outputs.len() == 1)
            .then(|| {
                let in_port = data_inputs[0];
                let out_port = data_outputs[0];
                let eligible = !matches!(in_port.port_type, PortType::Command | PortType::Client) && in_port.port_type == out_port.port_type;
                if !eligible {
                    return None;
                }
                let source = self.state.data_sources_for(node_id, &in_port.id, &self.registry)?.clone();
                let wired_out = self.state.connections.iter().any(|c| c.source_node_id == node_id && c.source_port_id == out_port.id);
                if !wired_out {
                    return None;
                }
                self.state.node(&source.source_node_id).and_then(|n| n.output_values.get(&source.source_port_id).cloned())
            })
            .flatten();

        if let Some(n) = self.state.node_mut(node_id) {
            n.output_values.clear();
            if let (Some(port), Some(value)) = (data_outputs.first(), bypass_value) {
                n.output_values.insert(port.id.clone(), value);
            }
        }
    }

    fn resolve_inputs(&self, node_id: &str, def: &NodeDefinition, time_ms: i64) -> InputMap {
        let node = self.state.node(node_id);
        let mut inputs = InputMap::new();
        for port in def.inputs.iter().filter(|p| p.kind == PortKind::Data) {
            let value = self
                .overrides
                .get(node_id, OverrideKind::Input, &port.id, time_ms)
                .cloned()
                .or_else(|| {
                    self.state
                        .data_sources_for(node_id, &port.id, &self.registry)
                        .and_then(|c| self.state.node(&c.source_node_id).and_then(|n| n.output_values.get(&c.source_port_id).cloned()))
                })
                .or_else(|| node.and_then(|n| n.input_values.get(&port.id).cloned()))
                .or_else(|| port.default.clone())
                .unwrap_or(Value::Null);
            inputs.insert(port.id.clone(), value);
        }
        inputs
    }

    fn effective_config(&self, node_id: &str, def: &NodeDefinition, time_ms: i64) -> ConfigMap {
        let mut config = def.default_config();
        if let Some(node) = self.state.node(node_id) {
            for (k, v) in &node.config {
                config.insert(k.clone(), v.clone());
            }
        }
        for field in &def.config_schema {
            if let Some(v) = self.overrides.get(node_id, OverrideKind::Config, &field.key, time_ms) {
                config.insert(field.key.clone(), v.clone());
            }
        }
        config
    }

    fn run_on_disable(&mut self, node_id: &str, def: &NodeDefinition, time_ms: i64, delta_time_ms: i64) {
        let Some(hook) = def.hooks.on_disable.clone() else { return };
        let inputs = self.last_inputs.get(node_id).cloned().unwrap_or_default();
        let config = self.effective_config(node_id, def, time_ms);
        let ctx = ProcessContext { node_id_hash: stable_hash(node_id), time_ms, delta_time_ms };
        match hook(&inputs, &config, &ctx) {
            Ok(effects) => self.dispatch_effects(effects),
            Err(e) => tracing::warn!(node_id, error = %e, "onDisable hook failed"),
        }
    }

    // ---- Sink pass ---------------------------------------------------------

    /// Runs the sink pass for one node. Returns `true` if a fatal watchdog
    /// event (sink burst) fired — the caller stops the sink pass immediately.
    fn sink_node(&mut self, node_id: &str, time_ms: i64, delta_time_ms: i64, events: &mut Vec<WatchdogEvent>) -> bool {
        let Some(node_type) = self.state.node(node_id).map(|n| n.node_type.clone()) else { return false };
        let Some(def) = self.registry.get(&node_type) else { return false };
        let Some(on_sink) = def.hooks.on_sink.clone() else { return false };

        if !self.last_enabled.get(node_id).copied().unwrap_or(true) {
            return false;
        }
        if !self.gates.sink_enabled(node_id) {
            return false;
        }

        let sink_input_ports: Vec<Port> = def.inputs.iter().filter(|p| p.kind == PortKind::Sink).cloned().collect();
        let had_sink_state = self.last_sink_state.contains_key(node_id);
        let has_sink_sources = sink_input_ports.iter().any(|p| !self.state.sink_sources_for(node_id, &p.id).is_empty());

        if !has_sink_sources {
            if had_sink_state {
                self.run_on_disable(node_id, &def, time_ms, delta_time_ms);
                self.last_sink_state.remove(node_id);
            }
            return false;
        }

        let mut full_inputs = self.last_inputs.get(node_id).cloned().unwrap_or_default();
        let mut command_batches: HashMap<String, Vec<Cmd>> = HashMap::new();

        for port in &sink_input_ports {
            let values: Vec<Value> = self
                .state
                .sink_sources_for(node_id, &port.id)
                .iter()
                .filter_map(|c| self.state.node(&c.source_node_id).and_then(|n| n.output_values.get(&c.source_port_id).cloned()))
                .collect();

            let aggregated = match values.len() {
                0 => Value::Null,
                1 => values.into_iter().next().unwrap(),
                _ => Value::Array(values),
            };

            let commands_here = if port.port_type == PortType::Command { Some(aggregated.as_commands()) } else { None };

            let count = match &commands_here {
                Some(cmds) => cmds.len(),
                None => match &aggregated {
                    Value::Array(items) => items.len(),
                    Value::Null => 0,
                    _ => 1,
                },
            };
            if count > 0 {
                if let Some(ev) = self.watchdog.record_sink_values(count) {
                    return self.emit_watchdog(ev, events);
                }
            }

            if let Some(cmds) = &commands_here {
                for cmd in cmds {
                    if let Some(ev) = self.watchdog.observe_command(node_id, &port.id, cmd, time_ms) {
                        self.emit_watchdog(ev, events);
                    }
                }
                command_batches.insert(port.id.clone(), cmds.clone());
            }

            full_inputs.insert(port.id.clone(), aggregated);
        }

        let config = self.effective_config(node_id, &def, time_ms);
        let fingerprint = fingerprint_sink_state(&full_inputs, &config);
        let unchanged = had_sink_state && self.last_sink_state.get(node_id).map(|s| s.fingerprint == fingerprint).unwrap_or(false);
        if unchanged {
            return false;
        }

        let mut effective_inputs = full_inputs;
        for (port_id, cmds) in &command_batches {
            let delivered = self.diff_commands(node_id, port_id, cmds);
            let value = match delivered.len() {
                0 => Value::Null,
                1 => Value::Command(delivered.into_iter().next().unwrap()),
                _ => Value::Commands(delivered),
            };
            effective_inputs.insert(port_id.clone(), value);
        }

        let ctx = ProcessContext { node_id_hash: stable_hash(node_id), time_ms, delta_time_ms };
        match on_sink(&effective_inputs, &config, &ctx) {
            Ok(effects) => self.dispatch_effects(effects),
            Err(e) => tracing::warn!(node_id, error = %e, "onSink hook failed"),
        }

        self.last_sink_state.insert(node_id.to_string(), SinkState { fingerprint });
        false
    }

    /// Per-`(node, port, action, ordinal)` signature diff (spec §4.3, §9
    /// "Command diffing"): only commands whose signature changed since their
    /// last delivery are forwarded to `onSink`, so one changed command in a
    /// batched bundle doesn't redeliver its unchanged siblings.
    fn diff_commands(&mut self, node_id: &str, port_id: &str, cmds: &[Cmd]) -> Vec<Cmd> {
        let mut ordinal_counts: HashMap<String, usize> = HashMap::new();
        let mut delivered = Vec::new();
        for cmd in cmds {
            let ordinal = {
                let counter = ordinal_counts.entry(cmd.action.clone()).or_insert(0);
                let o = *counter;
                *counter += 1;
                o
            };
            let key = (node_id.to_string(), port_id.to_string(), cmd.action.clone(), ordinal);
            let signature = format!("{}|{}", cmd.action, serde_json::to_string(&cmd.payload).unwrap_or_default());
            if self.command_delivery.get(&key) != Some(&signature) {
                self.command_delivery.insert(key, signature);
                delivered.push(cmd.clone());
            }
        }
        delivered
    }
}

fn fingerprint_sink_state(inputs: &InputMap, config: &ConfigMap) -> String {
    let in_map: BTreeMap<&String, String> = inputs.iter().map(|(k, v)| (k, v.canonical_json())).collect();
    let cfg_map: BTreeMap<&String, String> = config.iter().map(|(k, v)| (k, v.canonical_json())).collect();
    format!("{in_map:?}|{cfg_map:?}")
}

/// Async wrapper that drives a [`Runtime`] off a `tokio::time::interval` and
/// lets host code call into it (`applyOverride`, `getNode`, …) while ticks
/// are in flight — the Rust-necessary stand-in for the spec's implicit
/// single-threaded event loop (spec §5, §6).
pub struct RuntimeHandle {
    inner: Arc<tokio::sync::Mutex<Runtime>>,
    task: Option<tokio::task::JoinHandle<()>>,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl RuntimeHandle {
    pub fn new(runtime: Runtime) -> Self {
        RuntimeHandle { inner: Arc::new(tokio::sync::Mutex::new(runtime)), task: None, stop_tx: None }
    }

    pub async fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let interval_ms = self.inner.lock().await.tick_interval_ms();
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let mut runtime = inner.lock().await;
                        if runtime.is_halted() {
                            break;
                        }
                        let now = runtime.now_ms();
                        runtime.tick_once(now);
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        self.task = Some(task);
        self.stop_tx = Some(stop_tx);
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.inner.lock().await.stop_now();
    }

    pub async fn apply_override(&self, node_id: &str, kind: OverrideKind, key: &str, value: Value, ttl_ms: Option<u64>) {
        self.inner.lock().await.apply_override(node_id, kind, key, value, ttl_ms);
    }

    pub async fn remove_override(&self, node_id: &str, kind: OverrideKind, key: &str) {
        self.inner.lock().await.remove_override(node_id, kind, key);
    }

    pub async fn clear_overrides(&self) {
        self.inner.lock().await.clear_overrides();
    }

    pub async fn load_graph(&self, state: GraphState) -> Result<()> {
        self.inner.lock().await.load_graph(state)
    }

    pub async fn export_graph(&self) -> GraphState {
        self.inner.lock().await.export_graph()
    }

    pub async fn get_last_computed_inputs(&self, id: &str) -> Option<InputMap> {
        self.inner.lock().await.get_last_computed_inputs(id).cloned()
    }

    pub async fn compile_now(&self) -> Result<()> {
        self.inner.lock().await.compile_now()
    }

    pub async fn tick_stats(&self) -> TickStats {
        self.inner.lock().await.tick_stats()
    }

    pub async fn is_halted(&self) -> bool {
        self.inner.lock().await.is_halted()
    }

    pub fn handle(&self) -> Arc<tokio::sync::Mutex<Runtime>> {
        Arc::clone(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeHooks, NodeInstance, SinkEffects};
    use crate::port::Port;

    fn number_def() -> NodeDefinition {
        NodeDefinition {
            node_type: "number".into(),
            label: "Number".into(),
            category: "values".into(),
            inputs: vec![],
            outputs: vec![Port::data("value", "Value", PortType::Number)],
            config_schema: vec![crate::node::ConfigField::new("value", PortType::Number, Value::Number(0.0))],
            hooks: NodeHooks {
                process: Some(Arc::new(|_inputs, config, _ctx| {
                    let mut out = InputMap::new();
                    out.insert("value".into(), config.get("value").cloned().unwrap_or(Value::Number(0.0)));
                    Ok(out)
                })),
                on_sink: None,
                on_disable: None,
            },
        }
    }

    fn math_def() -> NodeDefinition {
        NodeDefinition {
            node_type: "math".into(),
            label: "Math".into(),
            category: "logic".into(),
            inputs: vec![Port::data("a", "A", PortType::Number), Port::data("b", "B", PortType::Number)],
            outputs: vec![Port::data("result", "Result", PortType::Number)],
            config_schema: vec![],
            hooks: NodeHooks {
                process: Some(Arc::new(|inputs, _config, _ctx| {
                    let mut out = InputMap::new();
                    let a = inputs.get("a").map(Value::as_number).unwrap_or(0.0);
                    let b = inputs.get("b").map(Value::as_number).unwrap_or(0.0);
                    out.insert("result".into(), Value::Number(a + b));
                    Ok(out)
                })),
                on_sink: None,
                on_disable: None,
            },
        }
    }

    fn harness() -> Runtime {
        let registry = Arc::new(NodeRegistry::new());
        registry.register(number_def()).unwrap();
        registry.register(math_def()).unwrap();
        Runtime::new(registry, RuntimeOptions::default())
    }

    fn s2_graph() -> GraphState {
        let mut n1 = NodeInstance::new("n1", "number");
        n1.config.insert("value".into(), Value::Number(5.0));
        let mut n2 = NodeInstance::new("n2", "number");
        n2.config.insert("value".into(), Value::Number(3.0));
        let m = NodeInstance::new("m", "math");
        GraphState {
            nodes: vec![n1, n2, m],
            connections: vec![
                crate::graph::Connection { id: "c1".into(), source_node_id: "n1".into(), source_port_id: "value".into(), target_node_id: "m".into(), target_port_id: "a".into() },
                crate::graph::Connection { id: "c2".into(), source_node_id: "n2".into(), source_port_id: "value".into(), target_node_id: "m".into(), target_port_id: "b".into() },
            ],
        }
    }

    #[test]
    fn scenario_s2_without_override_sums_plainly() {
        let mut rt = harness();
        rt.load_graph(s2_graph()).unwrap();
        rt.tick_once(0);
        assert_eq!(rt.get_node("m").unwrap().output_values.get("result"), Some(&Value::Number(8.0)));
    }

    #[test]
    fn scenario_s2_override_precedence() {
        // Override applied before the runtime ever ticks, stamped at the
        // same instant as the first tick's `now` — so the first two ticks
        // (elapsed 0 and 33) fall inside the ttl=50 window and the third
        // (elapsed 66) falls outside it, matching invariant 4 (spec §8):
        // observed for exactly ceil(50 / 33) = 2 ticks.
        let mut rt = harness();
        rt.load_graph(s2_graph()).unwrap();
        rt.apply_override_at("m", OverrideKind::Input, "a", Value::Number(100.0), Some(50), 0);

        rt.tick_once(0);
        assert_eq!(rt.get_node("m").unwrap().output_values.get("result"), Some(&Value::Number(103.0)));
        rt.tick_once(33);
        assert_eq!(rt.get_node("m").unwrap().output_values.get("result"), Some(&Value::Number(103.0)));
        rt.tick_once(66);
        assert_eq!(rt.get_node("m").unwrap().output_values.get("result"), Some(&Value::Number(8.0)));
    }

    #[test]
    fn disabled_passthrough_node_forwards_upstream_value() {
        let registry = Arc::new(NodeRegistry::new());
        registry.register(number_def()).unwrap();
        registry
            .register(NodeDefinition {
                node_type: "effect-like".into(),
                label: "EffectLike".into(),
                category: "effects".into(),
                inputs: vec![Port::data("in", "In", PortType::Number)],
                outputs: vec![Port::data("out", "Out", PortType::Number)],
                config_schema: vec![],
                hooks: NodeHooks {
                    process: Some(Arc::new(|inputs, _config, _ctx| {
                        let mut out = InputMap::new();
                        out.insert("out".into(), Value::Number(inputs.get("in").map(Value::as_number).unwrap_or(0.0) * 2.0));
                        Ok(out)
                    })),
                    on_sink: None,
                    on_disable: None,
                },
            })
            .unwrap();
        registry
            .register(NodeDefinition {
                node_type: "sink-stub".into(),
                label: "SinkStub".into(),
                category: "test".into(),
                inputs: vec![Port::data("in", "In", PortType::Number)],
                outputs: vec![],
                config_schema: vec![],
                hooks: NodeHooks::default(),
            })
            .unwrap();

        let mut n1 = NodeInstance::new("n1", "number");
        n1.config.insert("value".into(), Value::Number(7.0));
        let fx = NodeInstance::new("fx", "effect-like");
        let out = NodeInstance::new("out", "sink-stub");

        let mut rt = Runtime::new(registry, RuntimeOptions {
            gates: Gates { is_node_enabled: Some(Arc::new(|id| id != "fx")), ..Gates::default() },
            ..RuntimeOptions::default()
        });
        rt.load_graph(GraphState {
            nodes: vec![n1, fx, out],
            connections: vec![
                crate::graph::Connection { id: "c1".into(), source_node_id: "n1".into(), source_port_id: "value".into(), target_node_id: "fx".into(), target_port_id: "in".into() },
                crate::graph::Connection { id: "c2".into(), source_node_id: "fx".into(), source_port_id: "out".into(), target_node_id: "out".into(), target_port_id: "in".into() },
            ],
        })
        .unwrap();

        rt.tick_once(0);
        assert_eq!(rt.get_node("fx").unwrap().output_values.get("out"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn onsink_fires_and_dispatches_commands() {
        let registry = Arc::new(NodeRegistry::new());
        registry.register(number_def()).unwrap();
        registry
            .register(NodeDefinition {
                node_type: "echo-sink".into(),
                label: "EchoSink".into(),
                category: "test".into(),
                inputs: vec![Port::sink("in", "In", PortType::Command)],
                outputs: vec![],
                config_schema: vec![],
                hooks: NodeHooks {
                    process: None,
                    on_sink: Some(Arc::new(|inputs, _config, _ctx| {
                        let mut effects = SinkEffects::default();
                        for cmd in inputs.get("in").map(Value::as_commands).unwrap_or_default() {
                            effects.push(Target::All, cmd);
                        }
                        Ok(effects)
                    })),
                    on_disable: None,
                },
            })
            .unwrap();
        registry
            .register(NodeDefinition {
                node_type: "cmd-source".into(),
                label: "CmdSource".into(),
                category: "test".into(),
                inputs: vec![],
                outputs: vec![Port::sink("out", "Out", PortType::Command)],
                config_schema: vec![],
                hooks: NodeHooks {
                    process: Some(Arc::new(|_inputs, _config, _ctx| {
                        let mut out = InputMap::new();
                        out.insert("out".into(), Value::Command(Cmd { action: "flashlight".into(), payload: serde_json::json!({"mode": "on"}), execute_at: None }));
                        Ok(out)
                    })),
                    on_sink: None,
                    on_disable: None,
                },
            })
            .unwrap();

        let dispatched = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let dispatched_cb = Arc::clone(&dispatched);

        let mut rt = Runtime::new(registry, RuntimeOptions {
            callbacks: Callbacks { on_command: Some(Arc::new(move |_target, cmd| dispatched_cb.lock().push(cmd.clone()))), ..Callbacks::default() },
            ..RuntimeOptions::default()
        });
        rt.load_graph(GraphState {
            nodes: vec![NodeInstance::new("src", "cmd-source"), NodeInstance::new("sink", "echo-sink")],
            connections: vec![crate::graph::Connection { id: "c1".into(), source_node_id: "src".into(), source_port_id: "out".into(), target_node_id: "sink".into(), target_port_id: "in".into() }],
        })
        .unwrap();

        rt.tick_once(0);
        assert_eq!(dispatched.lock().len(), 1);
        assert_eq!(dispatched.lock()[0].action, "flashlight");

        // Same command again next tick: unchanged fingerprint, onSink is skipped.
        rt.tick_once(33);
        assert_eq!(dispatched.lock().len(), 1);
    }

    #[test]
    fn scenario_s4_sink_burst_halts_runtime() {
        let registry = Arc::new(NodeRegistry::new());
        registry
            .register(NodeDefinition {
                node_type: "burst-source".into(),
                label: "BurstSource".into(),
                category: "test".into(),
                inputs: vec![],
                outputs: vec![Port::sink("out", "Out", PortType::Command)],
                config_schema: vec![],
                hooks: NodeHooks {
                    process: Some(Arc::new(|_inputs, _config, _ctx| {
                        let cmds: Vec<Cmd> = (0..40).map(|i| Cmd { action: format!("a{i}"), payload: serde_json::json!({}), execute_at: None }).collect();
                        let mut out = InputMap::new();
                        out.insert("out".into(), Value::Commands(cmds));
                        Ok(out)
                    })),
                    on_sink: None,
                    on_disable: None,
                },
            })
            .unwrap();
        registry
            .register(NodeDefinition {
                node_type: "sink".into(),
                label: "Sink".into(),
                category: "test".into(),
                inputs: vec![Port::sink("in", "In", PortType::Command)],
                outputs: vec![],
                config_schema: vec![],
                hooks: NodeHooks { process: None, on_sink: Some(Arc::new(|_i, _c, _x| Ok(SinkEffects::default()))), on_disable: None },
            })
            .unwrap();

        let mut rt = Runtime::new(registry, RuntimeOptions { watchdog: WatchdogConfig { max_sink_values_per_tick: 10, ..Default::default() }, ..RuntimeOptions::default() });
        rt.load_graph(GraphState {
            nodes: vec![NodeInstance::new("src", "burst-source"), NodeInstance::new("snk", "sink")],
            connections: vec![crate::graph::Connection { id: "c1".into(), source_node_id: "src".into(), source_port_id: "out".into(), target_node_id: "snk".into(), target_port_id: "in".into() }],
        })
        .unwrap();

        let events = rt.tick_once(0);
        assert!(events.iter().any(|e| e.reason == crate::watchdog::WatchdogReason::SinkBurst));
        assert!(rt.is_halted());

        let events_after = rt.tick_once(33);
        assert!(events_after.is_empty(), "halted runtime must not keep ticking");
    }
}
