//! Safety checks run once per tick: compile errors and sink bursts halt the
//! runtime, oscillation is reported but non-fatal (spec §4.5).

use crate::value::Cmd;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogReason {
    CompileError,
    SinkBurst,
    Oscillation,
}

impl WatchdogReason {
    /// Only `Oscillation` lets the runtime keep ticking (spec §4.5, §7).
    pub fn is_fatal(self) -> bool {
        !matches!(self, WatchdogReason::Oscillation)
    }
}

/// Optional machine-readable detail attached to a watchdog event (an
/// SPEC_FULL addition over the spec's opaque `diagnostics?` field).
#[derive(Debug, Clone, Default)]
pub struct WatchdogDiagnostics {
    pub node_id: Option<String>,
    pub port_id: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatchdogEvent {
    pub reason: WatchdogReason,
    pub message: String,
    pub diagnostics: WatchdogDiagnostics,
}

/// Tunable thresholds (spec §4.5, §6 construction options).
#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    pub max_sink_values_per_tick: usize,
    pub oscillation_window: usize,
    pub oscillation_span_ms: i64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig { max_sink_values_per_tick: 200, oscillation_window: 10, oscillation_span_ms: 1000 }
    }
}

/// Continuous-value actions excluded from oscillation tracking by design
/// (spec §4.5) — a knob being wiggled continuously isn't feedback.
const OSCILLATION_EXCLUDED_ACTIONS: &[&str] = &["visualScenes", "visualEffects", "screenColor", "modulateSoundUpdate"];

#[derive(Debug, Clone, PartialEq)]
struct Signature {
    action: String,
    quantized_payload: String,
}

impl Signature {
    /// Builds a compact signature: action plus a 2-decimal-place-quantized
    /// canonical JSON of the payload. Quantizing uniformly to 2 dp resolves
    /// the spec's noted source ambiguity (spec §9 Open Questions).
    fn from_cmd(cmd: &Cmd) -> Self {
        let quantized = quantize_value(&cmd.payload);
        Signature { action: cmd.action.clone(), quantized_payload: quantized.to_string() }
    }
}

fn quantize_value(v: &serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                serde_json::json!((f * 100.0).round() / 100.0)
            } else {
                v.clone()
            }
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(quantize_value).collect()),
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), quantize_value(v));
            }
            serde_json::Value::Object(out)
        }
        other => other.clone(),
    }
}

struct TimedSignature {
    signature: Signature,
    at_ms: i64,
}

/// Per-`(nodeId, sinkPortId)` oscillation tracker.
#[derive(Default)]
struct OscillationTrack {
    history: VecDeque<TimedSignature>,
}

/// Tracks per-tick sink-burst counters and per-port oscillation history.
/// Owned by the runtime; reset at the start of every tick except the
/// oscillation history, which is a sliding window across ticks.
pub struct Watchdog {
    config: WatchdogConfig,
    sink_values_this_tick: usize,
    tracks: std::collections::HashMap<(String, String), OscillationTrack>,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Watchdog { config, sink_values_this_tick: 0, tracks: std::collections::HashMap::new() }
    }

    pub fn begin_tick(&mut self) {
        self.sink_values_this_tick = 0;
    }

    /// Record `count` sink values delivered this tick (arrays counted by
    /// length, per spec §4.5). Returns a burst event if the budget was
    /// exceeded.
    pub fn record_sink_values(&mut self, count: usize) -> Option<WatchdogEvent> {
        self.sink_values_this_tick += count;
        if self.sink_values_this_tick > self.config.max_sink_values_per_tick {
            Some(WatchdogEvent {
                reason: WatchdogReason::SinkBurst,
                message: format!(
                    "sink burst: {} values delivered this tick exceeds budget {}",
                    self.sink_values_this_tick, self.config.max_sink_values_per_tick
                ),
                diagnostics: WatchdogDiagnostics::default(),
            })
        } else {
            None
        }
    }

    /// Feed a command delivered on `(node_id, port_id)` at `now_ms` into the
    /// oscillation detector. Returns an advisory event the first time a
    /// strict two-state alternation is detected within the configured span.
    pub fn observe_command(&mut self, node_id: &str, port_id: &str, cmd: &Cmd, now_ms: i64) -> Option<WatchdogEvent> {
        if OSCILLATION_EXCLUDED_ACTIONS.contains(&cmd.action.as_str()) {
            return None;
        }

        let signature = Signature::from_cmd(cmd);
        let key = (node_id.to_string(), port_id.to_string());
        let track = self.tracks.entry(key).or_default();

        track.history.push_back(TimedSignature { signature, at_ms: now_ms });
        while track.history.len() > self.config.oscillation_window {
            track.history.pop_front();
        }

        if track.history.len() < 6 {
            return None;
        }

        let window = self.config.oscillation_window.max(6);
        let recent: Vec<&TimedSignature> = track.history.iter().rev().take(window).collect();
        if recent.len() < 6 {
            return None;
        }

        let span_ok = recent.first().unwrap().at_ms - recent.last().unwrap().at_ms <= self.config.oscillation_span_ms;
        if !span_ok {
            return None;
        }

        let distinct: Vec<&Signature> = {
            let mut uniq: Vec<&Signature> = Vec::new();
            for t in &recent {
                if !uniq.contains(&&t.signature) {
                    uniq.push(&t.signature);
                }
            }
            uniq
        };
        if distinct.len() != 2 {
            return None;
        }

        let alternates = recent.windows(2).all(|w| w[0].signature != w[1].signature);
        if !alternates {
            return None;
        }

        Some(WatchdogEvent {
            reason: WatchdogReason::Oscillation,
            message: format!("oscillation detected on {}.{}", node_id, port_id),
            diagnostics: WatchdogDiagnostics { node_id: Some(node_id.to_string()), port_id: Some(port_id.to_string()), detail: None },
        })
    }

    pub fn compile_error(residue: Vec<String>, message: String) -> WatchdogEvent {
        WatchdogEvent {
            reason: WatchdogReason::CompileError,
            message,
            diagnostics: WatchdogDiagnostics { node_id: residue.first().cloned(), port_id: None, detail: Some(format!("{residue:?}")) },
        }
    }
}
