//! TOML configuration loading, in the style of the teacher's
//! `config::server::ServerConfig::load` — `CONFIG_PATH` env var first, then
//! a short list of conventional locations. Unlike the teacher's server,
//! which hard-requires its config file, a missing or unreadable file here
//! just logs a warning and falls back to defaults: a live-performance
//! console tool should still come up with sane behavior.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub max_sink_values_per_tick: usize,
    pub oscillation_window: usize,
    pub oscillation_span_ms: i64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        let d = cuegraph_core::WatchdogConfig::default();
        WatchdogConfig { max_sink_values_per_tick: d.max_sink_values_per_tick, oscillation_window: d.oscillation_window, oscillation_span_ms: d.oscillation_span_ms }
    }
}

impl From<WatchdogConfig> for cuegraph_core::WatchdogConfig {
    fn from(cfg: WatchdogConfig) -> Self {
        cuegraph_core::WatchdogConfig {
            max_sink_values_per_tick: cfg.max_sink_values_per_tick,
            oscillation_window: cfg.oscillation_window,
            oscillation_span_ms: cfg.oscillation_span_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionRegistryConfig {
    pub grace_period_ms: i64,
}

impl Default for ConnectionRegistryConfig {
    fn default() -> Self {
        ConnectionRegistryConfig { grace_period_ms: 5000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub max_clock_skew_ms: i64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig { max_clock_skew_ms: cuegraph_net::DispatcherOptions::default().max_clock_skew_ms }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub tick_interval_ms: u64,
    pub watchdog: WatchdogConfig,
    pub connection_registry: ConnectionRegistryConfig,
    pub dispatcher: DispatcherConfig,
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            tick_interval_ms: 33,
            watchdog: WatchdogConfig::default(),
            connection_registry: ConnectionRegistryConfig::default(),
            dispatcher: DispatcherConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| crate::error::CliError::Read { path: path.display().to_string(), source })?;
        toml::from_str(&content).map_err(|source| crate::error::CliError::ConfigToml { path: path.display().to_string(), source })
    }

    /// Loads from `CONFIG_PATH`, then `./cuegraph.toml`, then
    /// `config/cuegraph.toml`; falls back to [`RuntimeConfig::default`] with
    /// a logged warning if none is found or the file fails to parse.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("CONFIG_PATH") {
            return Self::from_file(Path::new(&path)).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to load CONFIG_PATH, using defaults");
                RuntimeConfig::default()
            });
        }

        let candidates = [PathBuf::from("cuegraph.toml"), PathBuf::from("config/cuegraph.toml")];
        for candidate in &candidates {
            if candidate.exists() {
                return Self::from_file(candidate).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, path = %candidate.display(), "failed to parse config file, using defaults");
                    RuntimeConfig::default()
                });
            }
        }

        tracing::warn!("no config file found (set CONFIG_PATH or place cuegraph.toml), using defaults");
        RuntimeConfig::default()
    }
}
