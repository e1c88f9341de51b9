//! Error taxonomy for the CLI binary itself — graph/config loading, not the
//! runtime's own errors (those stay `cuegraph_core::Error` and are wrapped
//! here via `#[from]`, the same shape the teacher's `OrchestratorError`
//! wraps its subsystem error enums).

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse graph file {path} as JSON: {source}")]
    GraphJson { path: String, #[source] source: serde_json::Error },
    #[error("failed to parse config file {path} as TOML: {source}")]
    ConfigToml { path: String, #[source] source: toml::de::Error },
    #[error(transparent)]
    Runtime(#[from] cuegraph_core::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
