//! Error types for graph construction, compilation, and tick execution.
//!
//! # Error taxonomy
//!
//! ```text
//! Error
//! ├── UnknownNodeType     - loadGraph referenced an unregistered node type
//! ├── InvalidConnection   - endpoint missing or port missing (port-type
//! │                         mismatches are ignored at compile, not checked)
//! ├── DuplicateDataInput  - a data input port already has an incoming edge
//! ├── DuplicateNodeType   - NodeRegistry::register called twice for one type
//! ├── Cycle               - compile() found a residue of un-orderable nodes
//! └── Serialization       - serde_json passthrough
//! ```
//!
//! `UnknownNodeType`, `InvalidConnection`, and `DuplicateDataInput` are thrown
//! from [`crate::runtime::Runtime::load_graph`] (spec's `ProgrammerError`
//! class); the caller must not retain any graph state when one is returned.
//! `Cycle` is raised through the watchdog channel rather than returned here
//! (spec's `RuntimeCompileError`), but the type lives in this enum because
//! [`crate::compile::compile`] still returns it as a `Result`.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("node type {0} is already registered")]
    DuplicateNodeType(String),

    #[error("invalid connection {connection_id}: {reason}")]
    InvalidConnection {
        connection_id: String,
        reason: String,
    },

    #[error("data input port {node_id}.{port_id} already has an incoming connection")]
    DuplicateDataInput { node_id: String, port_id: String },

    #[error("compile error: cycle detected among data edges, residue={residue:?}")]
    Cycle { residue: Vec<String> },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
