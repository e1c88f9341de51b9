//! Port declarations: the closed type set and data/sink kind (spec §3).

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// The closed set of semantic port types.
///
/// Not statically checked against the value actually flowing through the
/// port (spec §9) — it exists for editor UIs and for `process` to coerce
/// against at its own boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortType {
    Number,
    Boolean,
    String,
    Color,
    Array,
    Image,
    Effect,
    Client,
    Command,
    Any,
    Fuzzy,
}

/// Whether a port participates in the compute DAG or is a side-effect sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Participates in topological ordering; at most one incoming connection.
    Data,
    /// Delivered post-compute; cycles permitted; fan-in allowed.
    Sink,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub label: String,
    pub port_type: PortType,
    pub kind: PortKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Port {
    pub fn data(id: &str, label: &str, port_type: PortType) -> Self {
        Port { id: id.to_string(), label: label.to_string(), port_type, kind: PortKind::Data, default: None }
    }

    pub fn sink(id: &str, label: &str, port_type: PortType) -> Self {
        Port { id: id.to_string(), label: label.to_string(), port_type, kind: PortKind::Sink, default: None }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}
