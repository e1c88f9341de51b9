//! Tick-driven node graph runtime: compile, schedule, and watchdog a
//! live-performance dataflow graph.
//!
//! The central type is [`runtime::Runtime`] (and its async wrapper
//! [`runtime::RuntimeHandle`]); everything else in this crate is its
//! supporting data model — ports, node definitions, the registry, graph
//! compilation, overrides, watchdogs, and structural diffing.

pub mod command;
pub mod compile;
pub mod diff;
pub mod error;
pub mod graph;
pub mod hash;
pub mod node;
pub mod overrides;
pub mod port;
pub mod registry;
pub mod runtime;
pub mod value;
pub mod watchdog;

pub use command::Target;
pub use error::{Error, Result};
pub use graph::{Connection, GraphState};
pub use node::{NodeDefinition, NodeInstance, NodeId};
pub use port::{Port, PortKind, PortType};
pub use registry::NodeRegistry;
pub use runtime::{Runtime, RuntimeHandle, RuntimeOptions};
pub use value::Value;
pub use watchdog::{WatchdogConfig, WatchdogEvent, WatchdogReason};
