//! Connection lifecycle and command transport for `cuegraph-core` runtimes.
//!
//! `cuegraph-core` is deliberately transport-agnostic (spec §5); this crate
//! is the one piece of "host" the workspace ships by default: a connection
//! registry (§4.9), deterministic client selection (§4.7), and a command
//! dispatcher (§4.10) that together let a node like `client-object` turn
//! `Target::All` into real transport frames.

pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod selection;

pub use dispatcher::{Dispatcher, DispatcherCallbacks, DispatcherOptions, DispatchedCommand};
pub use error::{Error, Result};
pub use registry::{ConnectionRegistry, ConnectionRegistryOptions, RegisterRequest, Role};
pub use selection::{select_client_ids_for_node, select_client_ids_with_seed, Selection, SelectionInputs};
