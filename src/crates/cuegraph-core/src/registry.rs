//! Process-wide node type registry (spec §4.1).
//!
//! A `DashMap` rather than a plain `HashMap` behind a lock, the same choice
//! the teacher makes for its connection pool — registration happens once at
//! startup from several independent `register_builtin_nodes`-style callers,
//! and lookups happen every tick, so a lock-free map avoids contention
//! without the runtime having to reach for its own synchronization.

use crate::error::{Error, Result};
use crate::node::NodeDefinition;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct NodeRegistry {
    defs: DashMap<String, Arc<NodeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node definition. Rejects a duplicate type string.
    pub fn register(&self, def: NodeDefinition) -> Result<()> {
        if self.defs.contains_key(&def.node_type) {
            return Err(Error::DuplicateNodeType(def.node_type));
        }
        self.defs.insert(def.node_type.clone(), Arc::new(def));
        Ok(())
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<NodeDefinition>> {
        self.defs.get(node_type).map(|e| e.value().clone())
    }

    pub fn list(&self) -> Vec<Arc<NodeDefinition>> {
        self.defs.iter().map(|e| e.value().clone()).collect()
    }

    pub fn unregister(&self, node_type: &str) -> Option<Arc<NodeDefinition>> {
        self.defs.remove(node_type).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
