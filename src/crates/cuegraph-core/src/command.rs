//! Target selector shared between node hooks (which address commands) and
//! `cuegraph-net`'s dispatcher (which resolves them against live clients).
//!
//! Living in `cuegraph-core` keeps node definitions free of a dependency on
//! `cuegraph-net` — nodes only need to *name* a target, not resolve one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Target {
    All,
    ClientIds(Vec<String>),
    Group(String),
}
