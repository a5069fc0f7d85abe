use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in replica sets and under the worker prefix.
///
/// Configured by the operator rather than generated, so it survives restarts
/// and chunk records stay meaningful.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live worker as seen through its liveness entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEntry {
    pub id: NodeId,
    pub addr: String,
}
