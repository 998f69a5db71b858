//! Lightweight unique identifier for nodes within a [`DagBuilder`](crate::dag::DagBuilder).
//!
//! Each node added to the graph is assigned a sequential `NodeId`. Names are
//! the user-facing identity; ids keep the topological sort deterministic
//! (ties are broken in insertion order) and stay valid even when a duplicate
//! name has been recorded for later rejection.

use std::fmt;

/// Unique numeric identifier for a node in a DAG.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);

impl NodeId {
    /// Create a new `NodeId` (used internally by the builder).
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}
