//! Structural and lifecycle error types.

use crate::interpreter::InterpreterState;

/// Errors detected while building a DAG. All of them are programmer errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DagError {
    /// The graph contains a cycle involving the named node.
    #[error("cycle detected involving node: {0}")]
    CycleDetected(String),

    /// Two nodes were given the same scoped name.
    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    /// A lookup or edge referenced a node that does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A Window/Map/Join was declared on a builder with no current node.
    #[error("node {0} has no input")]
    MissingInput(String),

    /// The DAG has no nodes.
    #[error("empty DAG: no nodes")]
    EmptyDag,
}

/// Errors about the interpreter lifecycle itself.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("interpreter is not in the new state (current: {0:?})")]
    NotInNewState(InterpreterState),
}
