//! Graph-specific error types.

use super::id::{InputAddr, NodeId, OutputAddr};
use thiserror::Error;

/// Errors raised by graph edits and by the execution planner.
///
/// A rejected edit leaves the graph unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Cannot connect {output} ({out_type}) to {input} ({in_type}): incompatible socket types")]
    IncompatibleSocketTypes {
        output: OutputAddr,
        input: InputAddr,
        out_type: String,
        in_type: String,
    },

    #[error("Connecting {output} to {input} would introduce a cycle")]
    WouldIntroduceCycle { output: OutputAddr, input: InputAddr },

    #[error("Cannot connect node {0} to itself")]
    SameNode(NodeId),

    #[error("Unknown socket: {0}")]
    UnknownSocket(String),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid value for {input}: {message}")]
    InvalidWidgetValue { input: String, message: String },

    #[error("Node {node} is not a {expected} node")]
    WrongNodeKind { node: NodeId, expected: &'static str },

    #[error("Keyword '{keyword}' is already used by another input of {param}")]
    DuplicateKeyword { param: String, keyword: String },

    #[error("Cycle detected in graph")]
    CycleDetected,

    #[error("No executable nodes among the requested triggers")]
    NoExecutableNodes,
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
