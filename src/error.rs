//! Error handling for nodezator-rs
//!
//! This module defines the crate-level error type and a Result alias for use
//! throughout the library. Graph edit and planning failures live in
//! [`GraphError`](crate::graph::GraphError) and convert into
//! [`NodezatorError`] with `?`. Failures raised *inside* a node callable are
//! never errors of this type: they are recorded per node in the
//! [`ExecutionReport`](crate::execution::ExecutionReport).

use crate::graph::{GraphError, NodeId};
use crate::nodepack::ScriptId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for nodezator-rs operations
#[derive(Error, Debug)]
pub enum NodezatorError {
    /// Graph validation and planning errors
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The document is not a structurally valid record
    #[error("Document parse error: {0}")]
    DocumentParse(String),

    /// A node references a script that no loaded node pack provides
    #[error("Unknown script id: {0}")]
    UnknownScriptId(ScriptId),

    /// A node pack reference could not be resolved
    #[error("Node pack not found: {0}")]
    NodePackNotFound(String),

    /// A node pack was found but could not be loaded
    #[error("Failed to load node pack '{pack}': {message}")]
    NodePackLoad { pack: String, message: String },

    /// A node script does not define its entry function
    #[error("Callable '{entry}' not found in {script_id}")]
    CallableNotFound { script_id: ScriptId, entry: String },

    /// A stored parent reference points to a missing node or output
    #[error("Input '{input}' of node {node} refers to missing parent {parent}")]
    DanglingParent {
        node: NodeId,
        input: String,
        parent: String,
    },

    /// Writing or renaming a document failed; the original is untouched
    #[error("Failed to save {}: {message}", path.display())]
    SaveFailed { path: PathBuf, message: String },

    /// Errors related to Rhai script compilation
    #[error("Script error: {0}")]
    Script(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<NodezatorError>,
    },
}

impl NodezatorError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        NodezatorError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        NodezatorError::Script(err.to_string())
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &NodezatorError {
        match self {
            NodezatorError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for NodezatorError {
    fn from(err: serde_json::Error) -> Self {
        NodezatorError::Serialization(err.to_string())
    }
}

/// Result type alias for nodezator-rs operations
pub type Result<T> = std::result::Result<T, NodezatorError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| NodezatorError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| NodezatorError::from_rhai_error(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodezatorError::NodePackNotFound("math_pack".to_string());
        assert_eq!(err.to_string(), "Node pack not found: math_pack");
    }

    #[test]
    fn test_error_with_context() {
        let err = NodezatorError::DocumentParse("missing field `nodes`".to_string());
        let with_ctx = err.with_context("Failed to open graph.ndz");
        assert!(with_ctx.to_string().contains("Failed to open graph.ndz"));
        assert!(matches!(with_ctx.root(), NodezatorError::DocumentParse(_)));
    }

    #[test]
    fn test_graph_error_is_transparent() {
        let err: NodezatorError = GraphError::SameNode(NodeId(3)).into();
        assert_eq!(err.to_string(), GraphError::SameNode(NodeId(3)).to_string());
    }

    #[test]
    fn test_dangling_parent_message() {
        let err = NodezatorError::DanglingParent {
            node: NodeId(7),
            input: "a".to_string(),
            parent: "#2.output".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("#7"));
        assert!(msg.contains("#2.output"));
    }
}
