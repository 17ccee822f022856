//! # nodezator-rs: graph execution core for a visual node editor
//!
//! Documents are graphs of nodes wired output-to-input. Nodes run callables
//! from node packs (Rhai scripts, or Rust functions registered directly),
//! built-in operators, or are proxies and text annotations. This crate owns
//! the graph, its persistence and its execution; rendering is left to the
//! editor embedding it.
//!
//! ## Architecture
//!
//! - **Graph**: node arena, sockets, segment editing and validation
//! - **Node packs**: script loading and the [`NodeLibrary`] of definitions
//! - **Execution**: planning in dependency order and per-node result capture
//! - **Document**: JSON records, atomic saves, backups and swap files
//! - **Config**: app state and settings in the platform data directory
//!
//! ## Example
//!
//! ```ignore
//! use nodezator_rs::{execute, iter_errors, load_document, NodeLibrary};
//! use std::path::Path;
//!
//! fn main() -> nodezator_rs::Result<()> {
//!     let mut library = NodeLibrary::new();
//!     let graph = load_document(Path::new("graph.ndz"), &mut library)?;
//!
//!     let report = execute(&graph, None)?;
//!     println!("{}", report.aggregate);
//!     for error in iter_errors(&report) {
//!         eprintln!("{}", error);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod execution;
pub mod graph;
pub mod nodepack;
pub mod scripting;
pub mod types;

// Re-export commonly used types
pub use config::{AppState, Settings};
pub use document::{DocumentFile, DocumentStore, SwapChoice, SwapResolver};
pub use error::{NodezatorError, Result, ResultExt};
pub use execution::{
    iter_errors, iter_stdout, AggregateStatus, CancelToken, ExecutionEngine, ExecutionPlanner,
    ExecutionReport, NodeError, NodeStatus,
};
pub use graph::{Graph, GraphError, GraphResult, InputAddr, NodeId, OutputAddr};
pub use nodepack::{NodeLibrary, NodePackRef, ScriptId};
pub use scripting::ScriptEngine;
pub use types::Value;

use std::path::Path;

/// Load a document with default persistence settings
///
/// The document's node packs are loaded into `library` first.
pub fn load_document(path: &Path, library: &mut NodeLibrary) -> Result<Graph> {
    DocumentStore::default().load(path, library)
}

/// Save a document atomically with default persistence settings
pub fn save_document(graph: &Graph, path: &Path) -> Result<()> {
    DocumentStore::default().save(graph, path)
}

/// Run `triggers` (or every leaf node) with default execution settings
pub fn execute(graph: &Graph, triggers: Option<&[NodeId]>) -> GraphResult<ExecutionReport> {
    ExecutionEngine::default().execute(graph, triggers)
}
