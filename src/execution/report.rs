//! Execution results
//!
//! Node failures never abort an execution; each node ends up with a
//! [`NodeStatus`] and failures are collected as [`NodeError`]s.

use super::plan::ExecutionPlan;
use crate::graph::NodeId;
use crate::nodepack::CallError;
use crate::types::Value;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Why a planned node did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A node it depends on errored or was skipped
    UpstreamFailed { node: NodeId },
    /// The execution was cancelled before reaching it
    Cancelled,
}

/// Outcome of one planned node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Ran to completion; reported as `executed`
    #[serde(rename = "executed")]
    Passed,
    Errored,
    Skipped(SkipReason),
}

impl NodeStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, NodeStatus::Passed)
    }
}

/// Overall outcome of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    /// Every planned node ran without error
    Passed,
    /// The run was cancelled before every planned node ran
    Failed,
    /// At least one node errored
    Errored,
}

impl fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateStatus::Passed => "passed",
            AggregateStatus::Failed => "failed",
            AggregateStatus::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// A failure raised while running one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeError {
    pub node: NodeId,
    /// Error class, e.g. `TypeError` or `MissingRequiredInput`
    pub kind: String,
    pub message: String,
    /// Outermost frame first
    pub traceback: Vec<String>,
}

impl NodeError {
    pub fn from_call_error(node: NodeId, error: CallError) -> Self {
        Self {
            node,
            kind: error.kind,
            message: error.message,
            traceback: error.traceback,
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}: {}: {}", self.node, self.kind, self.message)
    }
}

/// Everything an execution produced
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,

    /// Wall time of the run in microseconds
    pub duration_us: u64,

    pub plan: ExecutionPlan,

    /// Status per planned node, in plan order
    pub results: IndexMap<NodeId, NodeStatus>,

    /// Output values per node that passed, keyed by output name
    pub outputs: IndexMap<NodeId, IndexMap<String, Value>>,

    pub errors: Vec<NodeError>,

    /// Captured stdout lines, oldest first
    pub stdout: Vec<String>,

    /// Lines dropped from the front of `stdout` once the buffer was full
    pub stdout_dropped: usize,

    pub aggregate: AggregateStatus,

    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn status(&self, node: NodeId) -> Option<NodeStatus> {
        self.results.get(&node).copied()
    }

    /// Value of one output of a node that passed
    pub fn output(&self, node: NodeId, name: &str) -> Option<&Value> {
        self.outputs.get(&node)?.get(name)
    }

    pub fn is_passed(&self) -> bool {
        self.aggregate == AggregateStatus::Passed
    }

    /// Number of nodes with the given status
    pub fn count(&self, pred: impl Fn(&NodeStatus) -> bool) -> usize {
        self.results.values().filter(|s| pred(s)).count()
    }
}

/// Errors recorded by an execution, in the order they happened
pub fn iter_errors(report: &ExecutionReport) -> impl Iterator<Item = &NodeError> {
    report.errors.iter()
}

/// Captured stdout lines, oldest first
pub fn iter_stdout(report: &ExecutionReport) -> impl Iterator<Item = &str> {
    report.stdout.iter().map(String::as_str)
}
