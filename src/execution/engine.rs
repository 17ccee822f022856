//! Value propagation and call engine
//!
//! Runs a plan node by node on the calling thread:
//! 1. Skip the node if a node it depends on did not pass.
//! 2. Resolve each input: parent value, widget value, declared default, or
//!    `MissingRequiredInput`.
//! 3. Marshal the values into positional and keyword arguments and bind them
//!    against the signature.
//! 4. Invoke the callable and store its outputs for downstream nodes.
//!
//! A failing node is recorded in the report and its dependents are skipped;
//! the run continues with the remaining nodes.

use super::plan::ExecutionPlan;
use super::planner::ExecutionPlanner;
use super::report::{AggregateStatus, ExecutionReport, NodeError, NodeStatus, SkipReason};
use super::stdout::StdoutBuffer;
use crate::config::ExecutionSettings;
use crate::graph::{
    Graph, GraphResult, InputSlot, Node, NodeId, NodeKind, OutputAddr, OutputSocket, VariadicKind,
    DEFAULT_OUTPUT, REDIRECT_INPUT,
};
use crate::nodepack::{CallArgs, CallContext, CallError, ParamKind, Parameter, Signature};
use crate::types::Value;
use chrono::Utc;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Outputs produced so far in this run
type OutputCache = IndexMap<NodeId, IndexMap<String, Value>>;

/// Cooperative cancellation flag, checked between nodes
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executes graphs; holds no state between runs
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    settings: ExecutionSettings,
}

impl ExecutionEngine {
    pub fn new(settings: ExecutionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Plan and run `triggers` (all leaf nodes when `None`)
    pub fn execute(&self, graph: &Graph, triggers: Option<&[NodeId]>) -> GraphResult<ExecutionReport> {
        self.execute_with_cancel(graph, triggers, &CancelToken::new())
    }

    pub fn execute_with_cancel(
        &self,
        graph: &Graph,
        triggers: Option<&[NodeId]>,
        cancel: &CancelToken,
    ) -> GraphResult<ExecutionReport> {
        let plan = ExecutionPlanner::plan(graph, triggers)?;
        Ok(self.run_plan(graph, plan, cancel))
    }

    /// Run an already computed plan
    pub fn run_plan(&self, graph: &Graph, plan: ExecutionPlan, cancel: &CancelToken) -> ExecutionReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let stdout = StdoutBuffer::new(self.settings.max_stdout_lines);

        let mut results: IndexMap<NodeId, NodeStatus> = IndexMap::new();
        let mut outputs: OutputCache = IndexMap::new();
        let mut errors = Vec::new();
        let mut cancelled = false;

        for &id in &plan.order {
            if cancelled || cancel.is_cancelled() {
                if !cancelled {
                    tracing::info!("Execution cancelled before node {}", id);
                }
                cancelled = true;
                results.insert(id, NodeStatus::Skipped(SkipReason::Cancelled));
                continue;
            }

            let Some(node) = graph.node(id) else {
                errors.push(NodeError {
                    node: id,
                    kind: "UnknownNode".to_string(),
                    message: format!("node {} is not in the graph", id),
                    traceback: Vec::new(),
                });
                results.insert(id, NodeStatus::Errored);
                continue;
            };

            if let Some(failed) = Self::failed_parent(graph, node, &results) {
                tracing::debug!("Skipping node {}: upstream node {} did not pass", id, failed);
                results.insert(id, NodeStatus::Skipped(SkipReason::UpstreamFailed { node: failed }));
                continue;
            }

            tracing::debug!("Running node {} ({})", id, node.label());
            let outcome = Self::run_node(graph, node, &outputs, &stdout);
            stdout.flush();

            match outcome {
                Ok(values) => {
                    outputs.insert(id, values);
                    results.insert(id, NodeStatus::Passed);
                }
                Err(error) => {
                    let error = NodeError::from_call_error(id, error);
                    tracing::warn!("Node {} failed: {}: {}", id, error.kind, error.message);
                    errors.push(error);
                    results.insert(id, NodeStatus::Errored);
                }
            }
        }

        let aggregate = if !errors.is_empty() {
            AggregateStatus::Errored
        } else if cancelled {
            AggregateStatus::Failed
        } else {
            AggregateStatus::Passed
        };

        let report = ExecutionReport {
            started_at,
            duration_us: start.elapsed().as_micros() as u64,
            plan,
            results,
            outputs,
            errors,
            stdout: stdout.lines(),
            stdout_dropped: stdout.dropped(),
            aggregate,
            cancelled,
        };

        tracing::info!(
            "Execution {}: {} passed, {} errored, {} skipped in {}us",
            report.aggregate,
            report.count(NodeStatus::is_passed),
            report.errors.len(),
            report.count(|s| matches!(s, NodeStatus::Skipped(_))),
            report.duration_us
        );

        report
    }

    /// Lowest-id executable parent that did not pass
    fn failed_parent(graph: &Graph, node: &Node, results: &IndexMap<NodeId, NodeStatus>) -> Option<NodeId> {
        graph
            .parent_nodes(node.id)
            .into_iter()
            .filter(|p| graph.node(*p).is_some_and(Node::is_executable))
            .find(|p| !results.get(p).is_some_and(NodeStatus::is_passed))
    }

    /// Value of an output, if its node is part of this run
    ///
    /// Links from commented-out nodes are treated as absent.
    fn parent_value(graph: &Graph, parent: &OutputAddr, outputs: &OutputCache) -> Option<Value> {
        if !graph.node(parent.node).is_some_and(Node::is_executable) {
            return None;
        }
        outputs.get(&parent.node)?.get(&parent.output).cloned()
    }

    fn run_node(
        graph: &Graph,
        node: &Node,
        outputs: &OutputCache,
        stdout: &StdoutBuffer,
    ) -> Result<IndexMap<String, Value>, CallError> {
        match &node.kind {
            NodeKind::ProxyData { value, .. } => Ok(single(DEFAULT_OUTPUT, value.clone())),
            NodeKind::ProxyRedirect => {
                let value = node
                    .parent_of(&crate::graph::InputKey::param(REDIRECT_INPUT))
                    .and_then(|p| Self::parent_value(graph, p, outputs))
                    .or_else(|| node.widget_values.get(REDIRECT_INPUT).cloned())
                    .unwrap_or_default();
                Ok(single(DEFAULT_OUTPUT, value))
            }
            NodeKind::Callable(definition) => {
                let args = Self::assemble(graph, node, &definition.signature, outputs)?;
                let bound = definition.signature.bind(args)?;
                let ctx = CallContext::new(node.id, stdout);
                let value = definition.callable.call(bound, &ctx)?;
                distribute(&definition.signature.outputs, value)
            }
            NodeKind::Operator(operation) => {
                let signature = operation.signature();
                let args = Self::assemble(graph, node, &signature, outputs)?;
                let bound = signature.bind(args)?;
                let value = operation.call(&bound)?;
                distribute(&signature.outputs, value)
            }
            NodeKind::TextBlock { .. } => Ok(IndexMap::new()),
        }
    }

    /// Resolve every parameter's value and marshal them into call arguments
    fn assemble(
        graph: &Graph,
        node: &Node,
        signature: &Signature,
        outputs: &OutputCache,
    ) -> Result<CallArgs, CallError> {
        let mut resolved: Vec<(&Parameter, Option<Value>)> = Vec::with_capacity(signature.params.len());

        for param in &signature.params {
            let widget = node.widget_values.get(&param.name).cloned();
            let value = match node.slot(&param.name) {
                Some(InputSlot::Single(socket)) => socket
                    .parent
                    .as_ref()
                    .and_then(|p| Self::parent_value(graph, p, outputs))
                    .or(widget),
                Some(InputSlot::Variadic(group)) => {
                    let connected: Vec<(String, Value)> = group
                        .subsockets
                        .iter()
                        .filter_map(|sub| {
                            let value = Self::parent_value(graph, sub.parent.as_ref()?, outputs)?;
                            let name = sub
                                .keyword
                                .clone()
                                .unwrap_or_else(|| format!("{}_{}", group.param, sub.ordinal));
                            Some((name, value))
                        })
                        .collect();

                    if connected.is_empty() {
                        widget
                    } else {
                        Some(match group.kind {
                            VariadicKind::Positional => {
                                Value::List(connected.into_iter().map(|(_, v)| v).collect())
                            }
                            VariadicKind::Keyword => Value::Map(connected.into_iter().collect()),
                        })
                    }
                }
                None => widget,
            };

            if value.is_none() && !param.has_default() && !param.kind.is_variadic() {
                return Err(CallError::new(
                    "MissingRequiredInput",
                    format!(
                        "input '{}' of node {} has no parent, widget value or default",
                        param.name, node.id
                    ),
                ));
            }
            resolved.push((param, value));
        }

        Ok(marshal(resolved))
    }
}

/// Split resolved values into positional and keyword arguments
///
/// Positional-or-keyword parameters go by keyword unless the var-positional
/// group has values, in which case they must be passed positionally ahead of
/// it. Omitted positional values followed by given ones, including any
/// var-positional values, are filled with their declared default.
fn marshal(resolved: Vec<(&Parameter, Option<Value>)>) -> CallArgs {
    let var_positional_given = resolved.iter().any(|(p, v)| {
        p.kind == ParamKind::VarPositional && v.as_ref().and_then(Value::as_list).is_some_and(|l| !l.is_empty())
    });

    let mut args = CallArgs::new();
    let mut positional: Vec<(&Parameter, Option<Value>)> = Vec::new();
    let mut extra = Vec::new();

    for (param, value) in resolved {
        match param.kind {
            ParamKind::PositionalOnly => positional.push((param, value)),
            ParamKind::PositionalOrKeyword if var_positional_given => positional.push((param, value)),
            ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly => {
                if let Some(value) = value {
                    args.set(param.name.clone(), value);
                }
            }
            ParamKind::VarPositional => match value {
                Some(Value::List(items)) => extra = items,
                Some(other) => extra = vec![other],
                None => {}
            },
            ParamKind::VarKeyword => {
                if let Some(Value::Map(entries)) = value {
                    for (key, value) in entries {
                        args.set(key, value);
                    }
                }
            }
        }
    }

    // Trailing omissions may only be dropped when nothing follows them
    if extra.is_empty() {
        while matches!(positional.last(), Some((_, None))) {
            positional.pop();
        }
    }
    for (param, value) in positional {
        args.push(value.or_else(|| param.default.clone()).unwrap_or_default());
    }
    for value in extra {
        args.push(value);
    }
    args
}

fn single(name: &str, value: Value) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    map.insert(name.to_string(), value);
    map
}

/// Map a callable's return value onto its declared outputs
fn distribute(declared: &[OutputSocket], value: Value) -> Result<IndexMap<String, Value>, CallError> {
    if declared.len() <= 1 {
        let name = declared.first().map_or(DEFAULT_OUTPUT, |o| o.name.as_str());
        return Ok(single(name, value));
    }

    let names: Vec<&str> = declared.iter().map(|o| o.name.as_str()).collect();
    let Value::Map(mut returned) = value else {
        return Err(CallError::new(
            "OutputMismatch",
            format!(
                "expected a dict with outputs {}, got {}",
                names.join(", "),
                value.type_name()
            ),
        ));
    };

    let mut values = IndexMap::new();
    for name in names {
        let value = returned.shift_remove(name).ok_or_else(|| {
            CallError::new("OutputMismatch", format!("returned dict is missing output '{}'", name))
        })?;
        values.insert(name.to_string(), value);
    }
    Ok(values)
}
