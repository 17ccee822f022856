use super::plan::{ExecutionPlan, PlanStats};
use crate::graph::{Graph, GraphError, GraphResult, NodeId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// Builds execution plans from a graph and a trigger set
pub struct ExecutionPlanner;

impl ExecutionPlanner {
    /// Plan the execution of `triggers` and everything they depend on.
    ///
    /// Commented-out nodes and text blocks are treated as absent: the
    /// upstream search stops at them. With no triggers (or an empty list),
    /// every executable node without executable children is a trigger.
    ///
    /// # Errors
    /// * `UnknownNode` - a trigger id is not in the graph
    /// * `NoExecutableNodes` - every explicit trigger is commented out or a text block
    /// * `CycleDetected` - the dependency graph is not acyclic
    pub fn plan(graph: &Graph, triggers: Option<&[NodeId]>) -> GraphResult<ExecutionPlan> {
        let start_time = std::time::Instant::now();

        let triggers = Self::resolve_triggers(graph, triggers)?;

        // Reverse DFS over parent links
        let included = Self::upstream_closure(graph, &triggers);

        // Kahn's algorithm, lowest id first
        let order = Self::topological_sort(graph, &included)?;

        let stats = PlanStats {
            total_nodes: graph.len(),
            planned_nodes: order.len(),
            commented_nodes: graph.nodes().filter(|n| n.commented_out).count(),
            trigger_count: triggers.len(),
            plan_time_us: start_time.elapsed().as_micros() as u64,
        };

        tracing::info!(
            "Planned {} of {} nodes from {} triggers in {}us",
            stats.planned_nodes,
            stats.total_nodes,
            stats.trigger_count,
            stats.plan_time_us
        );

        Ok(ExecutionPlan {
            order,
            triggers,
            stats,
        })
    }

    fn is_executable(graph: &Graph, id: NodeId) -> bool {
        graph.node(id).is_some_and(|n| n.is_executable())
    }

    fn resolve_triggers(graph: &Graph, triggers: Option<&[NodeId]>) -> GraphResult<Vec<NodeId>> {
        match triggers {
            Some(ids) if !ids.is_empty() => {
                for id in ids {
                    graph.get(*id)?;
                }
                let executable: BTreeSet<NodeId> = ids
                    .iter()
                    .copied()
                    .filter(|id| Self::is_executable(graph, *id))
                    .collect();
                if executable.is_empty() {
                    return Err(GraphError::NoExecutableNodes);
                }
                Ok(executable.into_iter().collect())
            }
            _ => {
                // Nodes feeding an executable child are not triggers
                let mut has_children = BTreeSet::new();
                for node in graph.nodes().filter(|n| n.is_executable()) {
                    has_children.extend(graph.parent_nodes(node.id));
                }
                Ok(graph
                    .nodes()
                    .filter(|n| n.is_executable() && !has_children.contains(&n.id))
                    .map(|n| n.id)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect())
            }
        }
    }

    fn upstream_closure(graph: &Graph, triggers: &[NodeId]) -> BTreeSet<NodeId> {
        let mut included = BTreeSet::new();
        let mut stack: Vec<NodeId> = triggers.to_vec();

        while let Some(id) = stack.pop() {
            if !included.insert(id) {
                continue;
            }
            for parent in graph.parent_nodes(id) {
                if Self::is_executable(graph, parent) && !included.contains(&parent) {
                    stack.push(parent);
                }
            }
        }

        included
    }

    fn topological_sort(graph: &Graph, included: &BTreeSet<NodeId>) -> GraphResult<Vec<NodeId>> {
        let mut in_degree: BTreeMap<NodeId, usize> = included.iter().map(|id| (*id, 0)).collect();
        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();

        for &id in included {
            for parent in graph.parent_nodes(id) {
                if included.contains(&parent) {
                    children.entry(parent).or_default().push(id);
                    *in_degree.entry(id).or_default() += 1;
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();
        let mut order = Vec::with_capacity(included.len());

        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for child in children.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(*child));
                    }
                }
            }
        }

        if order.len() != included.len() {
            tracing::error!(
                "Cycle detected while planning: {} of {} nodes ordered",
                order.len(),
                included.len()
            );
            return Err(GraphError::CycleDetected);
        }

        Ok(order)
    }
}
