use crate::graph::NodeId;
use serde::Serialize;

/// Ordered list of nodes one execution will run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionPlan {
    /// Nodes in topological order, lowest id first among ready nodes
    pub order: Vec<NodeId>,

    /// Trigger nodes the plan was built from
    pub triggers: Vec<NodeId>,

    /// Planning statistics
    pub stats: PlanStats,
}

/// Statistics about a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanStats {
    /// Total number of nodes in the graph, text blocks included
    pub total_nodes: usize,

    /// Number of nodes in the plan
    pub planned_nodes: usize,

    /// Number of commented-out nodes in the graph
    pub commented_nodes: usize,

    pub trigger_count: usize,

    /// Planning time in microseconds
    pub plan_time_us: u64,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.order.contains(&id)
    }

    /// Position of `id` in the execution order
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|n| *n == id)
    }
}
