//! Execution planning and the call engine
//!
//! [`ExecutionPlanner`] turns a graph and a trigger set into an
//! [`ExecutionPlan`]; [`ExecutionEngine`] runs the plan and produces an
//! [`ExecutionReport`].

pub mod engine;
pub mod plan;
pub mod planner;
pub mod report;
pub mod stdout;

pub use engine::{CancelToken, ExecutionEngine};
pub use plan::{ExecutionPlan, PlanStats};
pub use planner::ExecutionPlanner;
pub use report::{iter_errors, iter_stdout, AggregateStatus, ExecutionReport, NodeError, NodeStatus, SkipReason};
pub use stdout::StdoutBuffer;
