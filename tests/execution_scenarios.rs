//! End-to-end execution scenarios
//!
//! Each test builds a small graph, executes it and checks the report:
//! - Two-node addition
//! - Missing input
//! - Errored dependency cascade
//! - Cycle rejection
//! - Variadic expansion
//! - Commented-out bypass

mod common;

use common::builders::{test_library, GraphBuilder};
use common::{input, out};
use nodezator_rs::execution::{ExecutionEngine, SkipReason};
use nodezator_rs::{
    execute, iter_errors, iter_stdout, AggregateStatus, Graph, GraphError, NodeStatus, Value,
};

#[test]
fn test_two_node_addition() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let a = builder.data(3);
    let b = builder.data(4);
    let add = builder.op("add");
    builder.link(a, add, "a");
    builder.link(b, add, "b");
    let graph = builder.build();

    let report = execute(&graph, None).unwrap();

    assert_eq!(report.output(add, "output"), Some(&Value::Int(7)));
    assert_eq!(report.aggregate, AggregateStatus::Passed);
    assert_eq!(report.plan.order, vec![a, b, add]);
}

#[test]
fn test_missing_input() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let add = builder.op("add");
    let graph = builder.build();

    let report = execute(&graph, None).unwrap();

    assert_eq!(report.status(add), Some(NodeStatus::Errored));
    let errors: Vec<_> = iter_errors(&report).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, "MissingRequiredInput");
    assert_eq!(report.aggregate, AggregateStatus::Errored);
}

#[test]
fn test_errored_dependency_cascade() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let x = builder.callable("raise");
    let y = builder.callable("identity");
    builder.link(x, y, "x");
    let c = builder.data(5);
    let z = builder.callable("identity");
    builder.link(c, z, "x");
    let graph = builder.build();

    let report = execute(&graph, Some(&[y, z])).unwrap();

    assert_eq!(report.status(x), Some(NodeStatus::Errored));
    assert_eq!(
        report.status(y),
        Some(NodeStatus::Skipped(SkipReason::UpstreamFailed { node: x }))
    );
    assert_eq!(report.status(z), Some(NodeStatus::Passed));
    assert_eq!(report.output(z, "output"), Some(&Value::Int(5)));
    assert_eq!(report.aggregate, AggregateStatus::Errored);

    let error = iter_errors(&report).next().unwrap();
    assert_eq!(error.node, x);
    assert_eq!(error.kind, "ValueError");
    assert_eq!(error.message, "boom");
}

#[test]
fn test_cycle_rejection() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let n1 = builder.op("add");
    let n2 = builder.op("neg");
    builder.link(n1, n2, "a");
    let mut graph = builder.build();
    let before = graph.segments();

    let result = graph.connect(&out(n2), &input(n1, "b"));

    assert!(matches!(result, Err(GraphError::WouldIntroduceCycle { .. })));
    assert_eq!(graph.segments(), before);
}

#[test]
fn test_variadic_expansion() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let a = builder.data("a");
    let b = builder.data("b");
    let c = builder.data("c");
    let concat = builder.callable("concat");
    let first = builder.link(a, concat, "parts");
    let second = builder.link(b, concat, "parts");
    let third = builder.link(c, concat, "parts");
    let graph = builder.build();

    assert_eq!(
        [first, second, third].map(|addr| addr.to_string()),
        ["#3.parts[0]", "#3.parts[1]", "#3.parts[2]"]
    );

    let report = execute(&graph, None).unwrap();
    assert_eq!(report.output(concat, "output"), Some(&Value::Str("abc".into())));
    assert!(report.is_passed());
}

#[test]
fn test_commented_out_bypass() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let a = builder.data(10);
    let square = builder.callable("square");
    let double = builder.callable("double");
    builder.link(a, square, "x");
    builder.link(square, double, "x");
    let mut graph = builder.build();

    graph.set_commented_out(square, true).unwrap();
    let report = execute(&graph, Some(&[double])).unwrap();
    assert_eq!(report.status(double), Some(NodeStatus::Errored));
    assert_eq!(report.errors[0].kind, "MissingRequiredInput");
    assert_eq!(report.aggregate, AggregateStatus::Errored);
    assert!(report.status(square).is_none());

    graph.set_commented_out(square, false).unwrap();
    let report = execute(&graph, Some(&[double])).unwrap();
    assert_eq!(report.output(double, "output"), Some(&Value::Int(200)));
    assert!(report.is_passed());
}

#[test]
fn test_empty_graph_passes() {
    let report = execute(&Graph::new(), None).unwrap();
    assert!(report.results.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(report.aggregate, AggregateStatus::Passed);
}

#[test]
fn test_reexecution_is_deterministic() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let a = builder.data(3);
    let b = builder.data(2.5);
    let mul = builder.op("mul");
    let shout = builder.callable("shout");
    builder.link(a, mul, "a");
    builder.link(b, mul, "b");
    builder.link(mul, shout, "x");
    let graph = builder.build();

    let engine = ExecutionEngine::default();
    let first = engine.execute(&graph, None).unwrap();
    let second = engine.execute(&graph, None).unwrap();

    assert_eq!(first.outputs, second.outputs);
    assert_eq!(first.plan.order, second.plan.order);
    assert_eq!(iter_stdout(&first).collect::<Vec<_>>(), vec!["7.5"]);
    assert_eq!(first.output(shout, "output"), Some(&Value::Float(7.5)));
}

#[test]
fn test_comment_toggle_leaves_behaviour_unchanged() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let a = builder.data(4);
    let square = builder.callable("square");
    builder.link(a, square, "x");
    let mut graph = builder.build();

    let before = execute(&graph, None).unwrap();
    graph.set_commented_out(square, true).unwrap();
    graph.set_commented_out(square, false).unwrap();
    let after = execute(&graph, None).unwrap();

    assert_eq!(before.outputs, after.outputs);
    assert_eq!(before.results, after.results);
}

#[test]
fn test_default_kept_ahead_of_variadic_values() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let one = builder.data(1);
    let three = builder.data(3);
    let four = builder.data(4);
    let echo = builder.callable("echo");
    builder.link(one, echo, "a");
    builder.link(three, echo, "rest");
    builder.link(four, echo, "rest");
    let graph = builder.build();

    let report = execute(&graph, None).unwrap();

    assert!(report.is_passed());
    assert_eq!(
        report.output(echo, "output"),
        Some(&Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::List(vec![Value::Int(3), Value::Int(4)]),
        ]))
    );
}

#[test]
fn test_operator_failure_does_not_abort_the_run() {
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let text = builder.data("abc");
    let times = builder.data(i64::MAX);
    let mul = builder.op("mul");
    builder.link(text, mul, "a");
    builder.link(times, mul, "b");
    let shout = builder.callable("shout");
    builder.link(mul, shout, "x");
    let other = builder.data(5);
    let double = builder.callable("double");
    builder.link(other, double, "x");
    let graph = builder.build();

    let report = execute(&graph, None).unwrap();

    assert_eq!(report.status(mul), Some(NodeStatus::Errored));
    assert_eq!(
        report.status(shout),
        Some(NodeStatus::Skipped(SkipReason::UpstreamFailed { node: mul }))
    );
    assert_eq!(report.output(double, "output"), Some(&Value::Int(10)));
    assert_eq!(iter_errors(&report).next().unwrap().kind, "OverflowError");
    assert_eq!(report.aggregate, AggregateStatus::Errored);
}
