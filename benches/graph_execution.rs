//! Benchmarks for planning and executing node graphs
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nodezator_rs::execution::{ExecutionEngine, ExecutionPlanner};
use nodezator_rs::graph::{InputAddr, OutputAddr, DEFAULT_OUTPUT};
use nodezator_rs::{Graph, NodeId, Value};

/// data(1) -> add -> add -> ... with every `b` fed by the same constant
fn chain(len: usize) -> (Graph, NodeId) {
    let mut graph = Graph::new();
    let one = graph.add_data("int", Value::Int(1), None, [0.0, 0.0]);
    let mut last = one;
    for i in 0..len {
        let add = graph
            .add_operator("add", [(i + 1) as f32 * 240.0, 0.0])
            .expect("add is a built-in operation");
        graph
            .connect(&OutputAddr::new(last, DEFAULT_OUTPUT), &InputAddr::param(add, "a"))
            .expect("chain link");
        graph
            .connect(&OutputAddr::new(one, DEFAULT_OUTPUT), &InputAddr::param(add, "b"))
            .expect("constant link");
        last = add;
    }
    (graph, last)
}

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");

    for size in [100, 1_000, 5_000].iter() {
        let (graph, _) = chain(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| ExecutionPlanner::plan(black_box(graph), None))
        });
    }

    group.finish();
}

fn bench_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution");
    let engine = ExecutionEngine::default();

    for size in [100, 1_000].iter() {
        let (graph, last) = chain(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| {
                let report = engine.execute(black_box(graph), Some(&[last])).expect("plan");
                black_box(report.output(last, DEFAULT_OUTPUT).cloned())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_planning, bench_execution);
criterion_main!(benches);
