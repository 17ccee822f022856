//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{script_id, test_library, GraphBuilder};
use nodezator_rs::graph::DEFAULT_OUTPUT;

#[test]
fn test_infrastructure_setup() {
    // Test that builders work
    let library = test_library();
    let mut builder = GraphBuilder::new(&library);
    let a = builder.data(1);
    let square = builder.callable("square");
    let linked = builder.link(a, square, "x");
    let graph = builder.build();

    assert_eq!(graph.len(), 2);
    assert_eq!(linked, common::input(square, "x"));
    assert_eq!(graph.parent_of(&linked), Some(&common::out(a)));
    assert_eq!(
        graph.get(square).unwrap().script_id(),
        Some(&script_id("square"))
    );
    assert_eq!(graph.get(a).unwrap().outputs[0].name, DEFAULT_OUTPUT);
}

#[test]
fn test_json_comparison_ignores_layout() {
    common::assert_json_eq(r#"{"a": 1, "b": [1, 2]}"#, "{\"b\":[1,2],\n\"a\":1}");
}

#[test]
#[should_panic]
fn test_json_comparison_fails() {
    common::assert_json_eq(r#"{"a": 1}"#, r#"{"a": 2}"#);
}
