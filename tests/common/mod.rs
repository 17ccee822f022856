//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use nodezator_rs::graph::{InputAddr, OutputAddr, DEFAULT_OUTPUT};
use nodezator_rs::NodeId;

/// Default output of `id`
pub fn out(id: NodeId) -> OutputAddr {
    OutputAddr::new(id, DEFAULT_OUTPUT)
}

/// Input `param` of `id`
pub fn input(id: NodeId, param: &str) -> InputAddr {
    InputAddr::param(id, param)
}

/// Compare two JSON documents ignoring whitespace and key order
pub fn assert_json_eq(a: &str, b: &str) {
    let a: serde_json::Value = serde_json::from_str(a).expect("left side is not JSON");
    let b: serde_json::Value = serde_json::from_str(b).expect("right side is not JSON");
    assert_eq!(a, b);
}
