//! Identity types for the graph model.
//!
//! Nodes live in an arena keyed by [`NodeId`]; sockets are addressed by
//! `(node, key)` pairs rather than by reference, so parent/child links are
//! plain values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a node in [`Graph`](super::Graph). Ids are unique within a document
/// and never reused while the node exists.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key of an input socket within its node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputKey {
    /// A regular parameter socket, or the placeholder of a variadic group
    Param(String),
    /// A materialized sub-socket of a variadic group
    Sub { param: String, ordinal: u32 },
}

impl InputKey {
    pub fn param(name: impl Into<String>) -> Self {
        InputKey::Param(name.into())
    }

    /// Parameter this socket belongs to
    pub fn param_name(&self) -> &str {
        match self {
            InputKey::Param(name) => name,
            InputKey::Sub { param, .. } => param,
        }
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKey::Param(name) => write!(f, "{}", name),
            InputKey::Sub { param, ordinal } => write!(f, "{}[{}]", param, ordinal),
        }
    }
}

/// Address of an input socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputAddr {
    pub node: NodeId,
    pub key: InputKey,
}

impl InputAddr {
    pub fn new(node: NodeId, key: InputKey) -> Self {
        Self { node, key }
    }

    pub fn param(node: NodeId, name: impl Into<String>) -> Self {
        Self::new(node, InputKey::Param(name.into()))
    }

    pub fn sub(node: NodeId, param: impl Into<String>, ordinal: u32) -> Self {
        Self::new(
            node,
            InputKey::Sub {
                param: param.into(),
                ordinal,
            },
        )
    }
}

impl fmt::Display for InputAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.key)
    }
}

/// Address of an output socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputAddr {
    pub node: NodeId,
    pub output: String,
}

impl OutputAddr {
    pub fn new(node: NodeId, output: impl Into<String>) -> Self {
        Self {
            node,
            output: output.into(),
        }
    }
}

impl fmt::Display for OutputAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_ordering() {
        let mut ids = vec![NodeId(3), NodeId(1), NodeId(2)];
        ids.sort();
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn test_node_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&NodeId(12)).unwrap(), "12");
    }

    #[test]
    fn test_addr_display() {
        assert_eq!(InputAddr::sub(NodeId(4), "parts", 2).to_string(), "#4.parts[2]");
        assert_eq!(OutputAddr::new(NodeId(1), "output").to_string(), "#1.output");
    }
}
