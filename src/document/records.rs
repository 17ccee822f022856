//! On-disk records of a `.ndz` document
//!
//! ```json
//! {
//!   "node_packs": [{"installed": "math"}],
//!   "nodes": [
//!     {"id": 0, "script_id": ["math", "arith", "add"], "midtop": [120.0, 80.0],
//!      "mode": "expanded_signature", "param_widget_values": {"b": 4},
//!      "parents": {"a": [3, "output"]}}
//!   ],
//!   "text_blocks": [{"id": 5, "text": "notes", "midtop": [0.0, 0.0]}],
//!   "scrolling_amount": [0.0, 0.0]
//! }
//! ```

use crate::graph::{DisplayMode, NodeId, SocketType, WidgetSpec};
use crate::nodepack::{NodePackRef, ScriptId};
use crate::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// A whole document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentFile {
    #[serde(default)]
    pub node_packs: Vec<NodePackRef>,

    #[serde(default)]
    pub nodes: Vec<NodeRecord>,

    #[serde(default)]
    pub text_blocks: Vec<TextBlockRecord>,

    /// Viewport offset
    #[serde(default)]
    pub scrolling_amount: [f32; 2],
}

/// `[source_node_id, output_name]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef(pub NodeId, pub String);

/// One materialized sub-socket of a variadic parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubparamRecord {
    pub ordinal: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyKind {
    Data,
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRecord {
    pub kind: ProxyKind,

    #[serde(default)]
    pub socket_type: SocketType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetSpec>,
}

/// A callable, operator or proxy node
///
/// Exactly one of `script_id`, `operation_id` and `proxy` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<ScriptId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyRecord>,

    #[serde(default)]
    pub midtop: [f32; 2],

    #[serde(default)]
    pub mode: DisplayMode,

    #[serde(default, skip_serializing_if = "is_false")]
    pub commented_out: bool,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub param_widget_values: IndexMap<String, Value>,

    /// Input name -> parent output
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parents: IndexMap<String, ParentRef>,

    /// Variadic parameter -> its sub-sockets
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub subparam_parents: IndexMap<String, Vec<SubparamRecord>>,
}

impl NodeRecord {
    /// A record with only the identity fields set
    pub fn new(id: NodeId, midtop: [f32; 2]) -> Self {
        Self {
            id,
            script_id: None,
            operation_id: None,
            proxy: None,
            midtop,
            mode: DisplayMode::default(),
            commented_out: false,
            param_widget_values: IndexMap::new(),
            parents: IndexMap::new(),
            subparam_parents: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlockRecord {
    pub id: NodeId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub midtop: [f32; 2],
}
