//! Graph nodes
//!
//! Every node kind shares one [`Node`] struct: its sockets, widget values and
//! editor metadata. What the node *does* is the [`NodeKind`] variant.
//!
//! - **Callable**: runs a node-pack callable; sockets come from its signature
//! - **ProxyData**: a constant with a single `output`
//! - **ProxyRedirect**: passes `input` through to `output`
//! - **Operator**: a built-in operation from [`operators`](super::operators)
//! - **TextBlock**: inert annotation, no sockets, never executed

use super::id::{InputKey, NodeId, OutputAddr};
use super::operators::Operation;
use super::socket::{InputSlot, InputSocket, OutputSocket, SocketKind, VariadicGroup, VariadicKind};
use super::socket_type::SocketType;
use super::widget::WidgetSpec;
use super::{DEFAULT_OUTPUT, REDIRECT_INPUT};
use crate::nodepack::{NodeDefinition, ParamKind, ScriptId, Signature};
use crate::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// How a callable node presents its signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    CollapsedSignature,
    /// The only mode that exposes variadic placeholders
    #[default]
    ExpandedSignature,
    CallableMode,
}

/// What a node does when executed
#[derive(Debug, Clone)]
pub enum NodeKind {
    Callable(Arc<NodeDefinition>),
    ProxyData {
        value: Value,
        widget: Option<WidgetSpec>,
    },
    ProxyRedirect,
    Operator(&'static Operation),
    TextBlock {
        text: String,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Callable(_) => "callable",
            NodeKind::ProxyData { .. } => "proxy_data",
            NodeKind::ProxyRedirect => "proxy_redirect",
            NodeKind::Operator(_) => "operator",
            NodeKind::TextBlock { .. } => "text_block",
        }
    }
}

/// A node and the sockets it owns
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<OutputSocket>,
    /// Per-parameter values used when an input has no parent
    pub widget_values: IndexMap<String, Value>,
    /// Widget configuration per parameter, from the signature
    pub widgets: IndexMap<String, WidgetSpec>,
    pub mode: DisplayMode,
    pub commented_out: bool,
    pub midtop: [f32; 2],
}

impl Node {
    fn bare(id: NodeId, kind: NodeKind, midtop: [f32; 2]) -> Self {
        Self {
            id,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            widget_values: IndexMap::new(),
            widgets: IndexMap::new(),
            mode: DisplayMode::default(),
            commented_out: false,
            midtop,
        }
    }

    /// Build the sockets of a signature-driven node
    fn with_signature(mut self, signature: &Signature) -> Self {
        for param in &signature.params {
            let slot = match param.kind {
                ParamKind::VarPositional => InputSlot::Variadic(VariadicGroup::new(
                    &param.name,
                    VariadicKind::Positional,
                    param.socket_type.clone(),
                )),
                ParamKind::VarKeyword => InputSlot::Variadic(VariadicGroup::new(
                    &param.name,
                    VariadicKind::Keyword,
                    param.socket_type.clone(),
                )),
                _ => InputSlot::Single(InputSocket::new(&param.name, param.socket_type.clone())),
            };
            self.inputs.push(slot);

            if let Some(widget) = &param.widget {
                self.widgets.insert(param.name.clone(), widget.clone());
                if let Some(default) = &param.default {
                    self.widget_values.insert(param.name.clone(), default.clone());
                }
            }
        }
        self.outputs = signature.outputs.clone();
        self
    }

    pub fn callable(id: NodeId, definition: Arc<NodeDefinition>, midtop: [f32; 2]) -> Self {
        let signature = definition.signature.clone();
        Self::bare(id, NodeKind::Callable(definition), midtop).with_signature(&signature)
    }

    pub fn operator(id: NodeId, operation: &'static Operation, midtop: [f32; 2]) -> Self {
        Self::bare(id, NodeKind::Operator(operation), midtop).with_signature(&operation.signature())
    }

    pub fn data(
        id: NodeId,
        socket_type: SocketType,
        value: Value,
        widget: Option<WidgetSpec>,
        midtop: [f32; 2],
    ) -> Self {
        let mut node = Self::bare(id, NodeKind::ProxyData { value, widget }, midtop);
        node.outputs.push(OutputSocket::new(DEFAULT_OUTPUT, socket_type));
        node
    }

    pub fn redirect(id: NodeId, socket_type: SocketType, midtop: [f32; 2]) -> Self {
        let mut node = Self::bare(id, NodeKind::ProxyRedirect, midtop);
        node.inputs
            .push(InputSlot::Single(InputSocket::new(REDIRECT_INPUT, socket_type.clone())));
        node.outputs.push(OutputSocket::new(DEFAULT_OUTPUT, socket_type));
        node
    }

    pub fn text_block(id: NodeId, text: impl Into<String>, midtop: [f32; 2]) -> Self {
        Self::bare(id, NodeKind::TextBlock { text: text.into() }, midtop)
    }

    /// Signature arguments are bound against, for callable and operator nodes
    pub fn signature(&self) -> Option<Cow<'_, Signature>> {
        match &self.kind {
            NodeKind::Callable(def) => Some(Cow::Borrowed(&def.signature)),
            NodeKind::Operator(op) => Some(Cow::Owned(op.signature())),
            _ => None,
        }
    }

    pub fn script_id(&self) -> Option<&ScriptId> {
        match &self.kind {
            NodeKind::Callable(def) => Some(&def.script_id),
            _ => None,
        }
    }

    /// Human-readable title
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Callable(def) => def.label.clone(),
            NodeKind::Operator(op) => op.symbol.to_string(),
            NodeKind::ProxyData { .. } => "data".to_string(),
            NodeKind::ProxyRedirect => "redirect".to_string(),
            NodeKind::TextBlock { .. } => "text".to_string(),
        }
    }

    pub fn is_text_block(&self) -> bool {
        matches!(self.kind, NodeKind::TextBlock { .. })
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, NodeKind::ProxyData { .. } | NodeKind::ProxyRedirect)
    }

    /// Whether the planner may schedule this node
    pub fn is_executable(&self) -> bool {
        !self.commented_out && !self.is_text_block()
    }

    /// Kind reported for this node's sockets
    pub fn socket_kind(&self, input: bool) -> SocketKind {
        match (self.is_proxy(), input) {
            (true, _) => SocketKind::Proxy,
            (false, true) => SocketKind::Input,
            (false, false) => SocketKind::Output,
        }
    }

    /// Whether variadic groups currently offer a placeholder to connect to
    pub fn exposes_placeholders(&self) -> bool {
        match self.kind {
            NodeKind::Callable(_) => self.mode == DisplayMode::ExpandedSignature,
            NodeKind::Operator(_) => true,
            _ => false,
        }
    }

    pub fn slot(&self, param: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|s| s.param() == param)
    }

    pub fn slot_mut(&mut self, param: &str) -> Option<&mut InputSlot> {
        self.inputs.iter_mut().find(|s| s.param() == param)
    }

    pub fn output(&self, name: &str) -> Option<&OutputSocket> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Parent of a concrete input socket
    pub fn parent_of(&self, key: &InputKey) -> Option<&OutputAddr> {
        match (self.slot(key.param_name())?, key) {
            (InputSlot::Single(socket), InputKey::Param(_)) => socket.parent.as_ref(),
            (InputSlot::Variadic(group), InputKey::Sub { ordinal, .. }) => {
                group.subsocket(*ordinal)?.parent.as_ref()
            }
            _ => None,
        }
    }

    /// Every `(input, parent)` link ending at this node
    pub fn parents(&self) -> Vec<(InputKey, &OutputAddr)> {
        self.inputs.iter().flat_map(InputSlot::parents).collect()
    }

    /// Input keys in display order; placeholders follow their sub-sockets
    pub fn visible_inputs(&self) -> Vec<InputKey> {
        let placeholders = self.exposes_placeholders();
        let mut keys = Vec::new();
        for slot in &self.inputs {
            keys.extend(slot.keys());
            if placeholders && matches!(slot, InputSlot::Variadic(_)) {
                keys.push(InputKey::Param(slot.param().to_string()));
            }
        }
        keys
    }
}
