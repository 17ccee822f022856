use super::error::{GraphError, GraphResult};
use super::id::{InputAddr, InputKey, NodeId};
use super::node::{DisplayMode, Node, NodeKind};
use super::operators;
use super::socket::InputSlot;
use super::socket_type::{SocketType, TypeRegistry};
use super::widget::WidgetSpec;
use crate::nodepack::{NodeDefinition, NodePackRef};
use crate::types::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// A document's node graph
///
/// Nodes are kept in insertion order. Links are stored on the child input as
/// its parent; see [`segments`](super::segments) for the editing operations.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
    types: TypeRegistry,
    next_id: u32,
    /// Node packs the document depends on
    pub node_packs: Vec<NodePackRef>,
    /// Viewport offset, persisted with the document
    pub scrolling_amount: [f32; 2],
}

impl Graph {
    pub fn new() -> Self {
        Self::with_types(TypeRegistry::new())
    }

    /// An empty graph validating wiring against `types`
    pub fn with_types(types: TypeRegistry) -> Self {
        Self {
            nodes: IndexMap::new(),
            types,
            next_id: 0,
            node_packs: Vec::new(),
            scrolling_amount: [0.0, 0.0],
        }
    }

    // ==================== Lookup ====================

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))
    }

    /// Node `id`, or `UnknownNode`
    pub fn get(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(&id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Record a subtype relation; relations are never removed
    pub fn register_subtype(&mut self, in_type: impl Into<SocketType>, out_type: impl Into<SocketType>) {
        self.types.register_subtype(in_type, out_type);
    }

    /// Id the next added node receives
    pub fn next_id(&self) -> NodeId {
        NodeId(self.next_id)
    }

    // ==================== Adding nodes ====================

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a node built elsewhere, keeping its id
    pub fn insert_node(&mut self, node: Node) -> GraphResult<NodeId> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNodeId(id));
        }
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.nodes.insert(id, node);
        tracing::debug!("Inserted node {}", id);
        Ok(id)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        tracing::debug!("Added node {}", id);
        id
    }

    pub fn add_callable(&mut self, definition: Arc<NodeDefinition>, midtop: [f32; 2]) -> NodeId {
        let id = self.allocate_id();
        self.push(Node::callable(id, definition, midtop))
    }

    pub fn add_data(
        &mut self,
        socket_type: impl Into<SocketType>,
        value: Value,
        widget: Option<WidgetSpec>,
        midtop: [f32; 2],
    ) -> NodeId {
        let id = self.allocate_id();
        self.push(Node::data(id, socket_type.into(), value, widget, midtop))
    }

    pub fn add_redirect(&mut self, socket_type: impl Into<SocketType>, midtop: [f32; 2]) -> NodeId {
        let id = self.allocate_id();
        self.push(Node::redirect(id, socket_type.into(), midtop))
    }

    /// Add an operator node by operation id or symbol
    pub fn add_operator(&mut self, operation: &str, midtop: [f32; 2]) -> GraphResult<NodeId> {
        let op = operators::lookup(operation)
            .ok_or_else(|| GraphError::UnknownOperation(operation.to_string()))?;
        let id = self.allocate_id();
        Ok(self.push(Node::operator(id, op, midtop)))
    }

    pub fn add_text_block(&mut self, text: impl Into<String>, midtop: [f32; 2]) -> NodeId {
        let id = self.allocate_id();
        self.push(Node::text_block(id, text, midtop))
    }

    /// Delete a node and every link touching it
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<Node> {
        let node = self
            .nodes
            .shift_remove(&id)
            .ok_or(GraphError::UnknownNode(id))?;

        let mut severed = 0;
        for other in self.nodes.values_mut() {
            for slot in &mut other.inputs {
                match slot {
                    InputSlot::Single(socket) => {
                        if socket.parent.as_ref().is_some_and(|p| p.node == id) {
                            socket.parent = None;
                            severed += 1;
                        }
                    }
                    InputSlot::Variadic(group) => {
                        let before = group.subsockets.len();
                        group
                            .subsockets
                            .retain(|s| s.parent.as_ref().map_or(true, |p| p.node != id));
                        severed += before - group.subsockets.len();
                    }
                }
            }
        }

        tracing::debug!("Removed node {} ({} downstream links severed)", id, severed);
        Ok(node)
    }

    // ==================== Editing ====================

    /// Store a widget value for a parameter without a parent
    ///
    /// The value must be assignable to the socket type and accepted by the
    /// parameter's widget. Variadic groups take a list (positional) or a map
    /// (keyword).
    pub fn set_widget_value(&mut self, input: &InputAddr, value: Value) -> GraphResult<()> {
        let InputKey::Param(param) = &input.key else {
            return Err(GraphError::UnknownSocket(input.to_string()));
        };
        let node = self.get(input.node)?;
        let slot = node
            .slot(param)
            .ok_or_else(|| GraphError::UnknownSocket(input.to_string()))?;

        let invalid = |message: String| GraphError::InvalidWidgetValue {
            input: input.to_string(),
            message,
        };

        match slot {
            InputSlot::Single(socket) => {
                if !self.types.is_assignable(value.socket_type_name(), &socket.socket_type) {
                    return Err(invalid(format!(
                        "{} is not assignable to {}",
                        value.type_name(),
                        socket.socket_type
                    )));
                }
            }
            InputSlot::Variadic(group) => {
                let expected = match group.kind {
                    super::socket::VariadicKind::Positional => "list",
                    super::socket::VariadicKind::Keyword => "dict",
                };
                if value.type_name() != expected {
                    return Err(invalid(format!(
                        "expected {}, got {}",
                        expected,
                        value.type_name()
                    )));
                }
            }
        }

        if let Some(widget) = node.widgets.get(param) {
            widget.validate(&value).map_err(invalid)?;
        }

        let param = param.clone();
        self.node_mut(input.node)?.widget_values.insert(param, value);
        Ok(())
    }

    /// Remove a widget value; returns the previous value
    pub fn clear_widget_value(&mut self, input: &InputAddr) -> GraphResult<Option<Value>> {
        let node = self.node_mut(input.node)?;
        Ok(node.widget_values.shift_remove(input.key.param_name()))
    }

    pub fn set_commented_out(&mut self, id: NodeId, commented_out: bool) -> GraphResult<()> {
        self.node_mut(id)?.commented_out = commented_out;
        tracing::debug!(
            "Node {} {}",
            id,
            if commented_out { "commented out" } else { "uncommented" }
        );
        Ok(())
    }

    /// Change how a callable node shows its signature
    ///
    /// Existing sub-sockets and their links are kept in every mode.
    pub fn set_mode(&mut self, id: NodeId, mode: DisplayMode) -> GraphResult<()> {
        let node = self.node_mut(id)?;
        if !matches!(node.kind, NodeKind::Callable(_)) {
            return Err(GraphError::WrongNodeKind {
                node: id,
                expected: "callable",
            });
        }
        node.mode = mode;
        Ok(())
    }

    pub fn move_node(&mut self, id: NodeId, midtop: [f32; 2]) -> GraphResult<()> {
        self.node_mut(id)?.midtop = midtop;
        Ok(())
    }

    /// Replace the constant of a data node
    pub fn set_data_value(&mut self, id: NodeId, value: Value) -> GraphResult<()> {
        let node = self.get(id)?;
        let NodeKind::ProxyData { widget, .. } = &node.kind else {
            return Err(GraphError::WrongNodeKind {
                node: id,
                expected: "proxy_data",
            });
        };

        let invalid = |message: String| GraphError::InvalidWidgetValue {
            input: format!("{}", id),
            message,
        };
        let socket_type = node
            .outputs
            .first()
            .map(|o| o.socket_type.clone())
            .unwrap_or_default();
        if !self.types.is_assignable(value.socket_type_name(), &socket_type) {
            return Err(invalid(format!(
                "{} is not assignable to {}",
                value.type_name(),
                socket_type
            )));
        }
        if let Some(widget) = widget {
            widget.validate(&value).map_err(invalid)?;
        }

        if let NodeKind::ProxyData { value: stored, .. } = &mut self.node_mut(id)?.kind {
            *stored = value;
        }
        Ok(())
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> GraphResult<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::TextBlock { text: stored } => {
                *stored = text.into();
                Ok(())
            }
            _ => Err(GraphError::WrongNodeKind {
                node: id,
                expected: "text_block",
            }),
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::id::OutputAddr;
    use crate::graph::widget::WidgetKind;
    use crate::graph::DEFAULT_OUTPUT;

    #[test]
    fn test_ids_are_sequential_and_unique() {
        let mut graph = Graph::new();
        let a = graph.add_data("int", Value::Int(1), None, [0.0, 0.0]);
        let b = graph.add_text_block("note", [0.0, 0.0]);
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));

        let dup = Node::text_block(NodeId(1), "again", [0.0, 0.0]);
        assert_eq!(graph.insert_node(dup), Err(GraphError::DuplicateNodeId(NodeId(1))));

        graph
            .insert_node(Node::text_block(NodeId(10), "far", [0.0, 0.0]))
            .unwrap();
        assert_eq!(graph.next_id(), NodeId(11));
    }

    #[test]
    fn test_unknown_operation() {
        let mut graph = Graph::new();
        assert_eq!(
            graph.add_operator("@@", [0.0, 0.0]),
            Err(GraphError::UnknownOperation("@@".into()))
        );
    }

    #[test]
    fn test_remove_node_cascades_links() {
        let mut graph = Graph::new();
        let a = graph.add_data("int", Value::Int(1), None, [0.0, 0.0]);
        let add = graph.add_operator("add", [0.0, 0.0]).unwrap();
        graph
            .connect(&OutputAddr::new(a, DEFAULT_OUTPUT), &InputAddr::param(add, "a"))
            .unwrap();

        graph.remove_node(a).unwrap();
        assert!(graph.parent_of(&InputAddr::param(add, "a")).is_none());
        assert_eq!(graph.remove_node(a).unwrap_err(), GraphError::UnknownNode(a));
    }

    #[test]
    fn test_widget_value_validation() {
        let mut graph = Graph::new();
        let add = graph.add_operator("add", [0.0, 0.0]).unwrap();
        let input = InputAddr::param(add, "a");

        graph.set_widget_value(&input, Value::Int(5)).unwrap();
        assert_eq!(graph.node(add).unwrap().widget_values["a"], Value::Int(5));
        assert_eq!(graph.clear_widget_value(&input).unwrap(), Some(Value::Int(5)));

        let missing = InputAddr::param(add, "zzz");
        assert!(matches!(
            graph.set_widget_value(&missing, Value::Int(1)),
            Err(GraphError::UnknownSocket(_))
        ));
    }

    #[test]
    fn test_data_value_respects_type_and_widget() {
        let mut graph = Graph::new();
        let widget = WidgetSpec::new(WidgetKind::IntFloatEntry).with("max_value", 10);
        let id = graph.add_data("int", Value::Int(1), Some(widget), [0.0, 0.0]);

        graph.set_data_value(id, Value::Bool(true)).unwrap_err();
        graph.set_data_value(id, Value::from("x")).unwrap_err();
        assert!(matches!(
            graph.set_data_value(id, Value::Int(11)),
            Err(GraphError::InvalidWidgetValue { .. })
        ));
        graph.set_data_value(id, Value::Int(7)).unwrap();
    }

    #[test]
    fn test_editor_mutations() {
        let mut graph = Graph::new();
        let text = graph.add_text_block("a", [0.0, 0.0]);
        graph.set_text(text, "b").unwrap();
        graph.move_node(text, [5.0, 6.0]).unwrap();
        assert_eq!(graph.node(text).unwrap().midtop, [5.0, 6.0]);
        assert!(matches!(
            graph.set_mode(text, DisplayMode::CallableMode),
            Err(GraphError::WrongNodeKind { .. })
        ));
        graph.set_commented_out(text, true).unwrap();
        assert!(graph.node(text).unwrap().commented_out);
    }
}
