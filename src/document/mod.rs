//! Document model
//!
//! A document is a [`Graph`] plus the node packs it depends on, stored as a
//! single JSON record (see [`records`]). Loading rebuilds every node from its
//! record, then restores the links in a second pass so that parents may
//! appear after their children in the file. [`persist`] handles the on-disk
//! side: atomic writes, backups and swap files.

pub mod persist;
pub mod records;

pub use persist::{DocumentStore, KeepOriginal, SwapChoice, SwapResolver, EXTENSION};
pub use records::{
    DocumentFile, NodeRecord, ParentRef, ProxyKind, ProxyRecord, SubparamRecord, TextBlockRecord,
};

use crate::error::{NodezatorError, Result};
use crate::graph::{
    operators, Graph, InputAddr, InputSlot, Node, NodeKind, OutputAddr, SocketType, SubSocket,
};
use crate::nodepack::NodeLibrary;

impl DocumentFile {
    /// Snapshot a graph, keeping node insertion order
    pub fn from_graph(graph: &Graph) -> Self {
        let mut doc = DocumentFile {
            node_packs: graph.node_packs.clone(),
            scrolling_amount: graph.scrolling_amount,
            ..Default::default()
        };

        for node in graph.nodes() {
            let mut record = NodeRecord::new(node.id, node.midtop);
            match &node.kind {
                NodeKind::TextBlock { text } => {
                    doc.text_blocks.push(TextBlockRecord {
                        id: node.id,
                        text: text.clone(),
                        midtop: node.midtop,
                    });
                    continue;
                }
                NodeKind::Callable(definition) => {
                    record.script_id = Some(definition.script_id.clone());
                }
                NodeKind::Operator(operation) => {
                    record.operation_id = Some(operation.id.to_string());
                }
                NodeKind::ProxyData { value, widget } => {
                    record.proxy = Some(ProxyRecord {
                        kind: ProxyKind::Data,
                        socket_type: output_type(node),
                        value: (!value.is_none()).then(|| value.clone()),
                        widget: widget.clone(),
                    });
                }
                NodeKind::ProxyRedirect => {
                    record.proxy = Some(ProxyRecord {
                        kind: ProxyKind::Redirect,
                        socket_type: output_type(node),
                        value: None,
                        widget: None,
                    });
                }
            }

            record.mode = node.mode;
            record.commented_out = node.commented_out;
            record.param_widget_values = node.widget_values.clone();

            for slot in &node.inputs {
                match slot {
                    InputSlot::Single(socket) => {
                        if let Some(parent) = &socket.parent {
                            record.parents.insert(
                                socket.name.clone(),
                                ParentRef(parent.node, parent.output.clone()),
                            );
                        }
                    }
                    InputSlot::Variadic(group) if !group.subsockets.is_empty() => {
                        let subs = group
                            .subsockets
                            .iter()
                            .map(|sub| SubparamRecord {
                                ordinal: sub.ordinal,
                                parent: sub
                                    .parent
                                    .as_ref()
                                    .map(|p| ParentRef(p.node, p.output.clone())),
                                keyword: sub.keyword.clone(),
                            })
                            .collect();
                        record.subparam_parents.insert(group.param.clone(), subs);
                    }
                    InputSlot::Variadic(_) => {}
                }
            }

            doc.nodes.push(record);
        }

        doc
    }

    /// Rebuild the graph, resolving script ids against `library`
    ///
    /// The library must already hold the packs listed in `node_packs`.
    ///
    /// # Errors
    /// * `DocumentParse` - a record is malformed, reuses an id, names an
    ///   unknown input or stores a widget value its input rejects
    /// * `UnknownScriptId` - no loaded pack provides a script
    /// * `DanglingParent` - a link points to a missing node or output
    /// * `Graph` - a link is rejected by the segment rules
    pub fn to_graph(&self, library: &NodeLibrary) -> Result<Graph> {
        let mut graph = Graph::with_types(library.types().clone());
        graph.node_packs = self.node_packs.clone();
        graph.scrolling_amount = self.scrolling_amount;

        for record in &self.nodes {
            let mut node = build_node(record, library)?;
            node.mode = record.mode;
            node.commented_out = record.commented_out;
            node.widget_values.clear();
            insert_unique(&mut graph, node)?;
            restore_widget_values(&mut graph, record)?;
        }

        for block in &self.text_blocks {
            insert_unique(
                &mut graph,
                Node::text_block(block.id, block.text.clone(), block.midtop),
            )?;
        }

        for record in &self.nodes {
            restore_links(&mut graph, record)?;
        }

        tracing::debug!(
            "Built graph with {} nodes and {} links",
            graph.len(),
            graph.segments().len()
        );
        Ok(graph)
    }
}

fn insert_unique(graph: &mut Graph, node: Node) -> Result<()> {
    let id = node.id;
    graph.insert_node(node).map_err(|_| {
        NodezatorError::DocumentParse(format!("node id {} is used more than once", id))
    })?;
    Ok(())
}

/// Set stored widget values through the same checks as editor input
fn restore_widget_values(graph: &mut Graph, record: &NodeRecord) -> Result<()> {
    for (param, value) in &record.param_widget_values {
        graph
            .set_widget_value(&InputAddr::param(record.id, param.clone()), value.clone())
            .map_err(|e| {
                NodezatorError::DocumentParse(format!(
                    "node {} has an invalid widget value: {}",
                    record.id, e
                ))
            })?;
    }
    Ok(())
}

fn output_type(node: &Node) -> SocketType {
    node.outputs
        .first()
        .map(|o| o.socket_type.clone())
        .unwrap_or_default()
}

fn build_node(record: &NodeRecord, library: &NodeLibrary) -> Result<Node> {
    let id = record.id;
    match (&record.script_id, &record.operation_id, &record.proxy) {
        (Some(script_id), None, None) => {
            let definition = library.resolve(script_id)?;
            Ok(Node::callable(id, definition, record.midtop))
        }
        (None, Some(operation_id), None) => {
            let operation = operators::lookup(operation_id).ok_or_else(|| {
                NodezatorError::DocumentParse(format!(
                    "node {} uses unknown operation '{}'",
                    id, operation_id
                ))
            })?;
            Ok(Node::operator(id, operation, record.midtop))
        }
        (None, None, Some(proxy)) => Ok(match proxy.kind {
            ProxyKind::Data => Node::data(
                id,
                proxy.socket_type.clone(),
                proxy.value.clone().unwrap_or_default(),
                proxy.widget.clone(),
                record.midtop,
            ),
            ProxyKind::Redirect => Node::redirect(id, proxy.socket_type.clone(), record.midtop),
        }),
        _ => Err(NodezatorError::DocumentParse(format!(
            "node {} must have exactly one of script_id, operation_id and proxy",
            id
        ))),
    }
}

/// Check that a stored parent exists before linking to it
fn parent_addr(graph: &Graph, record: &NodeRecord, input: &str, parent: &ParentRef) -> Result<OutputAddr> {
    let addr = OutputAddr::new(parent.0, parent.1.clone());
    let exists = graph
        .node(parent.0)
        .is_some_and(|n| n.output(&parent.1).is_some());
    if !exists {
        return Err(NodezatorError::DanglingParent {
            node: record.id,
            input: input.to_string(),
            parent: addr.to_string(),
        });
    }
    Ok(addr)
}

fn unknown_input(record: &NodeRecord, input: &str) -> NodezatorError {
    NodezatorError::DocumentParse(format!("node {} has no input '{}'", record.id, input))
}

fn restore_links(graph: &mut Graph, record: &NodeRecord) -> Result<()> {
    for (input, parent) in &record.parents {
        let addr = parent_addr(graph, record, input, parent)?;
        match graph.get(record.id)?.slot(input) {
            Some(InputSlot::Single(_)) => {}
            _ => return Err(unknown_input(record, input)),
        }
        graph.connect(&addr, &InputAddr::param(record.id, input.clone()))?;
    }

    for (param, subs) in &record.subparam_parents {
        for sub in subs {
            let addr = match &sub.parent {
                Some(parent) => Some(parent_addr(graph, record, param, parent)?),
                None => None,
            };

            let node = graph.node_mut(record.id)?;
            let Some(InputSlot::Variadic(group)) = node.slot_mut(param) else {
                return Err(unknown_input(record, param));
            };
            if group.subsocket(sub.ordinal).is_some() {
                return Err(NodezatorError::DocumentParse(format!(
                    "node {} repeats ordinal {} of '{}'",
                    record.id, sub.ordinal, param
                )));
            }
            group.insert(SubSocket {
                ordinal: sub.ordinal,
                parent: None,
                keyword: sub.keyword.clone(),
            });

            if let Some(addr) = addr {
                graph.connect(&addr, &InputAddr::sub(record.id, param.clone(), sub.ordinal))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DisplayMode, NodeId, WidgetKind, WidgetSpec, DEFAULT_OUTPUT};
    use crate::nodepack::{
        single_output, BoundArgs, CallContext, CallError, ParamKind, Parameter, ScriptId, Signature,
    };
    use crate::types::Value;

    fn join(args: BoundArgs, _ctx: &CallContext<'_>) -> std::result::Result<Value, CallError> {
        let parts = args.require("parts")?.as_list().unwrap_or_default();
        Ok(Value::Str(parts.iter().map(|v| v.to_string()).collect()))
    }

    fn library() -> NodeLibrary {
        let mut library = NodeLibrary::new();
        library
            .register_native(
                ScriptId::new("text", "join", "join"),
                Signature::new(
                    vec![Parameter::new("parts", ParamKind::VarPositional)],
                    single_output("str"),
                ),
                join,
            )
            .unwrap();
        library
    }

    fn sample(library: &NodeLibrary) -> Graph {
        let mut graph = Graph::with_types(library.types().clone());
        let a = graph.add_data(
            "str",
            Value::Str("a".into()),
            Some(WidgetSpec::new(WidgetKind::StringEntry)),
            [10.0, 20.0],
        );
        let add = graph.add_operator("add", [50.0, 20.0]).unwrap();
        let join = graph.add_callable(
            library.resolve(&ScriptId::new("text", "join", "join")).unwrap(),
            [90.0, 20.0],
        );
        graph.add_text_block("hello", [0.0, 0.0]);
        graph
            .connect(&OutputAddr::new(a, DEFAULT_OUTPUT), &InputAddr::param(add, "a"))
            .unwrap();
        graph
            .connect(&OutputAddr::new(a, DEFAULT_OUTPUT), &InputAddr::param(join, "parts"))
            .unwrap();
        graph.set_widget_value(&InputAddr::param(add, "b"), Value::Str("b".into())).unwrap();
        graph.set_mode(join, DisplayMode::CollapsedSignature).unwrap();
        graph.set_commented_out(add, true).unwrap();
        graph.scrolling_amount = [5.0, -5.0];
        graph
    }

    #[test]
    fn test_graph_round_trip() {
        let library = library();
        let graph = sample(&library);
        let doc = DocumentFile::from_graph(&graph);

        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.text_blocks.len(), 1);
        assert_eq!(doc.nodes[1].operation_id.as_deref(), Some("add"));
        assert_eq!(doc.nodes[2].subparam_parents["parts"][0].ordinal, 0);

        let rebuilt = doc.to_graph(&library).unwrap();
        assert_eq!(rebuilt.segments(), graph.segments());
        assert_eq!(rebuilt.scrolling_amount, [5.0, -5.0]);
        assert_eq!(DocumentFile::from_graph(&rebuilt), doc);
    }

    #[test]
    fn test_unknown_script_id() {
        let mut doc = DocumentFile::default();
        let mut record = NodeRecord::new(NodeId(0), [0.0, 0.0]);
        record.script_id = Some(ScriptId::new("missing", "cat", "node"));
        doc.nodes.push(record);

        let err = doc.to_graph(&NodeLibrary::new()).unwrap_err();
        assert!(matches!(err, NodezatorError::UnknownScriptId(_)));
    }

    #[test]
    fn test_dangling_parent() {
        let mut doc = DocumentFile::default();
        let mut record = NodeRecord::new(NodeId(0), [0.0, 0.0]);
        record.operation_id = Some("neg".into());
        record.parents.insert("a".into(), ParentRef(NodeId(7), "output".into()));
        doc.nodes.push(record);

        match doc.to_graph(&NodeLibrary::new()).unwrap_err() {
            NodezatorError::DanglingParent { node, input, parent } => {
                assert_eq!(node, NodeId(0));
                assert_eq!(input, "a");
                assert_eq!(parent, "#7.output");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_record_must_name_one_kind() {
        let mut doc = DocumentFile::default();
        let mut record = NodeRecord::new(NodeId(0), [0.0, 0.0]);
        record.operation_id = Some("neg".into());
        record.script_id = Some(ScriptId::new("a", "b", "c"));
        doc.nodes.push(record);
        doc.nodes.push(NodeRecord::new(NodeId(1), [0.0, 0.0]));

        let err = doc.to_graph(&NodeLibrary::new()).unwrap_err();
        assert!(matches!(err, NodezatorError::DocumentParse(_)));
    }

    #[test]
    fn test_duplicate_id_is_a_parse_error() {
        let mut doc = DocumentFile::default();
        let mut record = NodeRecord::new(NodeId(4), [0.0, 0.0]);
        record.operation_id = Some("neg".into());
        doc.nodes.push(record);
        doc.text_blocks.push(TextBlockRecord {
            id: NodeId(4),
            text: "note".into(),
            midtop: [0.0, 0.0],
        });

        match doc.to_graph(&NodeLibrary::new()).unwrap_err() {
            NodezatorError::DocumentParse(message) => assert!(message.contains('4'), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_widget_value_is_a_parse_error() {
        let library = library();
        let mut doc = DocumentFile::default();
        let mut record = NodeRecord::new(NodeId(2), [0.0, 0.0]);
        record.script_id = Some(ScriptId::new("text", "join", "join"));
        record.param_widget_values.insert("parts".into(), Value::Int(3));
        doc.nodes.push(record.clone());

        match doc.to_graph(&library).unwrap_err() {
            NodezatorError::DocumentParse(message) => assert!(message.contains("#2"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }

        doc.nodes[0].param_widget_values.insert("parts".into(), Value::List(vec![]));
        assert!(doc.to_graph(&library).is_ok());
    }

    #[test]
    fn test_data_proxy_without_value_stays_without_value() {
        let mut doc = DocumentFile::default();
        let mut record = NodeRecord::new(NodeId(0), [0.0, 0.0]);
        record.proxy = Some(ProxyRecord {
            kind: ProxyKind::Data,
            socket_type: SocketType::new("int"),
            value: None,
            widget: None,
        });
        doc.nodes.push(record);

        let graph = doc.to_graph(&NodeLibrary::new()).unwrap();
        assert_eq!(DocumentFile::from_graph(&graph), doc);
    }
}
