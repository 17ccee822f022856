//! Segment editing
//!
//! A segment links an output socket to an input socket. The link is stored on
//! the input, so "at most one parent per input" holds by construction. The
//! operations here keep the remaining invariants: both endpoints exist, the
//! types are connectable, and the node-level graph stays acyclic.

use super::error::{GraphError, GraphResult};
use super::id::{InputAddr, InputKey, NodeId, OutputAddr};
use super::layout::{self, Point};
use super::model::Graph;
use super::socket::{InputSlot, SubSocket, VariadicKind};
use std::collections::{BTreeSet, HashSet};

/// One link, output to input
pub type Segment = (OutputAddr, InputAddr);

/// Where `connect` attaches the new link
enum Target {
    Single,
    Sub(u32),
    NewSub,
}

impl Graph {
    /// Link `output` to `input`, replacing any previous parent of `input`
    ///
    /// Connecting to a variadic placeholder materializes a sub-socket with the
    /// next ordinal. Returns the address of the socket that was linked.
    pub fn connect(&mut self, output: &OutputAddr, input: &InputAddr) -> GraphResult<InputAddr> {
        let out_type = self
            .node(output.node)
            .and_then(|n| n.output(&output.output))
            .map(|o| o.socket_type.clone())
            .ok_or_else(|| GraphError::UnknownSocket(output.to_string()))?;

        let unknown_input = || GraphError::UnknownSocket(input.to_string());
        let child = self.node(input.node).ok_or_else(unknown_input)?;
        let slot = child.slot(input.key.param_name()).ok_or_else(unknown_input)?;

        let target = match (&input.key, slot) {
            (InputKey::Param(_), InputSlot::Single(_)) => Target::Single,
            (InputKey::Param(_), InputSlot::Variadic(_)) => Target::NewSub,
            (InputKey::Sub { ordinal, .. }, InputSlot::Variadic(group))
                if group.subsocket(*ordinal).is_some() =>
            {
                Target::Sub(*ordinal)
            }
            _ => return Err(unknown_input()),
        };

        if output.node == input.node {
            return Err(GraphError::SameNode(input.node));
        }

        if matches!(target, Target::NewSub) && !child.exposes_placeholders() {
            return Err(unknown_input());
        }

        let in_type = slot.socket_type();
        if !self.types().is_connectable(&out_type, in_type) {
            return Err(GraphError::IncompatibleSocketTypes {
                output: output.clone(),
                input: input.clone(),
                out_type: out_type.to_string(),
                in_type: in_type.to_string(),
            });
        }

        if self.is_upstream(input.node, output.node) {
            return Err(GraphError::WouldIntroduceCycle {
                output: output.clone(),
                input: input.clone(),
            });
        }

        let node = self.node_mut(input.node)?;
        let param = input.key.param_name().to_string();
        let linked = match (target, node.slot_mut(&param)) {
            (Target::Single, Some(InputSlot::Single(socket))) => {
                socket.parent = Some(output.clone());
                input.clone()
            }
            (Target::Sub(ordinal), Some(InputSlot::Variadic(group))) => {
                if let Some(sub) = group.subsocket_mut(ordinal) {
                    sub.parent = Some(output.clone());
                }
                input.clone()
            }
            (Target::NewSub, Some(InputSlot::Variadic(group))) => {
                let ordinal = group.next_ordinal();
                let keyword = match group.kind {
                    VariadicKind::Positional => None,
                    VariadicKind::Keyword => Some(unique_keyword(
                        group.subsockets.iter().filter_map(|s| s.keyword.as_deref()),
                        &output.output,
                        ordinal,
                    )),
                };
                group.insert(SubSocket {
                    ordinal,
                    parent: Some(output.clone()),
                    keyword,
                });
                InputAddr::sub(input.node, param, ordinal)
            }
            _ => return Err(unknown_input()),
        };

        tracing::debug!("Connected {} -> {}", output, linked);
        Ok(linked)
    }

    /// Remove the link into `input`, if any
    ///
    /// A disconnected sub-socket is removed from its group. Unknown sockets
    /// are ignored.
    pub fn disconnect(&mut self, input: &InputAddr) -> Option<OutputAddr> {
        let node = self.node_mut(input.node).ok()?;
        let removed = match (node.slot_mut(input.key.param_name())?, &input.key) {
            (InputSlot::Single(socket), InputKey::Param(_)) => socket.parent.take(),
            (InputSlot::Variadic(group), InputKey::Sub { ordinal, .. }) => {
                group.remove(*ordinal).and_then(|sub| sub.parent)
            }
            _ => None,
        };
        if let Some(parent) = &removed {
            tracing::debug!("Disconnected {} -> {}", parent, input);
        }
        removed
    }

    /// Remove every link whose rendered segment crosses the line `p0`-`p1`
    pub fn sever_crossing(&mut self, p0: Point, p1: Point) -> Vec<Segment> {
        if p0 == p1 {
            return Vec::new();
        }

        let crossing: Vec<Segment> = self
            .segments()
            .into_iter()
            .filter(|(output, input)| {
                let from = self
                    .node(output.node)
                    .and_then(|n| layout::output_position(n, &output.output));
                let to = self
                    .node(input.node)
                    .and_then(|n| layout::input_position(n, &input.key));
                match (from, to) {
                    (Some(from), Some(to)) => layout::segments_intersect(from, to, p0, p1),
                    _ => false,
                }
            })
            .collect();

        for (_, input) in &crossing {
            self.disconnect(input);
        }
        if !crossing.is_empty() {
            tracing::debug!("Severed {} segments", crossing.len());
        }
        crossing
    }

    pub fn parent_of(&self, input: &InputAddr) -> Option<&OutputAddr> {
        self.node(input.node)?.parent_of(&input.key)
    }

    /// Every input fed by `output`
    pub fn children_of(&self, output: &OutputAddr) -> BTreeSet<InputAddr> {
        self.nodes()
            .flat_map(|node| {
                node.parents()
                    .into_iter()
                    .filter(|(_, parent)| *parent == output)
                    .map(move |(key, _)| InputAddr::new(node.id, key))
            })
            .collect()
    }

    /// Every link in the graph, ordered by input address
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self
            .nodes()
            .flat_map(|node| {
                node.parents()
                    .into_iter()
                    .map(move |(key, parent)| (parent.clone(), InputAddr::new(node.id, key)))
            })
            .collect();
        segments.sort_by(|a, b| a.1.cmp(&b.1));
        segments
    }

    /// Nodes whose outputs feed `id` directly
    pub fn parent_nodes(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.node(id)
            .map(|n| n.parents().into_iter().map(|(_, p)| p.node).collect())
            .unwrap_or_default()
    }

    /// Whether `target` is reachable from `start` by following parent links
    fn is_upstream(&self, target: NodeId, start: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.parent_nodes(current));
            }
        }
        false
    }

    /// Give a keyword sub-socket a new argument name, unique within its group
    pub fn rename_keyword_subsocket(&mut self, input: &InputAddr, keyword: &str) -> GraphResult<()> {
        let unknown = || GraphError::UnknownSocket(input.to_string());
        let InputKey::Sub { param, ordinal } = &input.key else {
            return Err(unknown());
        };
        let node = self.node_mut(input.node).map_err(|_| unknown())?;
        let Some(InputSlot::Variadic(group)) = node.slot_mut(param) else {
            return Err(unknown());
        };
        if group.kind != VariadicKind::Keyword || group.subsocket(*ordinal).is_none() {
            return Err(unknown());
        }

        let taken = group
            .subsockets
            .iter()
            .any(|s| s.ordinal != *ordinal && s.keyword.as_deref() == Some(keyword));
        if taken || keyword.is_empty() {
            return Err(GraphError::DuplicateKeyword {
                param: param.clone(),
                keyword: keyword.to_string(),
            });
        }

        if let Some(sub) = group.subsocket_mut(*ordinal) {
            sub.keyword = Some(keyword.to_string());
        }
        Ok(())
    }
}

/// `base`, or `base_<ordinal>` when `base` is already used
fn unique_keyword<'a>(mut used: impl Iterator<Item = &'a str> + Clone, base: &str, ordinal: u32) -> String {
    if used.clone().any(|k| k == base) {
        let candidate = format!("{}_{}", base, ordinal);
        if !used.any(|k| k == candidate) {
            return candidate;
        }
        return format!("{}_{}_{}", base, ordinal, ordinal);
    }
    base.to_string()
}
