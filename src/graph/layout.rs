//! Rendered geometry of nodes and segments
//!
//! The core does not draw anything, but severing segments by a drag line
//! needs to know where segments are. Nodes are laid out as fixed-width
//! rectangles hanging from `midtop`: a header row, then one row per visible
//! input on the left edge and one row per output on the right edge.

use super::id::InputKey;
use super::node::Node;

pub type Point = [f32; 2];

pub const NODE_WIDTH: f32 = 200.0;
pub const HEADER_HEIGHT: f32 = 30.0;
pub const ROW_HEIGHT: f32 = 24.0;

/// Axis-aligned node rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn contains(&self, p: Point) -> bool {
        p[0] >= self.x && p[0] <= self.x + self.width && p[1] >= self.y && p[1] <= self.y + self.height
    }
}

pub fn node_rect(node: &Node) -> Rect {
    let rows = node.visible_inputs().len().max(node.outputs.len()).max(1);
    Rect {
        x: node.midtop[0] - NODE_WIDTH / 2.0,
        y: node.midtop[1],
        width: NODE_WIDTH,
        height: HEADER_HEIGHT + ROW_HEIGHT * rows as f32,
    }
}

fn row_y(node: &Node, row: usize) -> f32 {
    node.midtop[1] + HEADER_HEIGHT + ROW_HEIGHT * (row as f32 + 0.5)
}

/// Centre of a visible input socket
pub fn input_position(node: &Node, key: &InputKey) -> Option<Point> {
    let row = node.visible_inputs().iter().position(|k| k == key)?;
    Some([node.midtop[0] - NODE_WIDTH / 2.0, row_y(node, row)])
}

/// Centre of an output socket
pub fn output_position(node: &Node, output: &str) -> Option<Point> {
    let row = node.outputs.iter().position(|o| o.name == output)?;
    Some([node.midtop[0] + NODE_WIDTH / 2.0, row_y(node, row)])
}

fn orientation(a: Point, b: Point, c: Point) -> f32 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p[0] >= a[0].min(b[0]) && p[0] <= a[0].max(b[0]) && p[1] >= a[1].min(b[1]) && p[1] <= a[1].max(b[1])
}

/// Whether segment `a0`-`a1` touches segment `b0`-`b1`
pub fn segments_intersect(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    let d1 = orientation(b0, b1, a0);
    let d2 = orientation(b0, b1, a1);
    let d3 = orientation(a0, a1, b0);
    let d4 = orientation(a0, a1, b1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b0, b1, a0))
        || (d2 == 0.0 && on_segment(b0, b1, a1))
        || (d3 == 0.0 && on_segment(a0, a1, b0))
        || (d4 == 0.0 && on_segment(a0, a1, b1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::id::NodeId;
    use crate::graph::socket_type::SocketType;
    use crate::graph::DEFAULT_OUTPUT;

    #[test]
    fn test_socket_positions() {
        let node = Node::redirect(NodeId(0), SocketType::any(), [100.0, 50.0]);
        let input = input_position(&node, &InputKey::param("input")).unwrap();
        let output = output_position(&node, DEFAULT_OUTPUT).unwrap();
        assert_eq!(input, [0.0, 50.0 + HEADER_HEIGHT + ROW_HEIGHT / 2.0]);
        assert_eq!(output[0], 200.0);
        assert!(input_position(&node, &InputKey::param("nope")).is_none());
        assert!(node_rect(&node).contains([100.0, 60.0]));
    }

    #[test]
    fn test_segments_intersect() {
        assert!(segments_intersect([0.0, 0.0], [10.0, 10.0], [0.0, 10.0], [10.0, 0.0]));
        assert!(!segments_intersect([0.0, 0.0], [10.0, 0.0], [0.0, 1.0], [10.0, 1.0]));
        // Touching at an endpoint counts
        assert!(segments_intersect([0.0, 0.0], [10.0, 0.0], [10.0, 0.0], [10.0, 5.0]));
    }
}
