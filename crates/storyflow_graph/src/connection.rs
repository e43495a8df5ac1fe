// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connector (edge) view over node exits.
//!
//! Links are stored on the emitting node (`next`, `choices[i].next`, ...).
//! A [`Connector`] is the derived, per-exit view the editor draws and
//! hit-tests; it carries cached anchor coordinates that are only valid until
//! the nodes move or are re-laid out.

use crate::geometry::{connector_curve, point_polyline_distance};
use crate::node::{Node, NodeId};
use egui::Pos2;

/// Control-point offset of connector curves (world units)
pub const CONNECTOR_CURVATURE: f32 = 50.0;
/// Number of segments a connector curve is sampled into
pub const CONNECTOR_SEGMENTS: usize = 24;

/// One exit of one node
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    /// Emitting node
    pub from_node: NodeId,
    /// Target node; `None` when the exit is unconnected
    pub to_node: Option<NodeId>,
    /// Position among the emitting node's exits
    pub exit_index: usize,
    /// Cached world-space exit anchor
    pub start: Pos2,
    /// Cached world-space entrance anchor of the target, if it exists
    pub end: Option<Pos2>,
}

impl Connector {
    /// Build the connector for `exit_index` of `from`, resolving the target's
    /// entrance through `lookup`
    pub fn from_exit<'a>(
        from: &Node,
        exit_index: usize,
        lookup: impl Fn(&NodeId) -> Option<&'a Node>,
    ) -> Option<Self> {
        let start = from.exit_anchor(exit_index)?;
        let to_node = from.exit(exit_index).cloned();
        let end = to_node.as_ref().and_then(&lookup).map(Node::entrance_anchor);
        Some(Self {
            from_node: from.id.clone(),
            to_node,
            exit_index,
            start,
            end,
        })
    }

    /// Whether the exit has a target id
    pub fn is_connected(&self) -> bool {
        self.to_node.is_some()
    }

    /// Whether the exit targets an id that does not resolve to a node
    pub fn is_dangling(&self) -> bool {
        self.to_node.is_some() && self.end.is_none()
    }

    /// Check if this connector involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.from_node == *node_id || self.to_node.as_ref() == Some(node_id)
    }

    /// World-space polyline of the drawn curve, if the connector has an end
    pub fn curve(&self) -> Option<Vec<Pos2>> {
        self.end
            .map(|end| connector_curve(self.start, end, CONNECTOR_CURVATURE, CONNECTOR_SEGMENTS))
    }

    /// Distance from a world point to the drawn curve
    pub fn distance_to(&self, point: Pos2) -> f32 {
        self.curve()
            .map_or(f32::INFINITY, |points| point_polyline_distance(point, &points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ExecNode, NodeBody};

    #[test]
    fn test_connector_from_exit() {
        let target = Node::end().with_id("t").with_position(400.0, 0.0);
        let source = Node::new(
            "s",
            NodeBody::Exec(ExecNode {
                next: Some(NodeId::new("t")),
                ..ExecNode::default()
            }),
        );

        let lookup = |id: &NodeId| (id == &target.id).then_some(&target);
        let conn = Connector::from_exit(&source, 0, lookup).unwrap();
        assert!(conn.is_connected());
        assert!(!conn.is_dangling());
        assert_eq!(conn.end, Some(target.entrance_anchor()));
        assert!(conn.involves_node(&NodeId::new("t")));
        assert!(conn.distance_to(conn.start) < 1e-3);
        assert!(Connector::from_exit(&source, 1, lookup).is_none());
    }

    #[test]
    fn test_dangling_connector() {
        let source = Node::new(
            "s",
            NodeBody::Exec(ExecNode {
                next: Some(NodeId::new("gone")),
                ..ExecNode::default()
            }),
        );
        let conn = Connector::from_exit(&source, 0, |_| None).unwrap();
        assert!(conn.is_dangling());
        assert_eq!(conn.distance_to(Pos2::ZERO), f32::INFINITY);
    }
}
