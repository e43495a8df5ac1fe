// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural validation of event graphs.
//!
//! Checks are local to each node: every declared exit must be linked. No
//! reachability analysis is performed, so orphaned nodes are not reported.

use crate::graph::Graph;
use crate::node::{Node, NodeBody, NodeId};
use std::fmt;

/// A structural problem attributed to one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending node
    pub node_id: NodeId,
    /// Human-readable description
    pub message: String,
}

impl ValidationError {
    fn new(node: &Node, message: impl Into<String>) -> Self {
        Self {
            node_id: node.id.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.node_id, self.message)
    }
}

/// Missing-link errors for one node
pub fn validate_node(node: &Node) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    match &node.body {
        NodeBody::Exec(exec) => {
            if exec.next.is_none() {
                errors.push(ValidationError::new(node, "Exec node has no next node"));
            }
        }
        NodeBody::Choice(choice) => {
            if choice.choices.is_empty() {
                errors.push(ValidationError::new(node, "Choice node has no choices"));
            }
            for (i, entry) in choice.choices.iter().enumerate() {
                if entry.next.is_none() {
                    errors.push(ValidationError::new(
                        node,
                        format!("Choice {} (\"{}\") has no next node", i + 1, entry.text),
                    ));
                }
            }
        }
        NodeBody::Switch(switch) => {
            for (i, case) in switch.cases.iter().enumerate() {
                if case.next.is_none() {
                    errors.push(ValidationError::new(
                        node,
                        format!("Case {} (\"{}\") has no next node", i + 1, case.condition_str),
                    ));
                }
            }
            if switch.default_next.is_none() {
                errors.push(ValidationError::new(node, "Switch node has no default next node"));
            }
        }
        NodeBody::End | NodeBody::Comment(_) => {}
    }
    errors
}

/// Missing-link errors for every node, in node order
pub fn validate(graph: &Graph) -> Vec<ValidationError> {
    graph.nodes().flat_map(validate_node).collect()
}

/// Exits that name a node id absent from the graph
pub fn validate_targets(graph: &Graph) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for node in graph.nodes() {
        for (i, target) in node.exits().into_iter().enumerate() {
            if let Some(target) = target.filter(|t| !graph.contains(t.as_str())) {
                errors.push(ValidationError::new(
                    node,
                    format!("Exit {} points at missing node '{target}'", i + 1),
                ));
            }
        }
    }
    errors
}

/// Both missing links and dangling targets, grouped by node
pub fn validate_all(graph: &Graph) -> Vec<ValidationError> {
    let dangling = validate_targets(graph);
    graph
        .nodes()
        .flat_map(|node| {
            let mut errors = validate_node(node);
            errors.extend(dangling.iter().filter(|e| e.node_id == node.id).cloned());
            errors
        })
        .collect()
}
