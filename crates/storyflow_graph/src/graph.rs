// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and variables.

use crate::connection::Connector;
use crate::layout::{MonospaceMeasurer, TextMeasurer};
use crate::node::{Node, NodeId};
use crate::variable::{resolve_declared, Variable, VariableSet, VariableSource};
use egui::Pos2;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Id of the node the runner prefers as entry point
pub const ROOT_NODE_ID: &str = "root";

/// Persisted form of a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDocument {
    /// Graph name
    pub name: String,
    /// Nodes in declaration order
    pub nodes: Vec<Node>,
    /// Declared variables
    pub variables: Vec<Variable>,
}

/// An event graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in declaration order (later nodes draw on top)
    nodes: IndexMap<NodeId, Node>,
    /// Declared variables
    pub variables: Vec<Variable>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            variables: Vec::new(),
        }
    }

    /// Build a graph from its persisted form, rejecting duplicate ids.
    ///
    /// Stored heights are not trusted: every node is laid out again with
    /// [`MonospaceMeasurer`]. Hosts with real fonts follow up with
    /// [`Graph::relayout`] (see `render::EguiMeasurer`) or use
    /// [`Graph::from_document_with`].
    pub fn from_document(doc: GraphDocument) -> Result<Self, GraphError> {
        Self::from_document_with(doc, &MonospaceMeasurer::default())
    }

    /// Build a graph from its persisted form, laying nodes out with `measurer`
    pub fn from_document_with(doc: GraphDocument, measurer: &dyn TextMeasurer) -> Result<Self, GraphError> {
        let mut graph = Self::new(doc.name);
        graph.variables = doc.variables;
        for node in doc.nodes {
            graph.add_node(node)?;
        }
        graph.relayout(measurer);
        Ok(graph)
    }

    /// Persisted form of this graph
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            name: self.name.clone(),
            nodes: self.nodes.values().cloned().collect(),
            variables: self.variables.clone(),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Remove a node and clear every exit elsewhere that pointed at it
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        let removed = self.nodes.shift_remove(node_id)?;
        let cleared: usize = self
            .nodes
            .values_mut()
            .map(|node| node.clear_links_to(node_id))
            .sum();
        tracing::debug!("removed node {node_id}, cleared {cleared} incoming link(s)");
        Some(removed)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Whether a node with this id exists
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes mutably
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Entry node: `"root"` if present, else the first declared node
    pub fn start_node_id(&self) -> Option<&NodeId> {
        self.nodes
            .get_key_value(ROOT_NODE_ID)
            .map(|(id, _)| id)
            .or_else(|| self.nodes.keys().next())
    }

    /// Point exit `exit_index` of `from` at `to`, returning the previous target
    pub fn set_link(
        &mut self,
        from: &NodeId,
        exit_index: usize,
        to: &NodeId,
    ) -> Result<Option<NodeId>, GraphError> {
        if !self.nodes.contains_key(to) {
            return Err(GraphError::NodeNotFound(to.clone()));
        }
        self.nodes
            .get_mut(from)
            .ok_or_else(|| GraphError::NodeNotFound(from.clone()))?
            .set_exit(exit_index, Some(to.clone()))
    }

    /// Unlink one exit, returning the previous target
    pub fn clear_link(&mut self, from: &NodeId, exit_index: usize) -> Result<Option<NodeId>, GraphError> {
        self.nodes
            .get_mut(from)
            .ok_or_else(|| GraphError::NodeNotFound(from.clone()))?
            .set_exit(exit_index, None)
    }

    /// Connectors for every exit of every node, in node then exit order
    pub fn connectors(&self) -> Vec<Connector> {
        self.nodes
            .values()
            .flat_map(|node| self.connectors_from(node))
            .collect()
    }

    /// Connectors for one node's exits
    pub fn connectors_from(&self, node: &Node) -> Vec<Connector> {
        (0..node.exit_count())
            .filter_map(|i| Connector::from_exit(node, i, |id| self.nodes.get(id)))
            .collect()
    }

    /// Connectors that end at `node_id`
    pub fn connectors_to(&self, node_id: &NodeId) -> Vec<Connector> {
        self.connectors()
            .into_iter()
            .filter(|c| c.to_node.as_ref() == Some(node_id))
            .collect()
    }

    /// Topmost node whose bounds contain a world position
    pub fn node_at(&self, world: Pos2) -> Option<&Node> {
        self.nodes.values().rev().find(|node| node.rect().contains(world))
    }

    /// Recompute the height of every node
    pub fn relayout(&mut self, measurer: &dyn TextMeasurer) {
        for node in self.nodes_mut() {
            node.compute_height(measurer);
        }
    }

    /// Variables visible to this graph, including imports resolved through
    /// `source`
    pub fn visible_variables(&self, source: &dyn VariableSource) -> VariableSet {
        resolve_declared(&self.name, &self.variables, source)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when editing a graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node id already in use
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Exit index past the node's declared exits
    #[error("Node {node} has no exit {index}")]
    ExitOutOfRange {
        /// Node that was addressed
        node: NodeId,
        /// Requested exit
        index: usize,
    },
}
