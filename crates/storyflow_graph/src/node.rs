// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for event graphs.
//!
//! A node is a positioned envelope ([`Node`]) around a closed set of variant
//! payloads ([`NodeBody`]). Variant behavior (height, exits, anchors) is
//! dispatched with `match`.
//!
//! The serialized shape is flat: `{ id, x, y, kind, ...variant fields, h }`,
//! with empty links written as `""`.

use crate::graph::GraphError;
use crate::layout::{
    line_count, TextMeasurer, MonospaceMeasurer, CLOSE_BUTTON_SIZE, END_HEIGHT, EXIT_ROW_HEIGHT,
    LINE_HEIGHT, MIN_CHOICE_HEIGHT, MIN_COMMENT_HEIGHT, MIN_EXEC_HEIGHT, MIN_SWITCH_HEIGHT,
    NODE_HEADER_HEIGHT, NODE_PADDING, NODE_WIDTH,
};
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node within a graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random node ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Serde adapter for optional links: `None` is written as `""`, and both
/// `""` and `null` read back as `None`.
pub(crate) mod link {
    use super::NodeId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NodeId>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_ref().map_or("", NodeId::as_str))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NodeId>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.filter(|s| !s.is_empty()).map(NodeId))
    }
}

/// Node discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Runs an action script and shows text
    Exec,
    /// Presents a filtered list of choices
    Choice,
    /// Branches on the first matching condition
    Switch,
    /// Terminates the event
    End,
    /// Annotation, never traversed
    Comment,
}

impl NodeKind {
    /// Title shown in the node header
    pub fn title(&self) -> &'static str {
        match self {
            Self::Exec => "Exec",
            Self::Choice => "Choice",
            Self::Switch => "Switch",
            Self::End => "End",
            Self::Comment => "Comment",
        }
    }

    /// Header color (for UI)
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::Exec => [70, 100, 130],
            Self::Choice => [120, 90, 140],
            Self::Switch => [150, 110, 60],
            Self::End => [140, 60, 60],
            Self::Comment => [90, 90, 90],
        }
    }

    /// All kinds, in palette order
    pub fn all() -> &'static [NodeKind] {
        &[Self::Exec, Self::Choice, Self::Switch, Self::End, Self::Comment]
    }
}

/// Exec payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecNode {
    /// Display text
    pub text: String,
    /// Action script, one call per line
    pub action_script: String,
    /// Following node
    #[serde(with = "link")]
    pub next: Option<NodeId>,
}

/// One entry of a Choice node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChoiceEntry {
    /// Label shown to the player
    pub text: String,
    /// Visibility condition; empty means always shown
    pub condition_str: String,
    /// Action script run when the entry is picked
    pub eval_str: String,
    /// Text prepended to the next displayed text after picking
    pub prefix_text: String,
    /// Target when picked
    #[serde(with = "link")]
    pub next: Option<NodeId>,
}

impl ChoiceEntry {
    /// Create an unconditional, unlinked entry
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Choice payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChoiceNode {
    /// Prompt shown above the choices
    pub prompt_text: String,
    /// Entries in display order
    pub choices: Vec<ChoiceEntry>,
}

/// One case of a Switch node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchCase {
    /// Condition expression
    pub condition_str: String,
    /// Target when the condition holds
    #[serde(with = "link")]
    pub next: Option<NodeId>,
}

impl SwitchCase {
    /// Create an unlinked case
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition_str: condition.into(),
            next: None,
        }
    }
}

/// Switch payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchNode {
    /// Cases in evaluation order
    pub cases: Vec<SwitchCase>,
    /// Fallback target
    #[serde(with = "link")]
    pub default_next: Option<NodeId>,
}

/// Comment payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentNode {
    /// Free text
    pub text: String,
}

/// Variant payload, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeBody {
    /// See [`ExecNode`]
    Exec(ExecNode),
    /// See [`ChoiceNode`]
    Choice(ChoiceNode),
    /// See [`SwitchNode`]
    Switch(SwitchNode),
    /// Terminal node
    End,
    /// See [`CommentNode`]
    Comment(CommentNode),
}

impl NodeBody {
    /// Discriminant of this payload
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Exec(_) => NodeKind::Exec,
            Self::Choice(_) => NodeKind::Choice,
            Self::Switch(_) => NodeKind::Switch,
            Self::End => NodeKind::End,
            Self::Comment(_) => NodeKind::Comment,
        }
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// World-space left edge
    pub x: f32,
    /// World-space top edge
    pub y: f32,
    /// Variant payload
    #[serde(flatten)]
    pub body: NodeBody,
    /// Derived height; refresh with [`Node::compute_height`]
    #[serde(default)]
    pub h: f32,
    /// Height of the wrapped text block under the header, refreshed with `h`
    #[serde(skip)]
    text_block: f32,
}

// The cached text block follows from the content, so it takes no part in
// equality
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.x == other.x && self.y == other.y && self.body == other.body && self.h == other.h
    }
}

impl Node {
    /// Create a node with an explicit id and payload at the origin
    pub fn new(id: impl Into<NodeId>, body: NodeBody) -> Self {
        let mut node = Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            body,
            h: 0.0,
            text_block: 0.0,
        };
        node.compute_height(&MonospaceMeasurer::default());
        node
    }

    /// New Exec node with a generated id
    pub fn exec() -> Self {
        Self::new(
            NodeId::generate(),
            NodeBody::Exec(ExecNode {
                text: "New text".to_string(),
                ..ExecNode::default()
            }),
        )
    }

    /// New Choice node with a generated id and one entry
    pub fn choice() -> Self {
        Self::new(
            NodeId::generate(),
            NodeBody::Choice(ChoiceNode {
                prompt_text: String::new(),
                choices: vec![ChoiceEntry::new("Choice 1")],
            }),
        )
    }

    /// New Switch node with a generated id and one case
    pub fn switch() -> Self {
        Self::new(
            NodeId::generate(),
            NodeBody::Switch(SwitchNode {
                cases: vec![SwitchCase::new("true")],
                default_next: None,
            }),
        )
    }

    /// New End node with a generated id
    pub fn end() -> Self {
        Self::new(NodeId::generate(), NodeBody::End)
    }

    /// New Comment node with a generated id
    pub fn comment() -> Self {
        Self::new(NodeId::generate(), NodeBody::Comment(CommentNode::default()))
    }

    /// New node of the given kind with default content
    pub fn of_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Exec => Self::exec(),
            NodeKind::Choice => Self::choice(),
            NodeKind::Switch => Self::switch(),
            NodeKind::End => Self::end(),
            NodeKind::Comment => Self::comment(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Replace the id
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Discriminant
    pub fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    /// Top-left corner
    pub fn position(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    /// World-space bounds
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.position(), Vec2::new(NODE_WIDTH, self.h))
    }

    /// World-space bounds of the header close button
    pub fn close_button_rect(&self) -> Rect {
        let inset = (NODE_HEADER_HEIGHT - CLOSE_BUTTON_SIZE) * 0.5;
        Rect::from_min_size(
            Pos2::new(self.x + NODE_WIDTH - inset - CLOSE_BUTTON_SIZE, self.y + inset),
            Vec2::splat(CLOSE_BUTTON_SIZE),
        )
    }

    /// Main text block, if the variant has one
    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Exec(exec) => Some(&exec.text),
            NodeBody::Choice(choice) => Some(&choice.prompt_text),
            NodeBody::Comment(comment) => Some(&comment.text),
            NodeBody::Switch(_) | NodeBody::End => None,
        }
    }

    /// Recompute and store `h` from the current content
    pub fn compute_height(&mut self, measurer: &dyn TextMeasurer) -> f32 {
        let text_block = |text: &str| {
            let lines = line_count(text, measurer);
            if lines == 0 {
                0.0
            } else {
                NODE_PADDING + lines as f32 * LINE_HEIGHT
            }
        };

        self.text_block = self.body_text().map_or(0.0, text_block);
        self.h = match &self.body {
            NodeBody::Exec(_) => (NODE_HEADER_HEIGHT + self.text_block + NODE_PADDING).max(MIN_EXEC_HEIGHT),
            NodeBody::Choice(choice) => (NODE_HEADER_HEIGHT
                + self.text_block
                + choice.choices.len() as f32 * EXIT_ROW_HEIGHT
                + NODE_PADDING)
                .max(MIN_CHOICE_HEIGHT),
            NodeBody::Switch(switch) => (NODE_HEADER_HEIGHT
                + (switch.cases.len() + 1) as f32 * EXIT_ROW_HEIGHT
                + NODE_PADDING)
                .max(MIN_SWITCH_HEIGHT),
            NodeBody::End => END_HEIGHT,
            NodeBody::Comment(_) => (NODE_HEADER_HEIGHT + self.text_block + NODE_PADDING).max(MIN_COMMENT_HEIGHT),
        };
        self.h
    }

    /// Number of declared exits
    pub fn exit_count(&self) -> usize {
        match &self.body {
            NodeBody::Exec(_) => 1,
            NodeBody::Choice(choice) => choice.choices.len(),
            NodeBody::Switch(switch) => switch.cases.len() + 1,
            NodeBody::End | NodeBody::Comment(_) => 0,
        }
    }

    /// Exit targets in exit-index order; Switch's default is last
    pub fn exits(&self) -> Vec<Option<&NodeId>> {
        match &self.body {
            NodeBody::Exec(exec) => vec![exec.next.as_ref()],
            NodeBody::Choice(choice) => choice.choices.iter().map(|c| c.next.as_ref()).collect(),
            NodeBody::Switch(switch) => switch
                .cases
                .iter()
                .map(|c| c.next.as_ref())
                .chain(std::iter::once(switch.default_next.as_ref()))
                .collect(),
            NodeBody::End | NodeBody::Comment(_) => Vec::new(),
        }
    }

    /// Label for each exit (for UI)
    pub fn exit_labels(&self) -> Vec<String> {
        match &self.body {
            NodeBody::Exec(_) => vec!["next".to_string()],
            NodeBody::Choice(choice) => choice.choices.iter().map(|c| c.text.clone()).collect(),
            NodeBody::Switch(switch) => switch
                .cases
                .iter()
                .map(|c| c.condition_str.clone())
                .chain(std::iter::once("default".to_string()))
                .collect(),
            NodeBody::End | NodeBody::Comment(_) => Vec::new(),
        }
    }

    fn exit_slot_mut(&mut self, index: usize) -> Option<&mut Option<NodeId>> {
        match &mut self.body {
            NodeBody::Exec(exec) if index == 0 => Some(&mut exec.next),
            NodeBody::Choice(choice) => choice.choices.get_mut(index).map(|c| &mut c.next),
            NodeBody::Switch(switch) => {
                if index < switch.cases.len() {
                    Some(&mut switch.cases[index].next)
                } else if index == switch.cases.len() {
                    Some(&mut switch.default_next)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Target of one exit
    pub fn exit(&self, index: usize) -> Option<&NodeId> {
        self.exits().get(index).copied().flatten()
    }

    /// Point an exit at `target` (or clear it), returning the previous target
    pub fn set_exit(&mut self, index: usize, target: Option<NodeId>) -> Result<Option<NodeId>, GraphError> {
        let id = self.id.clone();
        let slot = self
            .exit_slot_mut(index)
            .ok_or(GraphError::ExitOutOfRange { node: id, index })?;
        Ok(std::mem::replace(slot, target))
    }

    /// Clear every exit that points at `target`; returns how many were cleared
    pub fn clear_links_to(&mut self, target: &NodeId) -> usize {
        let mut cleared = 0;
        for index in 0..self.exit_count() {
            if let Some(slot) = self.exit_slot_mut(index) {
                if slot.as_ref() == Some(target) {
                    *slot = None;
                    cleared += 1;
                }
            }
        }
        cleared
    }

    /// Where incoming connectors attach
    pub fn entrance_anchor(&self) -> Pos2 {
        Pos2::new(self.x, self.y + self.h * 0.5)
    }

    /// Where each outgoing connector starts, in exit-index order. Choice and
    /// Switch rows stack right below the header and prompt block; any height
    /// added by the variant minimum stays below the last row.
    pub fn exit_anchors(&self) -> Vec<Pos2> {
        let right = self.x + NODE_WIDTH;
        match &self.body {
            NodeBody::Exec(_) => vec![Pos2::new(right, self.y + self.h * 0.5)],
            NodeBody::Choice(_) | NodeBody::Switch(_) => {
                let rows = self.exit_count();
                let top = self.y + NODE_HEADER_HEIGHT + self.text_block;
                (0..rows)
                    .map(|i| Pos2::new(right, top + (i as f32 + 0.5) * EXIT_ROW_HEIGHT))
                    .collect()
            }
            NodeBody::End | NodeBody::Comment(_) => Vec::new(),
        }
    }

    /// Anchor of one exit
    pub fn exit_anchor(&self, index: usize) -> Option<Pos2> {
        self.exit_anchors().get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(node: &Node) -> Node {
        let json = serde_json::to_string(node).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    fn sample_nodes() -> Vec<Node> {
        let exec = Node::new(
            "a",
            NodeBody::Exec(ExecNode {
                text: "Hello @name".to_string(),
                action_script: "SET_NUM(x, 1)\nMOD(x, 2)".to_string(),
                next: Some(NodeId::new("b")),
            }),
        )
        .with_position(10.0, -20.5);

        let choice = Node::new(
            "b",
            NodeBody::Choice(ChoiceNode {
                prompt_text: "Pick".to_string(),
                choices: vec![
                    ChoiceEntry {
                        text: "Yes".to_string(),
                        condition_str: "IS(ok)".to_string(),
                        eval_str: "SET_BOOL(said_yes, true)".to_string(),
                        prefix_text: "You agree.".to_string(),
                        next: Some(NodeId::new("c")),
                    },
                    ChoiceEntry::new("No"),
                ],
            }),
        );

        let switch = Node::new(
            "c",
            NodeBody::Switch(SwitchNode {
                cases: vec![SwitchCase {
                    condition_str: "GT(x, 2)".to_string(),
                    next: Some(NodeId::new("d")),
                }],
                default_next: None,
            }),
        );

        vec![
            exec,
            choice,
            switch,
            Node::new("d", NodeBody::End),
            Node::new("e", NodeBody::Comment(CommentNode { text: "note".to_string() })),
            Node::new("f", NodeBody::Exec(ExecNode::default())),
            Node::new("g", NodeBody::Choice(ChoiceNode::default())),
            Node::new("h", NodeBody::Switch(SwitchNode::default())),
        ]
    }

    #[test]
    fn test_roundtrip_all_variants() {
        for node in sample_nodes() {
            assert_eq!(roundtrip(&node), node);
        }
    }

    #[test]
    fn test_serialized_shape() {
        let node = Node::new("n1", NodeBody::Exec(ExecNode::default())).with_position(1.0, 2.0);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["id"], "n1");
        assert_eq!(value["kind"], "exec");
        assert_eq!(value["x"], 1.0);
        assert_eq!(value["next"], "");
        assert_eq!(value["actionScript"], "");
        assert!(value.get("h").is_some());

        let switch = Node::new("s", NodeBody::Switch(SwitchNode::default()));
        let value = serde_json::to_value(&switch).unwrap();
        assert_eq!(value["kind"], "switch");
        assert_eq!(value["defaultNext"], "");
        assert_eq!(value["cases"], serde_json::json!([]));
    }

    #[test]
    fn test_null_and_missing_links_read_as_empty() {
        let json = r#"{"id":"a","x":0,"y":0,"kind":"exec","text":"hi","next":null}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.exit(0), None);
        assert_eq!(node.h, 0.0);

        let json = r#"{"id":"b","x":0,"y":0,"kind":"switch","cases":[{"conditionStr":"true"}]}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.exits(), vec![None, None]);
    }

    #[test]
    fn test_height_idempotent_and_grows_with_text() {
        let measurer = MonospaceMeasurer::default();
        let mut node = Node::exec();
        let first = node.compute_height(&measurer);
        assert_eq!(node.compute_height(&measurer), first);
        assert!(first >= MIN_EXEC_HEIGHT);

        if let NodeBody::Exec(exec) = &mut node.body {
            exec.text = "word ".repeat(60);
        }
        let taller = node.compute_height(&measurer);
        assert!(taller > first);
    }

    #[test]
    fn test_height_tracks_entry_lists() {
        let measurer = MonospaceMeasurer::default();
        let mut node = Node::switch();
        let before = node.compute_height(&measurer);
        if let NodeBody::Switch(switch) = &mut node.body {
            for i in 0..4 {
                switch.cases.push(SwitchCase::new(format!("EQ(a, {i})")));
            }
        }
        let after = node.compute_height(&measurer);
        assert_eq!(after - before, 4.0 * EXIT_ROW_HEIGHT);
        assert_eq!(Node::end().h, END_HEIGHT);
    }

    #[test]
    fn test_exit_anchor_geometry() {
        let node = Node::exec().with_position(100.0, 50.0);
        assert_eq!(node.entrance_anchor(), Pos2::new(100.0, 50.0 + node.h / 2.0));
        assert_eq!(node.exit_anchors(), vec![Pos2::new(100.0 + NODE_WIDTH, 50.0 + node.h / 2.0)]);

        let mut choice = Node::new(
            "c",
            NodeBody::Choice(ChoiceNode {
                prompt_text: "Prompt".to_string(),
                choices: vec![ChoiceEntry::new("a"), ChoiceEntry::new("b"), ChoiceEntry::new("c")],
            }),
        );
        choice.compute_height(&MonospaceMeasurer::default());
        let anchors = choice.exit_anchors();
        assert_eq!(anchors.len(), 3);
        // Rows start right after the header and one-line prompt block
        let first_row_top = NODE_HEADER_HEIGHT + NODE_PADDING + LINE_HEIGHT;
        assert_eq!(anchors[0].y, first_row_top + EXIT_ROW_HEIGHT / 2.0);
        assert_eq!(anchors[1].y - anchors[0].y, EXIT_ROW_HEIGHT);

        // A default Choice is held at its minimum height; rows still start
        // under the header
        let small = Node::choice().with_position(0.0, 10.0);
        assert_eq!(small.h, MIN_CHOICE_HEIGHT);
        assert_eq!(small.exit_anchors(), vec![Pos2::new(NODE_WIDTH, 10.0 + NODE_HEADER_HEIGHT + EXIT_ROW_HEIGHT / 2.0)]);

        // Cached text block does not affect equality after a reload
        assert_eq!(roundtrip(&choice), choice);

        assert_eq!(Node::switch().exit_anchors().len(), 2);
        assert!(Node::end().exit_anchors().is_empty());
        assert!(Node::comment().exit_anchors().is_empty());
    }

    #[test]
    fn test_set_exit_and_clear() {
        let mut node = Node::switch();
        node.set_exit(0, Some(NodeId::new("x"))).unwrap();
        node.set_exit(1, Some(NodeId::new("x"))).unwrap();
        assert!(node.set_exit(2, None).is_err());
        assert_eq!(node.clear_links_to(&NodeId::new("x")), 2);
        assert_eq!(node.exits(), vec![None, None]);

        let mut end = Node::end();
        assert!(end.set_exit(0, Some(NodeId::new("x"))).is_err());
    }

    #[test]
    fn test_generated_ids_unique() {
        assert_ne!(Node::exec().id, Node::exec().id);
    }
}
