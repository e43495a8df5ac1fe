// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor interaction state machine.
//!
//! The host feeds pointer, wheel and key events into
//! [`EditorState::handle_input`]; the state mutates itself and the graph and
//! reports what happened as [`EditorAction`]s. Exactly one gesture is active
//! at a time, held in [`Mode`].

use crate::config::EditorSettings;
use crate::geometry::{rect_from_corners, rects_overlap, Viewport};
use crate::graph::{Graph, GraphError};
use crate::layout::ANCHOR_RADIUS;
use crate::node::NodeId;
use egui::{Key, Modifiers, PointerButton, Pos2, Vec2};
use indexmap::IndexSet;

/// One exit of one node, addressed by position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExitRef {
    /// Emitting node
    pub node: NodeId,
    /// Exit position on that node
    pub exit_index: usize,
}

/// What the pointer is over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hover {
    /// A node's header close button
    CloseButton(NodeId),
    /// An exit anchor
    Exit(ExitRef),
    /// A node body
    Body(NodeId),
    /// A connector curve
    Connector(ExitRef),
}

impl Hover {
    /// Node under the pointer, if any
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::CloseButton(id) | Self::Body(id) => Some(id),
            Self::Exit(exit) => Some(&exit.node),
            Self::Connector(_) => None,
        }
    }
}

/// Active gesture
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Mode {
    /// No gesture in progress
    #[default]
    Idle,
    /// Dragging the canvas
    Panning {
        /// Last pointer position (screen space)
        last: Pos2,
    },
    /// Dragging the selected nodes
    DraggingNodes {
        /// World position of the press that started the drag
        anchor: Pos2,
        /// Position of each dragged node when the drag started
        start_positions: Vec<(NodeId, Pos2)>,
    },
    /// Rubber-band selection
    RectSelecting {
        /// World corner where the gesture started
        start: Pos2,
        /// World corner under the pointer
        current: Pos2,
        /// Selection present when the gesture began
        base: IndexSet<NodeId>,
    },
    /// Waiting for a click on the node an exit should link to
    Linking {
        /// Exit being linked
        from: ExitRef,
        /// World position of the pointer
        cursor: Pos2,
    },
}

/// Input delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A pointer button was pressed
    PointerDown {
        /// Screen position
        pos: Pos2,
        /// Pressed button
        button: PointerButton,
        /// Modifiers held at the press
        modifiers: Modifiers,
        /// Host clock in milliseconds, used for double clicks
        time_ms: u64,
    },
    /// The pointer moved
    PointerMove {
        /// Screen position
        pos: Pos2,
    },
    /// A pointer button was released
    PointerUp {
        /// Screen position
        pos: Pos2,
        /// Released button
        button: PointerButton,
    },
    /// Scroll wheel; positive `delta` zooms in
    Wheel {
        /// Screen position of the pointer
        pos: Pos2,
        /// Scroll amount
        delta: f32,
    },
    /// A key was pressed
    Key(Key),
    /// The canvas was resized
    Resize(Vec2),
}

/// Outcome of handling one input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// The host should open the node's editor form
    OpenNode(NodeId),
    /// A node was removed from the graph
    NodeRemoved(NodeId),
    /// An exit was linked
    Linked {
        /// Linked exit
        from: ExitRef,
        /// New target
        to: NodeId,
    },
    /// An exit was cleared
    Unlinked(ExitRef),
    /// Linking mode ended without a link
    LinkCancelled,
    /// Nodes were dragged to new positions
    NodesMoved(Vec<NodeId>),
    /// The node selection changed
    SelectionChanged,
}

/// Graph editor interaction state
#[derive(Debug, Clone)]
pub struct EditorState {
    /// Pan/zoom of the canvas
    pub viewport: Viewport,
    /// Editor tunables
    pub settings: EditorSettings,
    mode: Mode,
    selection: IndexSet<NodeId>,
    selected_connector: Option<ExitRef>,
    hover: Option<Hover>,
    pointer: Option<Pos2>,
    last_click: Option<(NodeId, u64)>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl EditorState {
    /// Create editor state with the given settings
    pub fn new(settings: EditorSettings) -> Self {
        let mut viewport = Viewport::default();
        viewport.set_scale_limits(settings.min_scale, settings.max_scale);
        Self {
            viewport,
            settings,
            mode: Mode::Idle,
            selection: IndexSet::new(),
            selected_connector: None,
            hover: None,
            pointer: None,
            last_click: None,
        }
    }

    /// Active gesture
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Selected nodes in selection order
    pub fn selection(&self) -> &IndexSet<NodeId> {
        &self.selection
    }

    /// Check if a node is selected
    pub fn is_selected(&self, node_id: &NodeId) -> bool {
        self.selection.contains(node_id)
    }

    /// Selected connector, if any
    pub fn selected_connector(&self) -> Option<&ExitRef> {
        self.selected_connector.as_ref()
    }

    /// Current hover target
    pub fn hover(&self) -> Option<&Hover> {
        self.hover.as_ref()
    }

    /// Last known pointer position (screen space)
    pub fn pointer(&self) -> Option<Pos2> {
        self.pointer
    }

    /// Select a node (optionally add to selection)
    pub fn select_node(&mut self, node_id: NodeId, add_to_selection: bool) {
        if !add_to_selection {
            self.selection.clear();
        }
        self.selected_connector = None;
        self.selection.insert(node_id);
    }

    /// Toggle node selection
    pub fn toggle_node_selection(&mut self, node_id: NodeId) {
        if !self.selection.shift_remove(&node_id) {
            self.selection.insert(node_id);
        }
    }

    /// Clear node and connector selection
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.selected_connector = None;
    }

    /// Arm linking mode for one exit (used by the host's context menu)
    pub fn begin_linking(&mut self, graph: &Graph, node_id: &NodeId, exit_index: usize) -> Result<(), GraphError> {
        let node = graph
            .node(node_id.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        let anchor = node.exit_anchor(exit_index).ok_or(GraphError::ExitOutOfRange {
            node: node_id.clone(),
            index: exit_index,
        })?;
        self.set_mode(Mode::Linking {
            from: ExitRef {
                node: node_id.clone(),
                exit_index,
            },
            cursor: anchor,
        });
        Ok(())
    }

    /// Cancel the active gesture. Dragged nodes return to their start
    /// positions and a rectangle selection reverts to its base.
    pub fn cancel(&mut self, graph: &mut Graph) -> Option<EditorAction> {
        match std::mem::take(&mut self.mode) {
            Mode::Linking { .. } => {
                tracing::debug!("linking cancelled");
                Some(EditorAction::LinkCancelled)
            }
            Mode::DraggingNodes { start_positions, .. } => {
                for (id, start) in start_positions {
                    if let Some(node) = graph.node_mut(id.as_str()) {
                        node.x = start.x;
                        node.y = start.y;
                    }
                }
                None
            }
            Mode::RectSelecting { base, .. } => {
                self.selection = base;
                Some(EditorAction::SelectionChanged)
            }
            Mode::Idle | Mode::Panning { .. } => None,
        }
    }

    /// Remove a node and drop every reference the editor holds to it
    pub fn remove_node(&mut self, graph: &mut Graph, node_id: &NodeId) -> Option<EditorAction> {
        if let Some(exit) = &self.selected_connector {
            let targets_removed = graph
                .node(exit.node.as_str())
                .and_then(|n| n.exit(exit.exit_index))
                == Some(node_id);
            if exit.node == *node_id || targets_removed {
                self.selected_connector = None;
            }
        }

        graph.remove_node(node_id)?;

        self.selection.shift_remove(node_id);
        if self.hover.as_ref().is_some_and(|h| {
            h.node() == Some(node_id) || matches!(h, Hover::Connector(exit) if exit.node == *node_id)
        }) {
            self.hover = None;
        }
        if self.last_click.as_ref().is_some_and(|(id, _)| id == node_id) {
            self.last_click = None;
        }
        if matches!(&self.mode, Mode::Linking { from, .. } if from.node == *node_id) {
            self.set_mode(Mode::Idle);
        }
        match &mut self.mode {
            Mode::DraggingNodes { start_positions, .. } => start_positions.retain(|(id, _)| id != node_id),
            Mode::RectSelecting { base, .. } => {
                base.shift_remove(node_id);
            }
            _ => {}
        }
        Some(EditorAction::NodeRemoved(node_id.clone()))
    }

    /// Remove the selected nodes, or unlink the selected connector
    pub fn delete_selected(&mut self, graph: &mut Graph) -> Vec<EditorAction> {
        if let Some(exit) = self.selected_connector.take() {
            return match graph.clear_link(&exit.node, exit.exit_index) {
                Ok(Some(_)) => vec![EditorAction::Unlinked(exit)],
                Ok(None) => Vec::new(),
                Err(err) => {
                    tracing::warn!("could not unlink selected connector: {err}");
                    Vec::new()
                }
            };
        }

        let selected: Vec<NodeId> = self.selection.iter().cloned().collect();
        selected
            .iter()
            .filter_map(|id| self.remove_node(graph, id))
            .collect()
    }

    /// Hit-test a screen position. The topmost node wins; on a node the
    /// close button and exit anchors take precedence over the body.
    /// Connectors are only considered when no node is hit.
    pub fn hit_test(&self, graph: &Graph, screen: Pos2) -> Option<Hover> {
        let world = self.viewport.screen_to_world(screen);
        let anchor_radius = ANCHOR_RADIUS / self.viewport.scale().min(1.0);

        for node in graph.nodes().rev() {
            if node.close_button_rect().contains(world) {
                return Some(Hover::CloseButton(node.id.clone()));
            }
            let exit = node
                .exit_anchors()
                .into_iter()
                .position(|anchor| anchor.distance(world) <= anchor_radius);
            if let Some(exit_index) = exit {
                return Some(Hover::Exit(ExitRef {
                    node: node.id.clone(),
                    exit_index,
                }));
            }
            if node.rect().contains(world) {
                return Some(Hover::Body(node.id.clone()));
            }
        }

        let max_distance = self.settings.connector_hit_distance / self.viewport.scale();
        graph
            .connectors()
            .into_iter()
            .filter(|c| c.end.is_some())
            .map(|c| (c.distance_to(world), c))
            .filter(|(distance, _)| *distance <= max_distance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, c)| {
                Hover::Connector(ExitRef {
                    node: c.from_node,
                    exit_index: c.exit_index,
                })
            })
    }

    /// Handle one input event
    pub fn handle_input(&mut self, graph: &mut Graph, event: InputEvent) -> Vec<EditorAction> {
        match event {
            InputEvent::PointerDown {
                pos,
                button,
                modifiers,
                time_ms,
            } => {
                self.pointer = Some(pos);
                self.hover = self.hit_test(graph, pos);
                self.pointer_down(graph, pos, button, modifiers, time_ms)
            }
            InputEvent::PointerMove { pos } => {
                self.pointer = Some(pos);
                self.pointer_move(graph, pos);
                Vec::new()
            }
            InputEvent::PointerUp { pos, .. } => {
                self.pointer = Some(pos);
                self.pointer_up(graph, pos)
            }
            InputEvent::Wheel { pos, delta } => {
                if delta != 0.0 {
                    let step = self.settings.zoom_step;
                    let factor = if delta > 0.0 { step } else { 1.0 / step };
                    self.viewport.zoom_at(pos, factor);
                }
                Vec::new()
            }
            InputEvent::Key(key) => self.key_pressed(graph, key),
            InputEvent::Resize(size) => {
                self.viewport.canvas_size = size;
                Vec::new()
            }
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if std::mem::discriminant(&self.mode) != std::mem::discriminant(&mode) {
            tracing::debug!("interaction mode {} -> {}", mode_name(&self.mode), mode_name(&mode));
        }
        self.mode = mode;
    }

    fn pointer_down(
        &mut self,
        graph: &mut Graph,
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
        time_ms: u64,
    ) -> Vec<EditorAction> {
        let world = self.viewport.screen_to_world(pos);

        if let Mode::Linking { from, .. } = &self.mode {
            let from = from.clone();
            return self.finish_linking(graph, from, world, button);
        }

        if button == PointerButton::Middle {
            self.set_mode(Mode::Panning { last: pos });
            return Vec::new();
        }
        if button != PointerButton::Primary {
            return Vec::new();
        }

        let mut actions = Vec::new();
        let additive = modifiers.shift || modifiers.ctrl || modifiers.command;

        match self.hover.clone() {
            Some(Hover::CloseButton(id)) => {
                actions.extend(self.remove_node(graph, &id));
            }
            Some(Hover::Exit(exit)) => {
                self.set_mode(Mode::Linking { from: exit, cursor: world });
            }
            Some(Hover::Body(id)) => {
                let double = self.last_click.as_ref().is_some_and(|(last, at)| {
                    *last == id && time_ms.saturating_sub(*at) <= self.settings.double_click_ms
                });
                if double {
                    self.last_click = None;
                    actions.push(EditorAction::OpenNode(id.clone()));
                } else {
                    self.last_click = Some((id.clone(), time_ms));
                }

                let before = self.selection.clone();
                if additive {
                    self.toggle_node_selection(id.clone());
                } else if !self.selection.contains(&id) {
                    self.select_node(id.clone(), false);
                }
                self.selected_connector = None;
                if self.selection != before {
                    actions.push(EditorAction::SelectionChanged);
                }

                if self.selection.contains(&id) {
                    let start_positions = self
                        .selection
                        .iter()
                        .filter_map(|sid| graph.node(sid.as_str()).map(|n| (sid.clone(), n.position())))
                        .collect();
                    self.set_mode(Mode::DraggingNodes {
                        anchor: world,
                        start_positions,
                    });
                }
            }
            Some(Hover::Connector(exit)) => {
                if !self.selection.is_empty() {
                    actions.push(EditorAction::SelectionChanged);
                }
                self.selection.clear();
                self.selected_connector = Some(exit);
            }
            None => {
                self.last_click = None;
                if additive {
                    self.set_mode(Mode::RectSelecting {
                        start: world,
                        current: world,
                        base: self.selection.clone(),
                    });
                } else {
                    if !self.selection.is_empty() {
                        actions.push(EditorAction::SelectionChanged);
                    }
                    self.clear_selection();
                    self.set_mode(Mode::Panning { last: pos });
                }
            }
        }
        actions
    }

    fn finish_linking(&mut self, graph: &mut Graph, from: ExitRef, world: Pos2, button: PointerButton) -> Vec<EditorAction> {
        if button != PointerButton::Primary {
            return self.cancel(graph).into_iter().collect();
        }

        let target = graph.node_at(world).map(|n| n.id.clone());
        match target {
            Some(to) if to == from.node => Vec::new(),
            Some(to) => {
                self.set_mode(Mode::Idle);
                match graph.set_link(&from.node, from.exit_index, &to) {
                    Ok(_) => {
                        tracing::debug!("linked {}#{} -> {to}", from.node, from.exit_index);
                        vec![EditorAction::Linked { from, to }]
                    }
                    Err(err) => {
                        tracing::warn!("link failed: {err}");
                        vec![EditorAction::LinkCancelled]
                    }
                }
            }
            None => self.cancel(graph).into_iter().collect(),
        }
    }

    fn pointer_move(&mut self, graph: &mut Graph, pos: Pos2) {
        let world = self.viewport.screen_to_world(pos);
        match &mut self.mode {
            Mode::Idle => self.hover = self.hit_test(graph, pos),
            Mode::Panning { last } => {
                let delta = pos - *last;
                *last = pos;
                self.viewport.pan_by(delta);
            }
            Mode::DraggingNodes {
                anchor,
                start_positions,
            } => {
                let delta = world - *anchor;
                for (id, start) in start_positions.iter() {
                    if let Some(node) = graph.node_mut(id.as_str()) {
                        node.x = start.x + delta.x;
                        node.y = start.y + delta.y;
                    }
                }
            }
            Mode::RectSelecting { start, current, base } => {
                *current = world;
                self.selection = rect_selection(graph, *start, *current, base);
            }
            Mode::Linking { cursor, .. } => {
                *cursor = world;
                self.hover = self.hit_test(graph, pos);
            }
        }
    }

    fn pointer_up(&mut self, graph: &mut Graph, pos: Pos2) -> Vec<EditorAction> {
        let world = self.viewport.screen_to_world(pos);
        match std::mem::take(&mut self.mode) {
            Mode::Panning { .. } => {
                self.set_mode(Mode::Idle);
                Vec::new()
            }
            Mode::DraggingNodes { anchor, start_positions } => {
                self.set_mode(Mode::Idle);
                let mut moved = Vec::new();
                for (id, start) in start_positions {
                    if let Some(node) = graph.node_mut(id.as_str()) {
                        let snapped = self.settings.snap(start + (world - anchor));
                        node.x = snapped.x;
                        node.y = snapped.y;
                        if snapped != start {
                            moved.push(id);
                        }
                    }
                }
                if moved.is_empty() {
                    Vec::new()
                } else {
                    vec![EditorAction::NodesMoved(moved)]
                }
            }
            Mode::RectSelecting { start, base, .. } => {
                self.selection = rect_selection(graph, start, world, &base);
                self.set_mode(Mode::Idle);
                vec![EditorAction::SelectionChanged]
            }
            // Linking is committed by a click, not by the release that armed it
            mode @ Mode::Linking { .. } => {
                self.mode = mode;
                Vec::new()
            }
            Mode::Idle => Vec::new(),
        }
    }

    fn key_pressed(&mut self, graph: &mut Graph, key: Key) -> Vec<EditorAction> {
        match key {
            Key::Escape if self.mode == Mode::Idle => {
                if self.selection.is_empty() && self.selected_connector.is_none() {
                    return Vec::new();
                }
                self.clear_selection();
                vec![EditorAction::SelectionChanged]
            }
            Key::Escape => self.cancel(graph).into_iter().collect(),
            Key::Delete | Key::Backspace if self.mode == Mode::Idle => self.delete_selected(graph),
            _ => Vec::new(),
        }
    }
}

fn mode_name(mode: &Mode) -> &'static str {
    match mode {
        Mode::Idle => "Idle",
        Mode::Panning { .. } => "Panning",
        Mode::DraggingNodes { .. } => "DraggingNodes",
        Mode::RectSelecting { .. } => "RectSelecting",
        Mode::Linking { .. } => "Linking",
    }
}

/// `base` plus every node whose bounds overlap the rectangle `a`-`b`
fn rect_selection(graph: &Graph, a: Pos2, b: Pos2, base: &IndexSet<NodeId>) -> IndexSet<NodeId> {
    let rect = rect_from_corners(a, b);
    let mut selection = base.clone();
    selection.extend(
        graph
            .nodes()
            .filter(|node| rects_overlap(rect, node.rect()))
            .map(|node| node.id.clone()),
    );
    selection
}
