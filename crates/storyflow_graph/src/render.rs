// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph rendering.
//!
//! [`build_display_list`] is a pure function of the graph and editor state
//! that produces screen-space [`DrawCommand`]s; [`paint`] replays them onto
//! an egui painter. Keeping the two apart lets the frame be inspected in
//! tests without a GPU or an egui context.

use crate::connection::{CONNECTOR_CURVATURE, CONNECTOR_SEGMENTS};
use crate::geometry::{connector_curve, rect_from_corners, Viewport};
use crate::graph::Graph;
use crate::interaction::{EditorState, ExitRef, Hover, Mode};
use crate::layout::{
    wrap_text, TextMeasurer, ANCHOR_RADIUS, EXIT_ROW_HEIGHT, LINE_HEIGHT, NODE_HEADER_HEIGHT,
    NODE_PADDING, TEXT_WIDTH,
};
use crate::node::{Node, NodeBody, NodeId};
use crate::validation::ValidationError;
use egui::{Align2, Color32, FontId, Pos2, Rect, Stroke, TextureId, Vec2};
use std::collections::HashSet;

const NODE_ROUNDING: f32 = 6.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;
const CONNECTION_THICKNESS: f32 = 2.5;
const TITLE_FONT_SIZE: f32 = 12.0;
const BODY_FONT_SIZE: f32 = 12.0;
const LABEL_FONT_SIZE: f32 = 10.0;
const SPRITE_PREVIEW_SIZE: f32 = 96.0;
/// Grid lines closer than this many pixels are not drawn
const MIN_GRID_PIXELS: f32 = 4.0;

/// Resolves sprite names to textures for preview overlays
pub trait SpriteLookup {
    /// Texture for `name`, if it is loaded
    fn lookup(&self, name: &str) -> Option<TextureId>;
}

/// Lookup that knows no sprites
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSprites;

impl SpriteLookup for NoSprites {
    fn lookup(&self, _name: &str) -> Option<TextureId> {
        None
    }
}

/// Text measurement backed by egui's font atlas
pub struct EguiMeasurer {
    ctx: egui::Context,
    font: FontId,
}

impl EguiMeasurer {
    /// Measure with the body font of the given context
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            font: FontId::proportional(BODY_FONT_SIZE),
        }
    }
}

impl TextMeasurer for EguiMeasurer {
    fn text_width(&self, text: &str) -> f32 {
        self.ctx.fonts(|fonts| {
            fonts
                .layout_no_wrap(text.to_owned(), self.font.clone(), Color32::WHITE)
                .size()
                .x
        })
    }
}

/// One screen-space drawing primitive
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Straight line
    Line {
        /// Endpoints
        points: [Pos2; 2],
        /// Stroke
        stroke: Stroke,
    },
    /// Open polyline
    Path {
        /// Points in order
        points: Vec<Pos2>,
        /// Stroke
        stroke: Stroke,
    },
    /// Filled and/or outlined rectangle
    Rect {
        /// Bounds
        rect: Rect,
        /// Corner rounding
        rounding: egui::Rounding,
        /// Fill color
        fill: Color32,
        /// Outline
        stroke: Stroke,
    },
    /// Filled and/or outlined circle
    Circle {
        /// Center
        center: Pos2,
        /// Radius
        radius: f32,
        /// Fill color
        fill: Color32,
        /// Outline
        stroke: Stroke,
    },
    /// Single line of text
    Text {
        /// Anchor position
        pos: Pos2,
        /// How `pos` relates to the text bounds
        anchor: Align2,
        /// Text
        text: String,
        /// Font size in pixels
        size: f32,
        /// Color
        color: Color32,
    },
    /// Sprite drawn through [`SpriteLookup`]
    Sprite {
        /// Bounds
        rect: Rect,
        /// Sprite name
        name: String,
    },
}

/// Sprite shown next to the pointer while previewing
#[derive(Debug, Clone, PartialEq)]
pub struct SpritePreview {
    /// Sprite name
    pub name: String,
    /// Screen position of the preview's top-left corner
    pub pos: Pos2,
}

/// Per-frame inputs that are not part of the graph or editor state
pub struct RenderInput<'a> {
    /// Measures body text for wrapping
    pub measurer: &'a dyn TextMeasurer,
    /// Nodes drawn with an error outline
    pub error_nodes: HashSet<NodeId>,
    /// Node the preview runner is on
    pub active_node: Option<NodeId>,
    /// Optional sprite preview overlay
    pub sprite_preview: Option<SpritePreview>,
}

impl<'a> RenderInput<'a> {
    /// Inputs with no highlights
    pub fn new(measurer: &'a dyn TextMeasurer) -> Self {
        Self {
            measurer,
            error_nodes: HashSet::new(),
            active_node: None,
            sprite_preview: None,
        }
    }

    /// Outline every node named in `errors`
    pub fn with_validation_errors(mut self, errors: &[ValidationError]) -> Self {
        self.error_nodes
            .extend(errors.iter().map(|e| e.node_id.clone()));
        self
    }
}

/// Build the draw commands for one frame, back to front
pub fn build_display_list(graph: &Graph, state: &EditorState, input: &RenderInput<'_>) -> Vec<DrawCommand> {
    let viewport = &state.viewport;
    let mut list = Vec::new();

    if state.settings.show_grid {
        push_grid(&mut list, viewport, state.settings.grid_spacing);
    }

    let selected_connector = state.selected_connector();
    let hovered_connector = match state.hover() {
        Some(Hover::Connector(exit)) => Some(exit),
        _ => None,
    };
    for connector in graph.connectors() {
        let Some(curve) = connector.curve() else {
            continue;
        };
        let is_exit = |exit: Option<&ExitRef>| {
            exit.is_some_and(|e| e.node == connector.from_node && e.exit_index == connector.exit_index)
        };
        let color = if is_exit(selected_connector) {
            Color32::from_rgb(255, 210, 80)
        } else if is_exit(hovered_connector) {
            Color32::from_rgb(230, 230, 230)
        } else {
            Color32::from_rgb(160, 160, 170)
        };
        list.push(DrawCommand::Path {
            points: curve.into_iter().map(|p| viewport.world_to_screen(p)).collect(),
            stroke: Stroke::new(CONNECTION_THICKNESS * viewport.scale(), color),
        });
    }

    if let Mode::Linking { from, cursor } = state.mode() {
        if let Some(start) = graph.node(from.node.as_str()).and_then(|n| n.exit_anchor(from.exit_index)) {
            let curve = connector_curve(start, *cursor, CONNECTOR_CURVATURE, CONNECTOR_SEGMENTS);
            list.push(DrawCommand::Path {
                points: curve.into_iter().map(|p| viewport.world_to_screen(p)).collect(),
                stroke: Stroke::new(CONNECTION_THICKNESS * viewport.scale(), Color32::from_rgb(100, 150, 255)),
            });
        }
    }

    let visible = viewport.visible_world_rect();
    for node in graph.nodes() {
        if node.rect().intersects(visible) {
            push_node(&mut list, node, state, input);
        }
    }

    if let Mode::RectSelecting { start, current, .. } = state.mode() {
        let rect = viewport.world_rect_to_screen(rect_from_corners(*start, *current));
        list.push(DrawCommand::Rect {
            rect,
            rounding: egui::Rounding::ZERO,
            fill: Color32::from_rgba_unmultiplied(100, 150, 255, 30),
            stroke: Stroke::new(1.0, Color32::from_rgb(100, 150, 255)),
        });
    }

    if let Some(preview) = &input.sprite_preview {
        list.push(DrawCommand::Sprite {
            rect: Rect::from_min_size(preview.pos, Vec2::splat(SPRITE_PREVIEW_SIZE)),
            name: preview.name.clone(),
        });
    }

    list
}

fn push_grid(list: &mut Vec<DrawCommand>, viewport: &Viewport, spacing: f32) {
    if spacing <= 0.0 || spacing * viewport.scale() < MIN_GRID_PIXELS {
        return;
    }
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 60, 60, 100));
    let world = viewport.visible_world_rect();
    let top = viewport.world_to_screen(world.min).y;
    let bottom = viewport.world_to_screen(world.max).y;
    let left = viewport.world_to_screen(world.min).x;
    let right = viewport.world_to_screen(world.max).x;

    let mut x = (world.min.x / spacing).ceil() * spacing;
    while x <= world.max.x {
        let sx = viewport.world_to_screen(Pos2::new(x, 0.0)).x;
        list.push(DrawCommand::Line {
            points: [Pos2::new(sx, top), Pos2::new(sx, bottom)],
            stroke,
        });
        x += spacing;
    }
    let mut y = (world.min.y / spacing).ceil() * spacing;
    while y <= world.max.y {
        let sy = viewport.world_to_screen(Pos2::new(0.0, y)).y;
        list.push(DrawCommand::Line {
            points: [Pos2::new(left, sy), Pos2::new(right, sy)],
            stroke,
        });
        y += spacing;
    }
}

fn push_node(list: &mut Vec<DrawCommand>, node: &Node, state: &EditorState, input: &RenderInput<'_>) {
    let viewport = &state.viewport;
    let zoom = viewport.scale();
    let screen_rect = viewport.world_rect_to_screen(node.rect());

    list.push(DrawCommand::Rect {
        rect: screen_rect.translate(Vec2::splat(NODE_SHADOW_OFFSET * zoom)),
        rounding: egui::Rounding::same(NODE_ROUNDING * zoom),
        fill: Color32::from_rgba_unmultiplied(0, 0, 0, 60),
        stroke: Stroke::NONE,
    });
    let background = if input.active_node.as_ref() == Some(&node.id) {
        Color32::from_rgb(50, 75, 60)
    } else {
        Color32::from_rgb(45, 45, 48)
    };
    list.push(DrawCommand::Rect {
        rect: screen_rect,
        rounding: egui::Rounding::same(NODE_ROUNDING * zoom),
        fill: background,
        stroke: Stroke::NONE,
    });

    // Header
    let header_rect = Rect::from_min_size(screen_rect.min, Vec2::new(screen_rect.width(), NODE_HEADER_HEIGHT * zoom));
    let [r, g, b] = node.kind().color();
    list.push(DrawCommand::Rect {
        rect: header_rect,
        rounding: egui::Rounding {
            nw: NODE_ROUNDING * zoom,
            ne: NODE_ROUNDING * zoom,
            sw: 0.0,
            se: 0.0,
        },
        fill: Color32::from_rgb(r, g, b),
        stroke: Stroke::NONE,
    });
    list.push(DrawCommand::Text {
        pos: Pos2::new(header_rect.left() + NODE_PADDING * zoom, header_rect.center().y),
        anchor: Align2::LEFT_CENTER,
        text: node.kind().title().to_string(),
        size: TITLE_FONT_SIZE * zoom,
        color: Color32::WHITE,
    });

    // Close button
    let close = viewport.world_rect_to_screen(node.close_button_rect());
    let close_hovered = matches!(state.hover(), Some(Hover::CloseButton(id)) if *id == node.id);
    let close_color = if close_hovered {
        Color32::from_rgb(255, 120, 120)
    } else {
        Color32::from_gray(200)
    };
    let inset = close.shrink(close.width() * 0.25);
    for points in [
        [inset.left_top(), inset.right_bottom()],
        [inset.right_top(), inset.left_bottom()],
    ] {
        list.push(DrawCommand::Line {
            points,
            stroke: Stroke::new(1.5 * zoom, close_color),
        });
    }

    // Body text
    if let Some(text) = node.body_text() {
        let text_top = node.y + NODE_HEADER_HEIGHT + NODE_PADDING;
        for (i, line) in wrap_text(text, TEXT_WIDTH, input.measurer).into_iter().enumerate() {
            let world = Pos2::new(node.x + NODE_PADDING, text_top + (i as f32 + 0.5) * LINE_HEIGHT);
            list.push(DrawCommand::Text {
                pos: viewport.world_to_screen(world),
                anchor: Align2::LEFT_CENTER,
                text: line,
                size: BODY_FONT_SIZE * zoom,
                color: Color32::from_gray(220),
            });
        }
    }

    // Entrance
    if !matches!(node.body, NodeBody::Comment(_)) {
        list.push(DrawCommand::Circle {
            center: viewport.world_to_screen(node.entrance_anchor()),
            radius: ANCHOR_RADIUS * 0.75 * zoom,
            fill: Color32::from_gray(120),
            stroke: Stroke::new(1.0, Color32::from_gray(30)),
        });
    }

    // Exits
    let hovered_exit = match state.hover() {
        Some(Hover::Exit(exit)) if exit.node == node.id => Some(exit.exit_index),
        _ => None,
    };
    let labels = node.exit_labels();
    let row_labels = matches!(node.body, NodeBody::Choice(_) | NodeBody::Switch(_));
    for (i, (anchor, target)) in node.exit_anchors().into_iter().zip(node.exits()).enumerate() {
        let center = viewport.world_to_screen(anchor);
        let radius = if hovered_exit == Some(i) {
            ANCHOR_RADIUS * 1.3 * zoom
        } else {
            ANCHOR_RADIUS * zoom
        };
        let fill = if target.is_some() {
            Color32::from_rgb(120, 200, 140)
        } else {
            Color32::from_gray(70)
        };
        list.push(DrawCommand::Circle {
            center,
            radius,
            fill,
            stroke: Stroke::new(1.0, Color32::from_gray(30)),
        });
        if row_labels {
            if let Some(label) = labels.get(i) {
                list.push(DrawCommand::Text {
                    pos: Pos2::new(center.x - (ANCHOR_RADIUS + NODE_PADDING) * zoom, center.y),
                    anchor: Align2::RIGHT_CENTER,
                    text: clip_label(label, EXIT_ROW_HEIGHT),
                    size: LABEL_FONT_SIZE * zoom,
                    color: Color32::from_gray(200),
                });
            }
        }
    }

    // Outline: errors win over selection, selection over hover
    let hovered = state.hover().and_then(Hover::node) == Some(&node.id);
    let outline = if input.error_nodes.contains(&node.id) {
        Some(Stroke::new(2.0, Color32::from_rgb(230, 70, 70)))
    } else if state.is_selected(&node.id) {
        Some(Stroke::new(2.0, Color32::from_rgb(100, 150, 255)))
    } else if hovered {
        Some(Stroke::new(1.0, Color32::from_gray(160)))
    } else {
        None
    };
    if let Some(stroke) = outline {
        list.push(DrawCommand::Rect {
            rect: screen_rect,
            rounding: egui::Rounding::same(NODE_ROUNDING * zoom),
            fill: Color32::TRANSPARENT,
            stroke,
        });
    }
}

/// Keep exit labels to roughly one row's worth of characters
fn clip_label(label: &str, row_height: f32) -> String {
    let max_chars = (row_height * 1.5) as usize;
    if label.chars().count() <= max_chars {
        label.to_string()
    } else {
        let mut clipped: String = label.chars().take(max_chars.saturating_sub(1)).collect();
        clipped.push('…');
        clipped
    }
}

/// Replay draw commands onto an egui painter
pub fn paint(painter: &egui::Painter, commands: &[DrawCommand], sprites: &dyn SpriteLookup) {
    for command in commands {
        match command {
            DrawCommand::Line { points, stroke } => {
                painter.line_segment(*points, *stroke);
            }
            DrawCommand::Path { points, stroke } => {
                painter.add(egui::Shape::line(points.clone(), *stroke));
            }
            DrawCommand::Rect {
                rect,
                rounding,
                fill,
                stroke,
            } => {
                painter.rect(*rect, *rounding, *fill, *stroke);
            }
            DrawCommand::Circle {
                center,
                radius,
                fill,
                stroke,
            } => {
                painter.circle(*center, *radius, *fill, *stroke);
            }
            DrawCommand::Text {
                pos,
                anchor,
                text,
                size,
                color,
            } => {
                painter.text(*pos, *anchor, text, FontId::proportional(*size), *color);
            }
            DrawCommand::Sprite { rect, name } => match sprites.lookup(name) {
                Some(texture) => {
                    let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                    painter.image(texture, *rect, uv, Color32::WHITE);
                }
                None => {
                    painter.rect_stroke(*rect, 0.0, Stroke::new(1.0, Color32::from_gray(120)));
                    painter.text(
                        rect.center(),
                        Align2::CENTER_CENTER,
                        name,
                        FontId::proportional(LABEL_FONT_SIZE),
                        Color32::from_gray(160),
                    );
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{EditorAction, InputEvent};
    use crate::layout::MonospaceMeasurer;
    use crate::node::{ChoiceEntry, ChoiceNode, ExecNode};
    use egui::{Modifiers, PointerButton};

    fn graph() -> Graph {
        let mut graph = Graph::new("render");
        graph
            .add_node(Node::new(
                "a",
                NodeBody::Exec(ExecNode {
                    text: "Hello there".to_string(),
                    next: Some(NodeId::new("b")),
                    ..ExecNode::default()
                }),
            ))
            .unwrap();
        graph
            .add_node(
                Node::new(
                    "b",
                    NodeBody::Choice(ChoiceNode {
                        prompt_text: "Pick".to_string(),
                        choices: vec![ChoiceEntry::new("Left"), ChoiceEntry::new("Right")],
                    }),
                )
                .with_position(300.0, 0.0),
            )
            .unwrap();
        graph
    }

    fn editor() -> EditorState {
        let mut state = EditorState::default();
        state.settings.show_grid = false;
        state.viewport = Viewport::new(Vec2::new(800.0, 600.0));
        state.viewport.translate = Vec2::new(-300.0, -200.0);
        state
    }

    fn texts(list: &[DrawCommand]) -> Vec<&str> {
        list.iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_display_list_contents() {
        let measurer = MonospaceMeasurer::default();
        let list = build_display_list(&graph(), &editor(), &RenderInput::new(&measurer));

        let paths = list.iter().filter(|c| matches!(c, DrawCommand::Path { .. })).count();
        assert_eq!(paths, 1);
        let texts = texts(&list);
        assert!(texts.contains(&"Exec"));
        assert!(texts.contains(&"Hello there"));
        assert!(texts.contains(&"Left"));
        // Grid is off, so the only lines are close-button crosses
        assert!(!list
            .iter()
            .any(|c| matches!(c, DrawCommand::Line { points, .. } if points[0].distance(points[1]) > 100.0)));
    }

    #[test]
    fn test_shadow_scales_with_zoom() {
        let measurer = MonospaceMeasurer::default();
        let mut graph = Graph::new("shadow");
        graph.add_node(Node::end().with_id("only")).unwrap();

        for scale in [1.0, 4.0] {
            let mut state = editor();
            state.viewport.set_scale(scale);
            let list = build_display_list(&graph, &state, &RenderInput::new(&measurer));
            let rects: Vec<Rect> = list
                .iter()
                .filter_map(|c| match c {
                    DrawCommand::Rect { rect, .. } => Some(*rect),
                    _ => None,
                })
                .collect();
            let (shadow, body) = (rects[0], rects[1]);
            assert_eq!(shadow.min - body.min, Vec2::splat(NODE_SHADOW_OFFSET * scale));
            assert_eq!(shadow.size(), body.size());
        }
    }

    #[test]
    fn test_build_is_pure() {
        let graph = graph();
        let state = editor();
        let measurer = MonospaceMeasurer::default();
        let input = RenderInput::new(&measurer);
        let first = build_display_list(&graph, &state, &input);
        let second = build_display_list(&graph, &state, &input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_grid_toggle() {
        let graph = Graph::new("empty");
        let mut state = editor();
        let measurer = MonospaceMeasurer::default();
        assert!(build_display_list(&graph, &state, &RenderInput::new(&measurer)).is_empty());
        state.settings.show_grid = true;
        let list = build_display_list(&graph, &state, &RenderInput::new(&measurer));
        assert!(!list.is_empty());
        assert!(list.iter().all(|c| matches!(c, DrawCommand::Line { .. })));
    }

    #[test]
    fn test_error_outline() {
        let graph = graph();
        let state = editor();
        let measurer = MonospaceMeasurer::default();
        let errors = crate::validation::validate(&graph);
        assert!(!errors.is_empty());
        let input = RenderInput::new(&measurer).with_validation_errors(&errors);
        let list = build_display_list(&graph, &state, &input);
        let red = Color32::from_rgb(230, 70, 70);
        assert!(list
            .iter()
            .any(|c| matches!(c, DrawCommand::Rect { stroke, .. } if stroke.color == red)));
    }

    #[test]
    fn test_overlays_follow_mode() {
        let mut graph = graph();
        let mut state = editor();
        let measurer = MonospaceMeasurer::default();

        state.begin_linking(&graph, &NodeId::new("b"), 0).unwrap();
        let list = build_display_list(&graph, &state, &RenderInput::new(&measurer));
        let paths = list.iter().filter(|c| matches!(c, DrawCommand::Path { .. })).count();
        assert_eq!(paths, 2);

        let actions = state.handle_input(&mut graph, InputEvent::Key(egui::Key::Escape));
        assert_eq!(actions, vec![EditorAction::LinkCancelled]);

        let empty = state.viewport.world_to_screen(Pos2::new(-50.0, 300.0));
        state.handle_input(
            &mut graph,
            InputEvent::PointerDown {
                pos: empty,
                button: PointerButton::Primary,
                modifiers: Modifiers::SHIFT,
                time_ms: 0,
            },
        );
        state.handle_input(&mut graph, InputEvent::PointerMove { pos: empty + Vec2::new(40.0, 40.0) });
        let list = build_display_list(&graph, &state, &RenderInput::new(&measurer));
        let overlay = list.last().unwrap();
        assert!(matches!(overlay, DrawCommand::Rect { rect, .. } if rect.width() == 40.0));
    }

    #[test]
    fn test_sprite_preview_is_last() {
        let measurer = MonospaceMeasurer::default();
        let mut input = RenderInput::new(&measurer);
        input.sprite_preview = Some(SpritePreview {
            name: "hero_portrait".to_string(),
            pos: Pos2::new(10.0, 10.0),
        });
        let list = build_display_list(&graph(), &editor(), &input);
        assert_eq!(
            list.last(),
            Some(&DrawCommand::Sprite {
                rect: Rect::from_min_size(Pos2::new(10.0, 10.0), Vec2::splat(SPRITE_PREVIEW_SIZE)),
                name: "hero_portrait".to_string(),
            })
        );
        assert_eq!(NoSprites.lookup("hero_portrait"), None);
    }

    #[test]
    fn test_clip_label() {
        assert_eq!(clip_label("short", EXIT_ROW_HEIGHT), "short");
        let long = "x".repeat(80);
        let clipped = clip_label(&long, EXIT_ROW_HEIGHT);
        assert!(clipped.chars().count() < 80);
        assert!(clipped.ends_with('…'));
    }
}
