// SPDX-License-Identifier: MIT OR Apache-2.0
//! Screen/world coordinate mapping and hit-testing math.
//!
//! The render pipeline places world content with the chain
//! `translate(pan) -> translate(canvas / 2) -> translate(-zone / 2) -> scale`.
//! Collapsed, that is `screen = origin + scale * world`, and both directions
//! below go through [`Viewport::origin`] so they cannot drift apart.

use egui::{Pos2, Rect, Vec2};

/// Smallest zoom factor reachable through zoom operations
pub const MIN_SCALE: f32 = 0.5;
/// Largest zoom factor reachable through zoom operations
pub const MAX_SCALE: f32 = 10.0;

/// Pan/zoom state of the graph canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Pan offset in screen pixels
    pub translate: Vec2,
    scale: f32,
    /// Size of the drawing surface in screen pixels
    pub canvas_size: Vec2,
    /// Size of the world zone centered on the canvas (unscaled)
    pub zone_size: Vec2,
    min_scale: f32,
    max_scale: f32,
}

impl Viewport {
    /// Create a viewport for a canvas of the given size
    pub fn new(canvas_size: Vec2) -> Self {
        Self {
            translate: Vec2::ZERO,
            scale: 1.0,
            canvas_size,
            zone_size: Vec2::ZERO,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
        }
    }

    /// Current zoom factor
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the zoom factor, clamped to the configured limits
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(self.min_scale, self.max_scale);
    }

    /// Change the zoom limits; the current scale is re-clamped
    pub fn set_scale_limits(&mut self, min: f32, max: f32) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.min_scale = min.max(f32::EPSILON);
        self.max_scale = max.max(self.min_scale);
        self.set_scale(self.scale);
    }

    /// Zoom limits as `(min, max)`
    pub fn scale_limits(&self) -> (f32, f32) {
        (self.min_scale, self.max_scale)
    }

    /// Screen position of the world origin.
    pub fn origin(&self) -> Pos2 {
        Pos2::ZERO + self.translate + self.canvas_size * 0.5 - self.zone_size * 0.5
    }

    fn set_origin(&mut self, origin: Pos2) {
        self.translate = origin.to_vec2() - self.canvas_size * 0.5 + self.zone_size * 0.5;
    }

    /// Map a world position to screen pixels
    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        self.origin() + world.to_vec2() * self.scale
    }

    /// Map a screen position to world coordinates
    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        Pos2::ZERO + (screen - self.origin()) / self.scale
    }

    /// Map a world rectangle to screen pixels
    pub fn world_rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.world_to_screen(rect.min), self.world_to_screen(rect.max))
    }

    /// World-space rectangle currently covered by the canvas
    pub fn visible_world_rect(&self) -> Rect {
        Rect::from_min_max(
            self.screen_to_world(Pos2::ZERO),
            self.screen_to_world(Pos2::ZERO + self.canvas_size),
        )
    }

    /// Pan by a screen-space delta
    pub fn pan_by(&mut self, delta: Vec2) {
        self.translate += delta;
    }

    /// Multiply the zoom by `factor`, keeping the world point under `focal`
    /// at the same screen pixel. Returns whether the scale changed.
    pub fn zoom_at(&mut self, focal: Pos2, factor: f32) -> bool {
        let old_scale = self.scale;
        self.set_scale(old_scale * factor);
        if self.scale == old_scale {
            return false;
        }

        let ratio = self.scale / old_scale;
        let origin = self.origin();
        self.set_origin(focal - (focal - origin) * ratio);
        true
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Vec2::new(800.0, 600.0))
    }
}

/// Distance from `p` to the segment `a`-`b`
pub fn point_segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Distance from `p` to the nearest segment of a polyline
pub fn point_polyline_distance(p: Pos2, points: &[Pos2]) -> f32 {
    match points {
        [] => f32::INFINITY,
        [single] => p.distance(*single),
        _ => points
            .windows(2)
            .map(|w| point_segment_distance(p, w[0], w[1]))
            .fold(f32::INFINITY, f32::min),
    }
}

/// Normalized rectangle spanning two corners
pub fn rect_from_corners(a: Pos2, b: Pos2) -> Rect {
    Rect::from_two_pos(a, b)
}

/// Inclusive AABB overlap test
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.min.x <= b.max.x && b.min.x <= a.max.x && a.min.y <= b.max.y && b.min.y <= a.max.y
}

/// Sample a cubic bezier curve into `segments + 1` points
pub fn bezier_points(p0: Pos2, p1: Pos2, p2: Pos2, p3: Pos2, segments: usize) -> Vec<Pos2> {
    let segments = segments.max(1);
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Pos2::new(x, y));
    }
    points
}

/// Horizontal-tangent connector curve between an exit and an entrance, in
/// whatever space the endpoints are given.
pub fn connector_curve(from: Pos2, to: Pos2, curvature: f32, segments: usize) -> Vec<Pos2> {
    let distance = (to.x - from.x).abs();
    let bend = curvature.min(distance * 0.5).max(curvature * 0.5);
    bezier_points(
        from,
        Pos2::new(from.x + bend, from.y),
        Pos2::new(to.x - bend, to.y),
        to,
        segments,
    )
}
